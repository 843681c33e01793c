//! Database operations for Crosspost

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::Result;
use crate::types::{
    ContentType, DestinationStatus, Job, Platform, Post, PostDestination, PostStatus, Profile,
};

/// A post with all its destinations
#[derive(Debug, Clone)]
pub struct PostWithDestinations {
    pub post: Post,
    pub destinations: Vec<PostDestination>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::DbError::IoError)?;
        }

        // Use forward slashes for SQLite URL (works on both Windows and Unix)
        // Use mode=rwc to allow creating the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(crate::error::DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    pub async fn create_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, workspace_id, platform, display_name, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.workspace_id)
        .bind(profile.platform.as_str())
        .bind(&profile.display_name)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT id, workspace_id, platform, display_name, created_at
            FROM profiles WHERE id = ?
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        row.map(|r| profile_from_row(&r)).transpose()
    }

    /// Fetch several profiles in one query; ids without a row are simply
    /// absent from the result.
    pub async fn get_profiles(&self, profile_ids: &[String]) -> Result<Vec<Profile>> {
        if profile_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; profile_ids.len()].join(", ");
        let query_str = format!(
            "SELECT id, workspace_id, platform, display_name, created_at \
             FROM profiles WHERE id IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&query_str);
        for id in profile_ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        rows.iter().map(profile_from_row).collect()
    }

    // ========================================================================
    // Posts
    // ========================================================================

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        let media_json = serde_json::to_string(&post.media)
            .map_err(|e| crate::CrosspostError::InvalidInput(format!("Bad media list: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, workspace_id, author_id, content, content_type, status,
                               scheduled_at, timezone, parent_post_id, campaign_id, media,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.workspace_id)
        .bind(&post.author_id)
        .bind(&post.content)
        .bind(post.content_type.as_str())
        .bind(post.status.as_str())
        .bind(post.scheduled_at)
        .bind(&post.timezone)
        .bind(&post.parent_post_id)
        .bind(&post.campaign_id)
        .bind(media_json)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, workspace_id, author_id, content, content_type, status,
                   scheduled_at, timezone, parent_post_id, campaign_id, media,
                   created_at, updated_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        row.map(|r| post_from_row(&r)).transpose()
    }

    pub async fn get_posts_by_workspace(&self, workspace_id: &str) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, workspace_id, author_id, content, content_type, status,
                   scheduled_at, timezone, parent_post_id, campaign_id, media,
                   created_at, updated_at
            FROM posts WHERE workspace_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    pub async fn get_post_with_destinations(
        &self,
        post_id: &str,
    ) -> Result<Option<PostWithDestinations>> {
        let Some(post) = self.get_post(post_id).await? else {
            return Ok(None);
        };
        let destinations = self.get_destinations(post_id).await?;
        Ok(Some(PostWithDestinations { post, destinations }))
    }

    pub async fn update_post_status(&self, post_id: &str, status: PostStatus) -> Result<()> {
        sqlx::query("UPDATE posts SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(chrono::Utc::now().timestamp())
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn update_post_content(
        &self,
        post_id: &str,
        content: &str,
        media: &[String],
    ) -> Result<()> {
        let media_json = serde_json::to_string(media)
            .map_err(|e| crate::CrosspostError::InvalidInput(format!("Bad media list: {}", e)))?;

        sqlx::query("UPDATE posts SET content = ?, media = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(media_json)
            .bind(chrono::Utc::now().timestamp())
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn update_post_schedule(
        &self,
        post_id: &str,
        scheduled_at: Option<i64>,
        timezone: Option<&str>,
        status: PostStatus,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE posts SET scheduled_at = ?, timezone = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(scheduled_at)
        .bind(timezone)
        .bind(status.as_str())
        .bind(chrono::Utc::now().timestamp())
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Delete a post with its destinations and any queued job.
    ///
    /// Children are removed explicitly so the cascade does not depend on the
    /// connection's foreign_keys pragma.
    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM publish_jobs WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::query("DELETE FROM post_destinations WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    // ========================================================================
    // Destinations
    // ========================================================================

    pub async fn create_destination(&self, destination: &PostDestination) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_destinations (id, post_id, profile_id, status, content_override,
                                           metadata, platform_post_id, error_message,
                                           published_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&destination.id)
        .bind(&destination.post_id)
        .bind(&destination.profile_id)
        .bind(destination.status.as_str())
        .bind(&destination.content_override)
        .bind(&destination.metadata)
        .bind(&destination.platform_post_id)
        .bind(&destination.error_message)
        .bind(destination.published_at)
        .bind(destination.updated_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_destination(&self, destination_id: &str) -> Result<Option<PostDestination>> {
        let row = sqlx::query(
            r#"
            SELECT id, post_id, profile_id, status, content_override, metadata,
                   platform_post_id, error_message, published_at, updated_at
            FROM post_destinations WHERE id = ?
            "#,
        )
        .bind(destination_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        row.map(|r| destination_from_row(&r)).transpose()
    }

    pub async fn get_destinations(&self, post_id: &str) -> Result<Vec<PostDestination>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, profile_id, status, content_override, metadata,
                   platform_post_id, error_message, published_at, updated_at
            FROM post_destinations WHERE post_id = ?
            ORDER BY id
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        rows.iter().map(destination_from_row).collect()
    }

    /// Replace every destination of a post (edit flow). The old rows go away
    /// entirely; execution state does not survive an edit.
    pub async fn replace_destinations(
        &self,
        post_id: &str,
        destinations: &[PostDestination],
    ) -> Result<()> {
        sqlx::query("DELETE FROM post_destinations WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        for destination in destinations {
            self.create_destination(destination).await?;
        }

        Ok(())
    }

    /// Atomically claim a destination for publishing.
    ///
    /// Single conditional UPDATE, checked by affected-row count. This is the
    /// one mechanism that prevents two workers from double-publishing a
    /// destination; it must stay a compare-and-set, never a read-then-write.
    pub async fn claim_destination(&self, destination_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE post_destinations
            SET status = 'publishing', updated_at = ?
            WHERE id = ? AND status IN ('scheduled', 'failed')
            "#,
        )
        .bind(chrono::Utc::now().timestamp())
        .bind(destination_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Persist the root platform post id as soon as the platform returns it,
    /// before the rest of the chain publishes.
    pub async fn set_destination_platform_post_id(
        &self,
        destination_id: &str,
        platform_post_id: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE post_destinations SET platform_post_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(platform_post_id)
        .bind(chrono::Utc::now().timestamp())
        .bind(destination_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn mark_destination_success(
        &self,
        destination_id: &str,
        published_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE post_destinations
            SET status = 'success', published_at = ?, error_message = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(published_at)
        .bind(chrono::Utc::now().timestamp())
        .bind(destination_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn mark_destination_failed(
        &self,
        destination_id: &str,
        error_message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE post_destinations
            SET status = 'failed', error_message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error_message)
        .bind(chrono::Utc::now().timestamp())
        .bind(destination_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn destination_statuses(&self, post_id: &str) -> Result<Vec<DestinationStatus>> {
        let rows = sqlx::query("SELECT status FROM post_destinations WHERE post_id = ?")
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        rows.iter()
            .map(|r| {
                let raw: String = r.get("status");
                DestinationStatus::parse(&raw).ok_or_else(|| {
                    crate::CrosspostError::InvalidInput(format!(
                        "Unknown destination status in database: {}",
                        raw
                    ))
                })
            })
            .collect()
    }

    // ========================================================================
    // Publish jobs
    // ========================================================================

    /// Enqueue a job keyed by post id. Re-enqueueing replaces the existing
    /// row and resets its attempt counter, so there is never more than one
    /// job per post.
    pub async fn enqueue_job(&self, post_id: &str, run_at: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO publish_jobs (post_id, run_at, attempts, last_error, created_at, updated_at)
            VALUES (?, ?, 0, NULL, ?, ?)
            ON CONFLICT(post_id) DO UPDATE SET
                run_at = excluded.run_at,
                attempts = 0,
                last_error = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(post_id)
        .bind(run_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Remove a pending job. Returns whether a row existed.
    pub async fn cancel_job(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM publish_jobs WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_job(&self, post_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query(
            r#"
            SELECT post_id, run_at, attempts, last_error, created_at, updated_at
            FROM publish_jobs WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.map(|r| job_from_row(&r)))
    }

    /// Jobs due at `now`, oldest first. Parked jobs (run_at NULL) are never
    /// returned.
    pub async fn due_jobs(&self, now: i64, limit: usize) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, run_at, attempts, last_error, created_at, updated_at
            FROM publish_jobs
            WHERE run_at IS NOT NULL AND run_at <= ?
            ORDER BY run_at ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.iter().map(job_from_row).collect())
    }

    pub async fn all_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, run_at, attempts, last_error, created_at, updated_at
            FROM publish_jobs
            ORDER BY run_at IS NULL, run_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.iter().map(job_from_row).collect())
    }

    pub async fn complete_job(&self, post_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM publish_jobs WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Record a failed attempt. `run_at = None` parks the job.
    pub async fn update_job_failure(
        &self,
        post_id: &str,
        run_at: Option<i64>,
        attempts: i64,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE publish_jobs
            SET run_at = ?, attempts = ?, last_error = ?, updated_at = ?
            WHERE post_id = ?
            "#,
        )
        .bind(run_at)
        .bind(attempts)
        .bind(error)
        .bind(chrono::Utc::now().timestamp())
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn profile_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Profile> {
    let platform_raw: String = row.get("platform");
    let platform = Platform::parse(&platform_raw).ok_or_else(|| {
        crate::CrosspostError::InvalidInput(format!(
            "Unknown platform in database: {}",
            platform_raw
        ))
    })?;

    Ok(Profile {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        platform,
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    })
}

fn post_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status_raw: String = row.get("status");
    let status = PostStatus::parse(&status_raw).ok_or_else(|| {
        crate::CrosspostError::InvalidInput(format!("Unknown post status in database: {}", status_raw))
    })?;

    let content_type_raw: String = row.get("content_type");
    let content_type = ContentType::parse(&content_type_raw).unwrap_or(ContentType::Post);

    let media_raw: String = row.get("media");
    let media: Vec<String> = serde_json::from_str(&media_raw).unwrap_or_default();

    Ok(Post {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
        content_type,
        status,
        scheduled_at: row.get("scheduled_at"),
        timezone: row.get("timezone"),
        parent_post_id: row.get("parent_post_id"),
        campaign_id: row.get("campaign_id"),
        media,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn destination_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PostDestination> {
    let status_raw: String = row.get("status");
    let status = DestinationStatus::parse(&status_raw).ok_or_else(|| {
        crate::CrosspostError::InvalidInput(format!(
            "Unknown destination status in database: {}",
            status_raw
        ))
    })?;

    Ok(PostDestination {
        id: row.get("id"),
        post_id: row.get("post_id"),
        profile_id: row.get("profile_id"),
        status,
        content_override: row.get("content_override"),
        metadata: row.get("metadata"),
        platform_post_id: row.get("platform_post_id"),
        error_message: row.get("error_message"),
        published_at: row.get("published_at"),
        updated_at: row.get("updated_at"),
    })
}

fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> Job {
    Job {
        post_id: row.get("post_id"),
        run_at: row.get("run_at"),
        attempts: row.get("attempts"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (db, temp_dir)
    }

    fn test_profile(id: &str, workspace: &str, platform: Platform) -> Profile {
        Profile {
            id: id.to_string(),
            workspace_id: workspace.to_string(),
            platform,
            display_name: format!("{} profile", platform),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    fn test_post(workspace: &str) -> Post {
        Post::new(
            workspace.to_string(),
            "author-1".to_string(),
            "Test post content".to_string(),
        )
    }

    #[tokio::test]
    async fn test_post_round_trip() {
        let (db, _tmp) = setup_db().await;

        let mut post = test_post("ws-1");
        post.status = PostStatus::Scheduled;
        post.scheduled_at = Some(1_900_000_000);
        post.timezone = Some("Europe/Berlin".to_string());
        post.media = vec!["m1".to_string(), "m2".to_string()];

        db.create_post(&post).await.unwrap();

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, post.id);
        assert_eq!(loaded.status, PostStatus::Scheduled);
        assert_eq!(loaded.scheduled_at, Some(1_900_000_000));
        assert_eq!(loaded.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(loaded.media, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_get_profiles_bulk() {
        let (db, _tmp) = setup_db().await;

        db.create_profile(&test_profile("p1", "ws-1", Platform::Twitter))
            .await
            .unwrap();
        db.create_profile(&test_profile("p2", "ws-1", Platform::Linkedin))
            .await
            .unwrap();

        let profiles = db
            .get_profiles(&[
                "p1".to_string(),
                "p2".to_string(),
                "missing".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(profiles.len(), 2);
    }

    #[tokio::test]
    async fn test_claim_destination_succeeds_once() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();

        let dest = PostDestination::new(post.id.clone(), "p1".to_string());
        db.create_destination(&dest).await.unwrap();

        assert!(db.claim_destination(&dest.id).await.unwrap());
        // Second claim sees status 'publishing' and affects zero rows
        assert!(!db.claim_destination(&dest.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_destination_concurrent_single_winner() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();

        let dest = PostDestination::new(post.id.clone(), "p1".to_string());
        db.create_destination(&dest).await.unwrap();

        let (a, b) = tokio::join!(db.claim_destination(&dest.id), db.claim_destination(&dest.id));

        let wins = [a.unwrap(), b.unwrap()].iter().filter(|w| **w).count();
        assert_eq!(wins, 1, "exactly one concurrent claim must win");
    }

    #[tokio::test]
    async fn test_failed_destination_can_be_reclaimed() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();

        let dest = PostDestination::new(post.id.clone(), "p1".to_string());
        db.create_destination(&dest).await.unwrap();

        assert!(db.claim_destination(&dest.id).await.unwrap());
        db.mark_destination_failed(&dest.id, "network down")
            .await
            .unwrap();

        // failed -> publishing is the one permitted backward transition
        assert!(db.claim_destination(&dest.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_successful_destination_cannot_be_reclaimed() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();

        let dest = PostDestination::new(post.id.clone(), "p1".to_string());
        db.create_destination(&dest).await.unwrap();

        assert!(db.claim_destination(&dest.id).await.unwrap());
        db.mark_destination_success(&dest.id, chrono::Utc::now().timestamp())
            .await
            .unwrap();

        assert!(!db.claim_destination(&dest.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_success_clears_prior_error() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();

        let dest = PostDestination::new(post.id.clone(), "p1".to_string());
        db.create_destination(&dest).await.unwrap();

        db.claim_destination(&dest.id).await.unwrap();
        db.mark_destination_failed(&dest.id, "first failure")
            .await
            .unwrap();

        db.claim_destination(&dest.id).await.unwrap();
        db.mark_destination_success(&dest.id, 123).await.unwrap();

        let loaded = db.get_destination(&dest.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DestinationStatus::Success);
        assert_eq!(loaded.error_message, None);
        assert_eq!(loaded.published_at, Some(123));
    }

    #[tokio::test]
    async fn test_enqueue_job_is_idempotent() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();

        db.enqueue_job(&post.id, 1000).await.unwrap();
        db.enqueue_job(&post.id, 2000).await.unwrap();

        let jobs = db.all_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1, "re-enqueue must replace, not duplicate");
        assert_eq!(jobs[0].run_at, Some(2000));
        assert_eq!(jobs[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_due_jobs_excludes_future_and_parked() {
        let (db, _tmp) = setup_db().await;

        for (id, run_at) in [("due-post", Some(100)), ("future-post", Some(10_000))] {
            let mut post = test_post("ws-1");
            post.id = id.to_string();
            db.create_post(&post).await.unwrap();
            db.enqueue_job(id, run_at.unwrap()).await.unwrap();
        }

        let mut parked = test_post("ws-1");
        parked.id = "parked-post".to_string();
        db.create_post(&parked).await.unwrap();
        db.enqueue_job("parked-post", 50).await.unwrap();
        db.update_job_failure("parked-post", None, 3, "exhausted")
            .await
            .unwrap();

        let due = db.due_jobs(500, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].post_id, "due-post");
    }

    #[tokio::test]
    async fn test_cancel_job() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();
        db.enqueue_job(&post.id, 1000).await.unwrap();

        assert!(db.cancel_job(&post.id).await.unwrap());
        assert!(!db.cancel_job(&post.id).await.unwrap());
        assert!(db.get_job(&post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_post_removes_children() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();
        db.create_destination(&PostDestination::new(post.id.clone(), "p1".to_string()))
            .await
            .unwrap();
        db.enqueue_job(&post.id, 1000).await.unwrap();

        db.delete_post(&post.id).await.unwrap();

        assert!(db.get_post(&post.id).await.unwrap().is_none());
        assert!(db.get_destinations(&post.id).await.unwrap().is_empty());
        assert!(db.get_job(&post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_destinations() {
        let (db, _tmp) = setup_db().await;

        let post = test_post("ws-1");
        db.create_post(&post).await.unwrap();
        db.create_destination(&PostDestination::new(post.id.clone(), "old".to_string()))
            .await
            .unwrap();

        let replacement = vec![
            PostDestination::new(post.id.clone(), "new-1".to_string()),
            PostDestination::new(post.id.clone(), "new-2".to_string()),
        ];
        db.replace_destinations(&post.id, &replacement).await.unwrap();

        let loaded = db.get_destinations(&post.id).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|d| d.profile_id.starts_with("new-")));
    }
}
