//! Executor integration tests
//!
//! Drive the publishing executor against a real on-disk database with mock
//! publishers: claim behavior, thread-chain replay, failure isolation, and
//! master-status aggregation.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tempfile::TempDir;

use libcrosspost::db::Database;
use libcrosspost::error::{PublishError, Result};
use libcrosspost::executor::{DestinationResult, PublishExecutor};
use libcrosspost::publish::mock::MockPublisher;
use libcrosspost::publish::{CredentialResolver, MediaResolver, PublisherRegistry};
use libcrosspost::types::{
    Credentials, DestinationStatus, Platform, Post, PostDestination, PostStatus, Profile,
    ResolvedMedia, ThreadChunk,
};

struct StaticCreds;

#[async_trait]
impl CredentialResolver for StaticCreds {
    async fn resolve(&self, _profile: &Profile) -> std::result::Result<Credentials, PublishError> {
        Ok(Credentials {
            access_token: SecretString::from("test-token".to_string()),
            access_secret: None,
        })
    }
}

struct FailingCreds;

#[async_trait]
impl CredentialResolver for FailingCreds {
    async fn resolve(&self, _profile: &Profile) -> std::result::Result<Credentials, PublishError> {
        Err(PublishError::Credentials("vault unreachable".to_string()))
    }
}

struct StaticMedia(Vec<ResolvedMedia>);

#[async_trait]
impl MediaResolver for StaticMedia {
    async fn resolve(&self, ids: &[String]) -> Result<Vec<ResolvedMedia>> {
        Ok(self
            .0
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect())
    }
}

fn image(id: &str) -> ResolvedMedia {
    ResolvedMedia {
        id: id.to_string(),
        url: format!("https://cdn.example.com/{}.jpg", id),
        mime_type: "image/jpeg".to_string(),
        width: Some(1080),
        height: Some(1080),
        duration_seconds: None,
        size_bytes: Some(100_000),
    }
}

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
    (db, temp_dir)
}

async fn make_profile(db: &Database, id: &str, platform: Platform) {
    db.create_profile(&Profile {
        id: id.to_string(),
        workspace_id: "ws-1".to_string(),
        platform,
        display_name: format!("{} account", platform),
        created_at: chrono::Utc::now().timestamp(),
    })
    .await
    .unwrap();
}

async fn make_post(db: &Database, content: &str) -> Post {
    let mut post = Post::new(
        "ws-1".to_string(),
        "author-1".to_string(),
        content.to_string(),
    );
    post.status = PostStatus::Scheduled;
    db.create_post(&post).await.unwrap();
    post
}

async fn make_destination(db: &Database, post_id: &str, profile_id: &str) -> PostDestination {
    let destination = PostDestination::new(post_id.to_string(), profile_id.to_string());
    db.create_destination(&destination).await.unwrap();
    destination
}

fn executor(
    db: &Database,
    publishers: Vec<Arc<MockPublisher>>,
    media: Vec<ResolvedMedia>,
) -> PublishExecutor {
    let registry = PublisherRegistry::new(
        publishers
            .into_iter()
            .map(|p| p as Arc<dyn libcrosspost::publish::Publisher>)
            .collect(),
    )
    .unwrap();

    PublishExecutor::new(
        db.clone(),
        Arc::new(registry),
        Arc::new(StaticCreds),
        Arc::new(StaticMedia(media)),
    )
}

#[tokio::test]
async fn test_all_destinations_succeed() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;
    make_profile(&db, "fb", Platform::Facebook).await;

    let post = make_post(&db, "hello world").await;
    make_destination(&db, &post.id, "tw").await;
    make_destination(&db, &post.id, "fb").await;

    let twitter = Arc::new(MockPublisher::success(Platform::Twitter));
    let facebook = Arc::new(MockPublisher::success(Platform::Facebook));
    let executor = executor(&db, vec![twitter.clone(), facebook.clone()], vec![]);

    let outcomes = executor.execute(&post.id).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o.result, DestinationResult::Published { .. })));

    let loaded = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PostStatus::Published);

    for destination in db.get_destinations(&post.id).await.unwrap() {
        assert_eq!(destination.status, DestinationStatus::Success);
        assert!(destination.platform_post_id.is_some());
        assert!(destination.published_at.is_some());
        assert_eq!(destination.error_message, None);
    }
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;
    make_profile(&db, "li", Platform::Linkedin).await;

    let post = make_post(&db, "hello").await;
    make_destination(&db, &post.id, "tw").await;
    make_destination(&db, &post.id, "li").await;

    let twitter = Arc::new(MockPublisher::success(Platform::Twitter));
    let linkedin = Arc::new(MockPublisher::failing(Platform::Linkedin, "upstream 500"));
    let executor = executor(&db, vec![twitter, linkedin], vec![]);

    executor.execute(&post.id).await.unwrap();

    let destinations = db.get_destinations(&post.id).await.unwrap();
    let tw = destinations.iter().find(|d| d.profile_id == "tw").unwrap();
    let li = destinations.iter().find(|d| d.profile_id == "li").unwrap();

    assert_eq!(tw.status, DestinationStatus::Success);
    assert_eq!(li.status, DestinationStatus::Failed);
    assert!(li.error_message.as_ref().unwrap().contains("upstream 500"));

    let loaded = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PostStatus::Partial);
}

#[tokio::test]
async fn test_all_failed_marks_post_failed() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;

    let post = make_post(&db, "hello").await;
    make_destination(&db, &post.id, "tw").await;

    let twitter = Arc::new(MockPublisher::failing(Platform::Twitter, "down"));
    let executor = executor(&db, vec![twitter], vec![]);

    executor.execute(&post.id).await.unwrap();

    let loaded = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PostStatus::Failed);
}

#[tokio::test]
async fn test_terminal_destination_is_skipped() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;
    make_profile(&db, "fb", Platform::Facebook).await;

    let post = make_post(&db, "hello").await;
    let done = make_destination(&db, &post.id, "tw").await;
    make_destination(&db, &post.id, "fb").await;

    // First destination already published by an earlier pass
    db.claim_destination(&done.id).await.unwrap();
    db.mark_destination_success(&done.id, 1000).await.unwrap();

    let twitter = Arc::new(MockPublisher::success(Platform::Twitter));
    let facebook = Arc::new(MockPublisher::success(Platform::Facebook));
    let executor = executor(&db, vec![twitter.clone(), facebook.clone()], vec![]);

    let outcomes = executor.execute(&post.id).await.unwrap();

    let skipped = outcomes
        .iter()
        .find(|o| o.destination_id == done.id)
        .unwrap();
    assert_eq!(skipped.result, DestinationResult::Skipped);

    // The already-published destination never reached its publisher
    assert_eq!(twitter.call_count(), 0);
    assert_eq!(facebook.call_count(), 1);

    let loaded = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PostStatus::Published);
}

#[tokio::test]
async fn test_thread_chain_reply_linkage() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;

    let post = make_post(&db, "root chunk").await;
    let mut destination = PostDestination::new(post.id.clone(), "tw".to_string());
    destination
        .attach_thread_chain(&[
            ThreadChunk::new("second chunk".to_string()),
            ThreadChunk::new("third chunk".to_string()),
        ])
        .unwrap();
    db.create_destination(&destination).await.unwrap();

    let twitter = Arc::new(MockPublisher::success(Platform::Twitter));
    let executor = executor(&db, vec![twitter.clone()], vec![]);

    executor.execute(&post.id).await.unwrap();

    let published = twitter.published();
    assert_eq!(published.len(), 3);
    assert_eq!(published[0].content, "root chunk");
    assert_eq!(published[0].in_reply_to, None);
    assert_eq!(published[1].content, "second chunk");
    assert_eq!(published[1].in_reply_to.as_deref(), Some("twitter:mock-1"));
    assert_eq!(published[2].content, "third chunk");
    assert_eq!(published[2].in_reply_to.as_deref(), Some("twitter:mock-2"));

    let loaded = db.get_destination(&destination.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DestinationStatus::Success);
    // The root id is what the destination records
    assert_eq!(loaded.platform_post_id.as_deref(), Some("twitter:mock-1"));
}

#[tokio::test]
async fn test_broken_chain_aborts_with_root_id_persisted() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;

    let post = make_post(&db, "root").await;
    let mut destination = PostDestination::new(post.id.clone(), "tw".to_string());
    destination
        .attach_thread_chain(&[
            ThreadChunk::new("second".to_string()),
            ThreadChunk::new("third".to_string()),
        ])
        .unwrap();
    db.create_destination(&destination).await.unwrap();

    // Root call returns an id, the second call returns an empty one
    let twitter = Arc::new(MockPublisher::empty_id_from_call(Platform::Twitter, 2));
    let executor = executor(&db, vec![twitter.clone()], vec![]);

    executor.execute(&post.id).await.unwrap();

    let loaded = db.get_destination(&destination.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DestinationStatus::Failed);
    assert!(loaded
        .error_message
        .as_ref()
        .unwrap()
        .contains("Thread chain broken"));
    // Root went out before the chain broke; its id stays visible
    assert_eq!(loaded.platform_post_id.as_deref(), Some("twitter:mock-1"));
    // The third chunk was never attempted
    assert_eq!(twitter.call_count(), 2);
}

#[tokio::test]
async fn test_restricted_chunk_skipped_without_breaking_chain() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;

    let post = make_post(&db, "root").await;
    let mut destination = PostDestination::new(post.id.clone(), "tw".to_string());
    destination
        .attach_thread_chain(&[
            ThreadChunk {
                content: "for another profile".to_string(),
                media_ids: vec![],
                only_profiles: Some(vec!["someone-else".to_string()]),
            },
            ThreadChunk::new("for everyone".to_string()),
        ])
        .unwrap();
    db.create_destination(&destination).await.unwrap();

    let twitter = Arc::new(MockPublisher::success(Platform::Twitter));
    let executor = executor(&db, vec![twitter.clone()], vec![]);

    executor.execute(&post.id).await.unwrap();

    let published = twitter.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[1].content, "for everyone");
    // The surviving chunk replies to the root, not to the skipped chunk
    assert_eq!(published[1].in_reply_to.as_deref(), Some("twitter:mock-1"));

    let loaded = db.get_destination(&destination.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DestinationStatus::Success);
}

#[tokio::test]
async fn test_rate_limit_recorded_as_failure() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "ig", Platform::Instagram).await;

    let post = make_post(&db, "caption").await;
    let destination = make_destination(&db, &post.id, "ig").await;

    let instagram = Arc::new(MockPublisher::rate_limited(Platform::Instagram));
    let executor = executor(&db, vec![instagram], vec![]);

    executor.execute(&post.id).await.unwrap();

    let loaded = db.get_destination(&destination.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DestinationStatus::Failed);
    assert!(loaded.error_message.as_ref().unwrap().contains("Rate limit"));
}

#[tokio::test]
async fn test_credential_failure_recorded_on_destination() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;

    let post = make_post(&db, "hello").await;
    let destination = make_destination(&db, &post.id, "tw").await;

    let twitter = Arc::new(MockPublisher::success(Platform::Twitter));
    let registry = PublisherRegistry::new(vec![
        twitter.clone() as Arc<dyn libcrosspost::publish::Publisher>
    ])
    .unwrap();
    let executor = PublishExecutor::new(
        db.clone(),
        Arc::new(registry),
        Arc::new(FailingCreds),
        Arc::new(StaticMedia(vec![])),
    );

    executor.execute(&post.id).await.unwrap();

    let loaded = db.get_destination(&destination.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DestinationStatus::Failed);
    assert!(loaded
        .error_message
        .as_ref()
        .unwrap()
        .contains("vault unreachable"));
    // The publisher was never called without credentials
    assert_eq!(twitter.call_count(), 0);
}

#[tokio::test]
async fn test_failed_destination_retries_to_success() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;

    let post = make_post(&db, "hello").await;
    let destination = make_destination(&db, &post.id, "tw").await;

    // First pass fails
    let failing = Arc::new(MockPublisher::failing(Platform::Twitter, "flaky"));
    executor(&db, vec![failing], vec![])
        .execute(&post.id)
        .await
        .unwrap();

    let loaded = db.get_destination(&destination.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DestinationStatus::Failed);

    // Second pass reclaims the failed destination and succeeds
    let healthy = Arc::new(MockPublisher::success(Platform::Twitter));
    executor(&db, vec![healthy], vec![])
        .execute(&post.id)
        .await
        .unwrap();

    let loaded = db.get_destination(&destination.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DestinationStatus::Success);
    assert_eq!(loaded.error_message, None);

    let loaded_post = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(loaded_post.status, PostStatus::Published);
}

#[tokio::test]
async fn test_media_reaches_publisher() {
    let (db, _tmp) = setup_db().await;
    make_profile(&db, "tw", Platform::Twitter).await;

    let mut post = Post::new(
        "ws-1".to_string(),
        "author-1".to_string(),
        "with media".to_string(),
    );
    post.media = vec!["m1".to_string(), "m2".to_string()];
    db.create_post(&post).await.unwrap();

    let mut destination = PostDestination::new(post.id.clone(), "tw".to_string());
    destination
        .attach_thread_chain(&[ThreadChunk {
            content: "chunk with media".to_string(),
            media_ids: vec!["m3".to_string()],
            only_profiles: None,
        }])
        .unwrap();
    db.create_destination(&destination).await.unwrap();

    let twitter = Arc::new(MockPublisher::success(Platform::Twitter));
    let executor = executor(
        &db,
        vec![twitter.clone()],
        vec![image("m1"), image("m2"), image("m3")],
    );

    executor.execute(&post.id).await.unwrap();

    let published = twitter.published();
    assert_eq!(published[0].media_count, 2);
    assert_eq!(published[1].media_count, 1);
}
