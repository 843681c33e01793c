//! Authoring service
//!
//! Front door for creating, approving, editing, and deleting posts. All
//! validation happens before the first row is written; queue state is kept
//! in step with the post's schedule on every mutation.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::Result;
use crate::prepare::{DestinationPreparer, DestinationRequest, PrepareRequest, ThreadItemRequest};
use crate::queue::JobQueue;
use crate::schedule::{ScheduleRequest, ScheduleResolver};
use crate::types::{ContentType, Post, PostDestination, PostStatus};

#[derive(Debug, Clone, Default)]
pub struct CreatePostRequest {
    pub author_id: String,
    pub content: String,
    pub media: Vec<String>,
    pub destinations: Vec<DestinationRequest>,
    pub thread: Vec<ThreadItemRequest>,
    pub schedule: ScheduleRequest,
    pub campaign_id: Option<String>,
    pub parent_post_id: Option<String>,
}

/// Fields an edit may change. Omitted destinations are rebuilt from the
/// stored profile set with fresh engine output; callers using
/// per-destination overrides pass destinations explicitly.
#[derive(Debug, Clone, Default)]
pub struct EditPostRequest {
    pub content: Option<String>,
    pub media: Option<Vec<String>>,
    pub destinations: Option<Vec<DestinationRequest>>,
    pub thread: Option<Vec<ThreadItemRequest>>,
    pub schedule: Option<ScheduleRequest>,
}

pub struct PostService {
    db: Database,
    queue: JobQueue,
    preparer: DestinationPreparer,
    schedule: ScheduleResolver,
}

impl PostService {
    pub fn new(
        db: Database,
        queue: JobQueue,
        preparer: DestinationPreparer,
        schedule: ScheduleResolver,
    ) -> Self {
        Self {
            db,
            queue,
            preparer,
            schedule,
        }
    }

    /// Create a post with its destinations and, when scheduled, its publish
    /// job. Validation failures surface before anything is persisted.
    pub async fn create(&self, workspace_id: &str, request: CreatePostRequest) -> Result<Post> {
        if request.destinations.is_empty() {
            return Err(crate::CrosspostError::InvalidInput(
                "A post needs at least one destination".to_string(),
            ));
        }

        let resolved = self.schedule.resolve(workspace_id, &request.schedule).await?;

        let prepare_request = PrepareRequest {
            content: request.content.clone(),
            media: request.media.clone(),
            destinations: request.destinations,
            thread: request.thread,
        };
        let payloads = self.preparer.prepare(workspace_id, &prepare_request).await?;

        let mut post = Post::new(
            workspace_id.to_string(),
            request.author_id,
            request.content,
        );
        post.content_type = if prepare_request.thread.is_empty() {
            ContentType::Post
        } else {
            ContentType::Thread
        };
        post.status = resolved.status;
        post.scheduled_at = resolved.scheduled_at.map(|t| t.timestamp());
        post.timezone = request.schedule.timezone.clone();
        post.campaign_id = request.campaign_id;
        post.parent_post_id = request.parent_post_id;
        post.media = request.media;

        self.db.create_post(&post).await?;

        for payload in &payloads {
            let mut destination =
                PostDestination::new(post.id.clone(), payload.profile_id.clone());
            if payload.content != post.content {
                destination.content_override = Some(payload.content.clone());
            }
            destination.attach_thread_chain(&payload.thread_chain)?;
            self.db.create_destination(&destination).await?;
        }

        if post.status == PostStatus::Scheduled {
            if let Some(at) = resolved.scheduled_at {
                self.queue.schedule(&post.id, at).await?;
            }
        }

        info!(
            post_id = %post.id,
            status = %post.status,
            destinations = payloads.len(),
            "post created"
        );
        Ok(post)
    }

    /// Move a pending-approval post into the schedule.
    pub async fn approve(&self, post_id: &str) -> Result<Post> {
        let mut post = self.require_post(post_id).await?;

        if post.status != PostStatus::PendingApproval {
            return Err(crate::CrosspostError::InvalidInput(format!(
                "Post {} is {}, not pending approval",
                post_id, post.status
            )));
        }

        post.status = if post.scheduled_at.is_some() {
            PostStatus::Scheduled
        } else {
            PostStatus::Draft
        };

        self.db
            .update_post_schedule(
                post_id,
                post.scheduled_at,
                post.timezone.as_deref(),
                post.status,
            )
            .await?;

        if let Some(at) = post.scheduled_at {
            self.queue
                .schedule(post_id, DateTime::from_timestamp(at, 0).unwrap_or_else(Utc::now))
                .await?;
        }

        info!(post_id, status = %post.status, "post approved");
        Ok(post)
    }

    /// Edit content, media, destinations, or schedule. Rejected once the
    /// executor has started work on the post.
    pub async fn edit(&self, post_id: &str, edit: EditPostRequest) -> Result<Post> {
        let post = self.require_post(post_id).await?;

        if !post.status.is_editable() {
            return Err(crate::CrosspostError::InvalidInput(format!(
                "Post {} is {} and can no longer be edited",
                post_id, post.status
            )));
        }

        let content = edit.content.unwrap_or_else(|| post.content.clone());
        let media = edit.media.unwrap_or_else(|| post.media.clone());

        let destinations = match edit.destinations {
            Some(destinations) => destinations,
            None => {
                let stored = self.db.get_destinations(post_id).await?;
                stored
                    .iter()
                    .map(|d| DestinationRequest::new(d.profile_id.clone()))
                    .collect()
            }
        };

        // Re-resolve the schedule when the edit touches it; otherwise the
        // post keeps its current time and status
        let (scheduled_at, timezone, status) = match &edit.schedule {
            Some(request) => {
                let resolved = self.schedule.resolve(&post.workspace_id, request).await?;
                (
                    resolved.scheduled_at.map(|t| t.timestamp()),
                    request.timezone.clone(),
                    resolved.status,
                )
            }
            None => (post.scheduled_at, post.timezone.clone(), post.status),
        };

        let prepare_request = PrepareRequest {
            content: content.clone(),
            media: media.clone(),
            destinations,
            thread: edit.thread.unwrap_or_default(),
        };
        let payloads = self
            .preparer
            .prepare(&post.workspace_id, &prepare_request)
            .await?;

        self.db.update_post_content(post_id, &content, &media).await?;
        self.db
            .update_post_schedule(post_id, scheduled_at, timezone.as_deref(), status)
            .await?;

        let mut replacements = Vec::new();
        for payload in &payloads {
            let mut destination = PostDestination::new(post_id.to_string(), payload.profile_id.clone());
            if payload.content != content {
                destination.content_override = Some(payload.content.clone());
            }
            destination.attach_thread_chain(&payload.thread_chain)?;
            replacements.push(destination);
        }
        self.db.replace_destinations(post_id, &replacements).await?;

        self.sync_queue(post_id, &post, scheduled_at, status).await?;

        self.require_post(post_id).await
    }

    /// Delete a post, its destinations, and any queued job.
    pub async fn delete(&self, post_id: &str) -> Result<()> {
        // The job goes first so a worker cannot dequeue it mid-delete
        self.queue.cancel(post_id).await?;
        self.db.delete_post(post_id).await?;
        info!(post_id, "post deleted");
        Ok(())
    }

    /// Align the queued job with the post's new schedule. Left untouched
    /// when neither the effective time nor the scheduled-ness changed.
    async fn sync_queue(
        &self,
        post_id: &str,
        before: &Post,
        scheduled_at: Option<i64>,
        status: PostStatus,
    ) -> Result<()> {
        let was = (before.scheduled_at, before.status == PostStatus::Scheduled);
        let now = (scheduled_at, status == PostStatus::Scheduled);

        if was == now {
            debug!(post_id, "schedule unchanged, keeping existing job");
            return Ok(());
        }

        self.queue.cancel(post_id).await?;

        if let (Some(at), true) = now {
            self.queue
                .schedule(post_id, DateTime::from_timestamp(at, 0).unwrap_or_else(Utc::now))
                .await?;
        }

        Ok(())
    }

    async fn require_post(&self, post_id: &str) -> Result<Post> {
        self.db.get_post(post_id).await?.ok_or_else(|| {
            crate::CrosspostError::InvalidInput(format!("Post not found: {}", post_id))
        })
    }
}
