//! Publishing executor
//!
//! Consumes a due publish job and drives every destination of the post
//! through its state machine: atomic claim, platform dispatch, ordered
//! thread-chain replay with reply linking, and outcome recording. One
//! destination's failure never touches its siblings; database errors
//! propagate out so the queue's retry policy re-attempts the whole task.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{PublishError, Result};
use crate::publish::{CredentialResolver, MediaResolver, PublishPayload, PublisherRegistry};
use crate::status;
use crate::types::{Post, PostDestination, PostStatus, Profile, ResolvedMedia, ThreadChunk};

/// What happened to one destination during a pass
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationResult {
    Published { platform_post_id: String },
    Failed { error: String },
    /// Another worker already claimed the destination, or it is terminal
    Skipped,
}

#[derive(Debug, Clone)]
pub struct DestinationOutcome {
    pub destination_id: String,
    pub profile_id: String,
    pub result: DestinationResult,
}

pub struct PublishExecutor {
    db: Database,
    publishers: Arc<PublisherRegistry>,
    credentials: Arc<dyn CredentialResolver>,
    media: Arc<dyn MediaResolver>,
}

impl PublishExecutor {
    pub fn new(
        db: Database,
        publishers: Arc<PublisherRegistry>,
        credentials: Arc<dyn CredentialResolver>,
        media: Arc<dyn MediaResolver>,
    ) -> Self {
        Self {
            db,
            publishers,
            credentials,
            media,
        }
    }

    /// Run one publish pass for a post.
    ///
    /// Destinations are processed concurrently; within a destination the
    /// thread chain is strictly sequential because each chunk replies to
    /// the platform id of the previous one.
    pub async fn execute(&self, post_id: &str) -> Result<Vec<DestinationOutcome>> {
        let Some(loaded) = self.db.get_post_with_destinations(post_id).await? else {
            return Err(crate::CrosspostError::InvalidInput(format!(
                "Post not found: {}",
                post_id
            )));
        };
        let post = loaded.post;
        let destinations = loaded.destinations;

        info!(
            post_id,
            destinations = destinations.len(),
            "starting publish pass"
        );
        self.db
            .update_post_status(post_id, PostStatus::Publishing)
            .await?;

        let profiles = self.load_profiles(&destinations).await?;
        let media_by_id = self.load_media(&post, &destinations).await?;

        // A destination whose profile disappeared can never publish; fail
        // it here instead of leaving it claimed-nothing forever
        let mut futures = Vec::new();
        let mut orphaned = Vec::new();
        for destination in &destinations {
            match profiles.get(&destination.profile_id) {
                Some(profile) => {
                    futures.push(self.run_destination(&post, destination, profile, &media_by_id));
                }
                None => orphaned.push(destination),
            }
        }

        let mut early_outcomes = Vec::new();
        for destination in orphaned {
            let message = format!("Profile not found: {}", destination.profile_id);
            warn!(destination_id = %destination.id, error = %message, "orphaned destination");
            if self.db.claim_destination(&destination.id).await? {
                self.db
                    .mark_destination_failed(&destination.id, &message)
                    .await?;
            }
            early_outcomes.push(DestinationOutcome {
                destination_id: destination.id.clone(),
                profile_id: destination.profile_id.clone(),
                result: DestinationResult::Failed { error: message },
            });
        }

        let results = join_all(futures).await;

        // Recompute the master status even when a destination hit a system
        // error; whatever was recorded so far should be visible.
        let outcomes: Result<Vec<DestinationOutcome>> = results.into_iter().collect();
        status::recompute(&self.db, post_id).await?;

        let mut outcomes = outcomes?;
        outcomes.extend(early_outcomes);
        Ok(outcomes)
    }

    async fn load_profiles(
        &self,
        destinations: &[PostDestination],
    ) -> Result<HashMap<String, Profile>> {
        let ids: Vec<String> = destinations.iter().map(|d| d.profile_id.clone()).collect();
        let profiles = self.db.get_profiles(&ids).await?;
        Ok(profiles.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    /// One resolver call for every media id the pass can touch
    async fn load_media(
        &self,
        post: &Post,
        destinations: &[PostDestination],
    ) -> Result<HashMap<String, ResolvedMedia>> {
        let mut ids: Vec<String> = post.media.clone();
        for destination in destinations {
            for chunk in destination.thread_chain()? {
                ids.extend(chunk.media_ids);
            }
        }
        ids.sort();
        ids.dedup();

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let resolved = self.media.resolve(&ids).await?;
        Ok(resolved.into_iter().map(|m| (m.id.clone(), m)).collect())
    }

    /// Drive one destination to a terminal state. Publish failures are
    /// recorded here and isolated; only infrastructure errors return Err.
    async fn run_destination(
        &self,
        post: &Post,
        destination: &PostDestination,
        profile: &Profile,
        media_by_id: &HashMap<String, ResolvedMedia>,
    ) -> Result<DestinationOutcome> {
        let outcome = |result| DestinationOutcome {
            destination_id: destination.id.clone(),
            profile_id: destination.profile_id.clone(),
            result,
        };

        if !self.db.claim_destination(&destination.id).await? {
            debug!(
                destination_id = %destination.id,
                "destination already claimed or terminal, skipping"
            );
            return Ok(outcome(DestinationResult::Skipped));
        }

        match self
            .publish_claimed(post, destination, profile, media_by_id)
            .await?
        {
            Ok(platform_post_id) => {
                self.db
                    .mark_destination_success(&destination.id, chrono::Utc::now().timestamp())
                    .await?;
                info!(
                    destination_id = %destination.id,
                    platform = %profile.platform,
                    platform_post_id,
                    "destination published"
                );
                Ok(outcome(DestinationResult::Published { platform_post_id }))
            }
            Err(error) => {
                let message = error.to_string();
                warn!(
                    destination_id = %destination.id,
                    platform = %profile.platform,
                    error = %message,
                    "destination publish failed"
                );
                self.db
                    .mark_destination_failed(&destination.id, &message)
                    .await?;
                Ok(outcome(DestinationResult::Failed { error: message }))
            }
        }
    }

    /// Publish the root chunk and replay the thread chain in order.
    ///
    /// The outer Result carries infrastructure errors; the inner one is the
    /// publish outcome recorded on the destination.
    async fn publish_claimed(
        &self,
        post: &Post,
        destination: &PostDestination,
        profile: &Profile,
        media_by_id: &HashMap<String, ResolvedMedia>,
    ) -> Result<std::result::Result<String, PublishError>> {
        let publisher = match self.publishers.get(profile.platform) {
            Ok(p) => p,
            Err(e) => return Ok(Err(e)),
        };

        let chain = match destination.thread_chain() {
            Ok(chain) => chain,
            Err(e) => return Ok(Err(PublishError::BrokenChain(e.to_string()))),
        };

        // Decrypted immediately before use; dropped with this stack frame
        let credentials = match self.credentials.resolve(profile).await {
            Ok(c) => c,
            Err(e) => return Ok(Err(e)),
        };

        let root_payload = PublishPayload {
            content: destination.effective_content(post).to_string(),
            media: gather_media(&post.media, media_by_id),
            in_reply_to: None,
        };

        let root = match publisher.publish(&credentials, root_payload).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(Err(e)),
        };
        if root.platform_post_id.is_empty() {
            return Ok(Err(PublishError::BrokenChain(
                "platform returned no post id for the root chunk".to_string(),
            )));
        }

        // Persist the root id before replaying the chain so a retry after a
        // mid-chain crash can see what already went out
        self.db
            .set_destination_platform_post_id(&destination.id, &root.platform_post_id)
            .await?;

        if let Err(e) = self
            .replay_chain(
                &chain,
                destination,
                publisher.as_ref(),
                &credentials,
                media_by_id,
                &root.platform_post_id,
            )
            .await
        {
            return Ok(Err(e));
        }

        Ok(Ok(root.platform_post_id))
    }

    /// Iterate the chain with an explicit previous-id accumulator; each
    /// chunk replies to the chunk before it.
    async fn replay_chain(
        &self,
        chain: &[ThreadChunk],
        destination: &PostDestination,
        publisher: &dyn crate::publish::Publisher,
        credentials: &crate::types::Credentials,
        media_by_id: &HashMap<String, ResolvedMedia>,
        root_id: &str,
    ) -> std::result::Result<(), PublishError> {
        let mut previous_id = root_id.to_string();

        for (index, chunk) in chain.iter().enumerate() {
            if !chunk.applies_to(&destination.profile_id) {
                debug!(
                    destination_id = %destination.id,
                    index,
                    "chunk restricted to other profiles, skipping"
                );
                continue;
            }

            let payload = PublishPayload {
                content: chunk.content.clone(),
                media: gather_media(&chunk.media_ids, media_by_id),
                in_reply_to: Some(previous_id.clone()),
            };

            let outcome = publisher.publish(credentials, payload).await?;
            if outcome.platform_post_id.is_empty() {
                // Without an id the next chunk has no reply target; better
                // to stop than to publish a detached remainder
                return Err(PublishError::BrokenChain(format!(
                    "platform returned no post id for chunk {}",
                    index + 1
                )));
            }

            previous_id = outcome.platform_post_id;
        }

        Ok(())
    }
}

fn gather_media(
    ids: &[String],
    media_by_id: &HashMap<String, ResolvedMedia>,
) -> Vec<ResolvedMedia> {
    ids.iter()
        .filter_map(|id| media_by_id.get(id).cloned())
        .collect()
}
