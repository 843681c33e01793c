//! Destination preparation
//!
//! Turns one authoring request into per-destination payloads: resolves the
//! target profiles against the workspace, fetches every referenced media
//! descriptor once, applies per-destination content overrides, merges
//! explicit author threads or engine-produced auto-split chains, and
//! reports every validation problem in a single aggregate error before
//! anything is persisted.

use std::collections::HashMap;
use std::sync::Arc;

use crate::db::Database;
use crate::error::{DestinationViolation, PrepareError, Result, ValidationError};
use crate::publish::MediaResolver;
use crate::rules::{self, PostMode};
use crate::types::{Platform, Profile, ResolvedMedia, ThreadChunk};

/// One requested destination
#[derive(Debug, Clone)]
pub struct DestinationRequest {
    pub profile_id: String,
    /// Platform-specific replacement for the root content
    pub content_override: Option<String>,
    /// Short-form placement (reel/story) where the platform supports it
    pub mode: PostMode,
}

impl DestinationRequest {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            content_override: None,
            mode: PostMode::Feed,
        }
    }
}

/// One author-specified follow-up item for thread-capable platforms
#[derive(Debug, Clone)]
pub struct ThreadItemRequest {
    pub content: String,
    pub media: Vec<String>,
    /// Restrict the item to these profiles; None publishes it everywhere
    pub only_profiles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct PrepareRequest {
    pub content: String,
    /// Media ids attached to the root content
    pub media: Vec<String>,
    pub destinations: Vec<DestinationRequest>,
    /// Explicit thread items; only thread-capable platforms consume them
    pub thread: Vec<ThreadItemRequest>,
}

/// The validated result for one destination, ready to persist
#[derive(Debug, Clone)]
pub struct DestinationPayload {
    pub profile_id: String,
    pub platform: Platform,
    /// Final per-destination text
    pub content: String,
    pub thread_chain: Vec<ThreadChunk>,
}

pub struct DestinationPreparer {
    db: Database,
    media: Arc<dyn MediaResolver>,
}

impl DestinationPreparer {
    pub fn new(db: Database, media: Arc<dyn MediaResolver>) -> Self {
        Self { db, media }
    }

    /// Prepare per-destination payloads, or fail with the full list of
    /// problems. Nothing is persisted here.
    pub async fn prepare(
        &self,
        workspace_id: &str,
        request: &PrepareRequest,
    ) -> Result<Vec<DestinationPayload>> {
        let profiles = self.resolve_profiles(workspace_id, request).await?;
        let media_by_id = self.resolve_media(request).await?;

        let root_media = collect_media(&request.media, &media_by_id);

        let mut payloads = Vec::new();
        let mut violations = Vec::new();

        for destination in &request.destinations {
            let profile = &profiles[&destination.profile_id];

            match self.prepare_destination(destination, profile, request, &root_media) {
                Ok(payload) => payloads.push(payload),
                Err(errors) => {
                    violations.extend(errors.into_iter().map(|error| DestinationViolation {
                        profile_id: destination.profile_id.clone(),
                        error,
                    }));
                }
            }
        }

        if !violations.is_empty() {
            return Err(PrepareError {
                unknown_profiles: Vec::new(),
                violations,
            }
            .into());
        }

        Ok(payloads)
    }

    /// Resolve every target profile, failing fast with an aggregate error
    /// listing each id that is missing or owned by another workspace.
    async fn resolve_profiles(
        &self,
        workspace_id: &str,
        request: &PrepareRequest,
    ) -> Result<HashMap<String, Profile>> {
        let ids: Vec<String> = request
            .destinations
            .iter()
            .map(|d| d.profile_id.clone())
            .collect();

        let found = self.db.get_profiles(&ids).await?;
        let by_id: HashMap<String, Profile> = found
            .into_iter()
            .filter(|p| p.workspace_id == workspace_id)
            .map(|p| (p.id.clone(), p))
            .collect();

        let unknown: Vec<String> = ids
            .iter()
            .filter(|id| !by_id.contains_key(*id))
            .cloned()
            .collect();

        if !unknown.is_empty() {
            return Err(PrepareError {
                unknown_profiles: unknown,
                violations: Vec::new(),
            }
            .into());
        }

        Ok(by_id)
    }

    /// Fetch every referenced media id in one resolver call
    async fn resolve_media(
        &self,
        request: &PrepareRequest,
    ) -> Result<HashMap<String, ResolvedMedia>> {
        let mut ids: Vec<String> = request.media.clone();
        for item in &request.thread {
            ids.extend(item.media.iter().cloned());
        }
        ids.sort();
        ids.dedup();

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let resolved = self.media.resolve(&ids).await?;
        Ok(resolved.into_iter().map(|m| (m.id.clone(), m)).collect())
    }

    fn prepare_destination(
        &self,
        destination: &DestinationRequest,
        profile: &Profile,
        request: &PrepareRequest,
        root_media: &[ResolvedMedia],
    ) -> std::result::Result<DestinationPayload, Vec<ValidationError>> {
        let platform = profile.platform;

        if platform.supports_threads() && !request.thread.is_empty() {
            return self.prepare_explicit_thread(destination, platform, request, root_media);
        }

        let content = destination
            .content_override
            .as_deref()
            .unwrap_or(&request.content);

        let prepared =
            rules::validate_and_transform(platform, content, root_media, destination.mode)
                .map_err(|e| vec![e])?;

        Ok(DestinationPayload {
            profile_id: destination.profile_id.clone(),
            platform,
            content: prepared.content,
            thread_chain: prepared.thread_chain,
        })
    }

    /// Author-specified thread: each item validates independently, and a
    /// content override alongside explicit items is ambiguous intent.
    fn prepare_explicit_thread(
        &self,
        destination: &DestinationRequest,
        platform: Platform,
        request: &PrepareRequest,
        root_media: &[ResolvedMedia],
    ) -> std::result::Result<DestinationPayload, Vec<ValidationError>> {
        let mut errors = Vec::new();

        if destination.content_override.is_some() {
            errors.push(ValidationError::OverrideWithExplicitThread);
        }

        if let Err(e) =
            rules::twitter::validate_thread_item(&request.content, root_media.len())
        {
            errors.push(e);
        }

        for item in &request.thread {
            if let Err(e) = rules::twitter::validate_thread_item(&item.content, item.media.len()) {
                errors.push(e);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let thread_chain = request
            .thread
            .iter()
            .map(|item| ThreadChunk {
                content: item.content.clone(),
                media_ids: item.media.clone(),
                only_profiles: item.only_profiles.clone(),
            })
            .collect();

        Ok(DestinationPayload {
            profile_id: destination.profile_id.clone(),
            platform,
            content: request.content.clone(),
            thread_chain,
        })
    }
}

fn collect_media(
    ids: &[String],
    media_by_id: &HashMap<String, ResolvedMedia>,
) -> Vec<ResolvedMedia> {
    ids.iter()
        .filter_map(|id| media_by_id.get(id).cloned())
        .collect()
}
