//! Content rules engine
//!
//! Pure validation and transformation of authored content against
//! platform-specific constraints. Given raw content, a platform, and the
//! attached media descriptors, returns either a single valid payload or a
//! primary chunk plus an ordered thread chain. No I/O; every failure names
//! the violated constraint.

use crate::error::ValidationError;
use crate::types::{Platform, ResolvedMedia, ThreadChunk};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod twitter;

/// Whether the content targets the standard feed or a short-form vertical
/// video placement (reel/story). Platforms without a short-form mode ignore
/// this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostMode {
    #[default]
    Feed,
    Short,
}

/// The validated, possibly transformed result for one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedContent {
    /// Final root content
    pub content: String,
    /// Follow-up chunks, in publish order. Empty for a single post.
    pub thread_chain: Vec<ThreadChunk>,
}

impl PreparedContent {
    pub fn single(content: String) -> Self {
        Self {
            content,
            thread_chain: Vec::new(),
        }
    }
}

/// Validate content for a platform, auto-splitting into a thread chain
/// where the platform requires it.
pub fn validate_and_transform(
    platform: Platform,
    content: &str,
    media: &[ResolvedMedia],
    mode: PostMode,
) -> Result<PreparedContent, ValidationError> {
    if content.trim().is_empty() && media.is_empty() {
        return Err(ValidationError::EmptyContent);
    }

    match platform {
        Platform::Twitter => twitter::validate_and_transform(content, media),
        Platform::Linkedin => {
            linkedin::validate(content, media)?;
            Ok(PreparedContent::single(content.to_string()))
        }
        Platform::Instagram => {
            instagram::validate(content, media, mode)?;
            Ok(PreparedContent::single(content.to_string()))
        }
        Platform::Facebook => {
            facebook::validate(content, media, mode)?;
            Ok(PreparedContent::single(content.to_string()))
        }
    }
}

/// Count hashtag tokens ("#word") in content
pub(crate) fn count_hashtags(content: &str) -> usize {
    content
        .split_whitespace()
        .filter(|word| {
            word.starts_with('#') && word.len() > 1 && !word[1..].starts_with('#')
        })
        .count()
}
