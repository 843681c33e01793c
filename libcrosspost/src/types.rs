//! Core types for Crosspost

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Target platforms.
///
/// This is a closed set: adding a platform means adding a variant and
/// binding a publisher in the registry, never a runtime string lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Linkedin,
    Instagram,
    Facebook,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Linkedin => "linkedin",
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
        }
    }

    /// Parse a lowercase platform identifier
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "twitter" => Some(Self::Twitter),
            "linkedin" => Some(Self::Linkedin),
            "instagram" => Some(Self::Instagram),
            "facebook" => Some(Self::Facebook),
            _ => None,
        }
    }

    /// Whether the platform accepts author-specified thread items
    pub fn supports_threads(&self) -> bool {
        matches!(self, Self::Twitter)
    }

    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Linkedin,
        Platform::Instagram,
        Platform::Facebook,
    ];
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Master post status, derived from destination statuses by the aggregator
/// once publishing starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    PendingApproval,
    Scheduled,
    Publishing,
    Published,
    Partial,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Scheduled => "scheduled",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "pending_approval" => Some(Self::PendingApproval),
            "scheduled" => Some(Self::Scheduled),
            "publishing" => Some(Self::Publishing),
            "published" => Some(Self::Published),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Editing is allowed only before the executor has started work.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::PendingApproval | Self::Scheduled)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-destination status. Transitions are monotonic except
/// `Failed -> Publishing` (retry); `Publishing` is only reachable through
/// the atomic claim in the database layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DestinationStatus {
    Scheduled,
    Publishing,
    Success,
    Failed,
}

impl DestinationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Publishing => "publishing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "publishing" => Some(Self::Publishing),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for DestinationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Post,
    Thread,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Thread => "thread",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(Self::Post),
            "thread" => Some(Self::Thread),
            _ => None,
        }
    }
}

/// Master content unit, one row in `posts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub workspace_id: String,
    pub author_id: String,
    pub content: String,
    pub content_type: ContentType,
    pub status: PostStatus,
    /// Effective publish instant (unix seconds, UTC)
    pub scheduled_at: Option<i64>,
    /// IANA timezone name the author scheduled in
    pub timezone: Option<String>,
    pub parent_post_id: Option<String>,
    pub campaign_id: Option<String>,
    /// Media ids attached to the root content
    pub media: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    pub fn new(workspace_id: String, author_id: String, content: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            workspace_id,
            author_id,
            content,
            content_type: ContentType::Post,
            status: PostStatus::Draft,
            scheduled_at: None,
            timezone: None,
            parent_post_id: None,
            campaign_id: None,
            media: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One (post, target profile) publishing unit with its own lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDestination {
    pub id: String,
    pub post_id: String,
    pub profile_id: String,
    pub status: DestinationStatus,
    /// Platform-specific final text; falls back to the post content
    pub content_override: Option<String>,
    /// JSON-serialized ordered thread chain, immutable once attached
    pub metadata: Option<String>,
    /// Assigned by the platform after a successful publish
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    pub published_at: Option<i64>,
    pub updated_at: i64,
}

impl PostDestination {
    pub fn new(post_id: String, profile_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post_id,
            profile_id,
            status: DestinationStatus::Scheduled,
            content_override: None,
            metadata: None,
            platform_post_id: None,
            error_message: None,
            published_at: None,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Text the executor will publish as the root chunk
    pub fn effective_content<'a>(&'a self, post: &'a Post) -> &'a str {
        self.content_override.as_deref().unwrap_or(&post.content)
    }

    /// Deserialize the thread chain attached at preparation time
    pub fn thread_chain(&self) -> crate::Result<Vec<ThreadChunk>> {
        match &self.metadata {
            None => Ok(Vec::new()),
            Some(json) => serde_json::from_str(json).map_err(|e| {
                crate::CrosspostError::InvalidInput(format!(
                    "Corrupt thread chain on destination {}: {}",
                    self.id, e
                ))
            }),
        }
    }

    /// Serialize a chain into destination metadata. Empty chains are stored
    /// as NULL, not `[]`.
    pub fn attach_thread_chain(&mut self, chain: &[ThreadChunk]) -> crate::Result<()> {
        self.metadata = if chain.is_empty() {
            None
        } else {
            Some(serde_json::to_string(chain).map_err(|e| {
                crate::CrosspostError::InvalidInput(format!("Unserializable thread chain: {}", e))
            })?)
        };
        Ok(())
    }
}

/// One follow-up chunk of a thread chain, published as a reply to the
/// previous chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadChunk {
    pub content: String,
    #[serde(default)]
    pub media_ids: Vec<String>,
    /// When set, the chunk publishes only to these profiles; other
    /// destinations skip it without breaking the chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_profiles: Option<Vec<String>>,
}

impl ThreadChunk {
    pub fn new(content: String) -> Self {
        Self {
            content,
            media_ids: Vec::new(),
            only_profiles: None,
        }
    }

    pub fn applies_to(&self, profile_id: &str) -> bool {
        match &self.only_profiles {
            None => true,
            Some(profiles) => profiles.iter().any(|p| p == profile_id),
        }
    }
}

/// A connected social account. Connection flows and credential storage are
/// external; this row only carries what the engine needs to route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub workspace_id: String,
    pub platform: Platform,
    pub display_name: String,
    pub created_at: i64,
}

/// Decrypted credentials handed to a publisher for exactly one call
/// sequence. Wrapped in SecretString so the token is zeroed on drop.
pub struct Credentials {
    pub access_token: SecretString,
    /// Secondary secret some platforms require alongside the token
    pub access_secret: Option<SecretString>,
}

/// Broad media class derived from the MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Video,
    Document,
    Other,
}

/// Media descriptor returned by the external media collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedMedia {
    pub id: String,
    pub url: String,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<u64>,
}

impl ResolvedMedia {
    pub fn class(&self) -> MediaClass {
        let mime = self.mime_type.to_lowercase();
        if mime.starts_with("image/") {
            MediaClass::Image
        } else if mime.starts_with("video/") {
            MediaClass::Video
        } else if mime == "application/pdf" {
            MediaClass::Document
        } else {
            MediaClass::Other
        }
    }

    pub fn is_image(&self) -> bool {
        self.class() == MediaClass::Image
    }

    pub fn is_video(&self) -> bool {
        self.class() == MediaClass::Video
    }

    pub fn is_document(&self) -> bool {
        self.class() == MediaClass::Document
    }
}

/// A delayed publish job, one row in `publish_jobs` keyed by post id.
///
/// `run_at = None` means the job is parked: its retries are exhausted and
/// it needs operator attention before it will run again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub post_id: String,
    pub run_at: Option<i64>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    pub fn is_parked(&self) -> bool {
        self.run_at.is_none()
    }
}
