//! Error types for Crosspost

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosspostError>;

#[derive(Error, Debug)]
pub enum CrosspostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Validation failed: {0}")]
    Prepare(#[from] PrepareError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosspostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosspostError::InvalidInput(_)
            | CrosspostError::Prepare(_)
            | CrosspostError::Schedule(_) => 3,
            CrosspostError::Publish(PublishError::Credentials(_)) => 2,
            CrosspostError::Publish(_)
            | CrosspostError::Config(_)
            | CrosspostError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Scheduled time {scheduled} is in the past")]
    InPast { scheduled: i64 },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Local time '{local}' is ambiguous or invalid in timezone {timezone}")]
    AmbiguousLocalTime { local: String, timezone: String },

    #[error("No free slot available: {0}")]
    SlotUnavailable(String),
}

/// A single violated content constraint.
///
/// Every variant names the exact rule that failed. The rules engine never
/// reports a generic "invalid content" and never truncates to make content
/// fit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Content cannot be empty")]
    EmptyContent,

    #[error("Content length {length} exceeds the {limit} character limit")]
    ContentTooLong { length: usize, limit: usize },

    #[error("Content splits into {chunks} chunks, more than the {max} allowed per thread")]
    ThreadTooLong { chunks: usize, max: usize },

    #[error("Content could not be split into chunks under the {limit} weighted-character limit")]
    Unsplittable { limit: usize },

    #[error("{count} media items attached, at most {max} allowed")]
    TooManyMedia { count: usize, max: usize },

    #[error("A document cannot be combined with images or video")]
    DocumentExclusive,

    #[error("{count} documents attached, at most one allowed")]
    TooManyDocuments { count: usize },

    #[error("{count} videos attached, at most {max} allowed")]
    TooManyVideos { count: usize, max: usize },

    #[error("{count} images attached, at most {max} allowed")]
    TooManyImages { count: usize, max: usize },

    #[error("Image is {width}x{height}, larger than {max} pixels per dimension")]
    ImageTooLarge { width: u32, height: u32, max: u32 },

    #[error("At least one media item is required")]
    MissingMedia,

    #[error("{count} hashtags used, at most {max} allowed")]
    TooManyHashtags { count: usize, max: usize },

    #[error("Unsupported media type: {mime}")]
    UnsupportedMedia { mime: String },

    #[error("Video duration {seconds:.1}s is outside the allowed {min:.0}-{max:.0}s range")]
    VideoDurationOutOfRange { seconds: f64, min: f64, max: f64 },

    #[error("Video width {width}px is below the {min}px minimum")]
    VideoResolutionTooLow { width: u32, min: u32 },

    #[error("Exactly one video is required for this format")]
    SingleVideoRequired,

    #[error("A content override cannot be combined with explicit thread items")]
    OverrideWithExplicitThread,
}

/// A constraint violation attributed to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationViolation {
    pub profile_id: String,
    pub error: ValidationError,
}

/// Aggregate of every problem found while preparing destinations.
///
/// Raised before anything is persisted; the caller sees all violations in
/// one response rather than fixing them one round-trip at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepareError {
    /// Profile ids that do not exist or belong to another workspace
    pub unknown_profiles: Vec<String>,
    /// Per-destination content violations
    pub violations: Vec<DestinationViolation>,
}

impl PrepareError {
    pub fn is_empty(&self) -> bool {
        self.unknown_profiles.is_empty() && self.violations.is_empty()
    }
}

impl std::fmt::Display for PrepareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.unknown_profiles.is_empty() {
            parts.push(format!(
                "unknown or foreign profiles: {}",
                self.unknown_profiles.join(", ")
            ));
        }
        for v in &self.violations {
            parts.push(format!("{}: {}", v.profile_id, v.error));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for PrepareError {}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("Platform rejected the publish: {0}")]
    Platform(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Credential resolution failed: {0}")]
    Credentials(String),

    #[error("Thread chain broken: {0}")]
    BrokenChain(String),

    #[error("No publisher bound for platform: {0}")]
    UnknownPlatform(String),
}
