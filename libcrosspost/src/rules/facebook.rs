//! Facebook content rules
//!
//! Permissive default feed with a very high character ceiling; media count
//! and mime validity still apply, and the story/reel sub-mode carries the
//! stricter short-form video bounds.

use crate::error::ValidationError;
use crate::rules::PostMode;
use crate::types::{MediaClass, ResolvedMedia};

pub const MAX_CHARS: usize = 63_206;
pub const MAX_MEDIA: usize = 10;
pub const STORY_MAX_SECONDS: f64 = 60.0;
pub const STORY_MIN_SECONDS: f64 = 1.0;
pub const MIN_VIDEO_WIDTH: u32 = 540;

pub fn validate(
    content: &str,
    media: &[ResolvedMedia],
    mode: PostMode,
) -> Result<(), ValidationError> {
    let length = content.chars().count();
    if length > MAX_CHARS {
        return Err(ValidationError::ContentTooLong {
            length,
            limit: MAX_CHARS,
        });
    }

    for item in media {
        match item.class() {
            MediaClass::Image | MediaClass::Video => {}
            MediaClass::Document | MediaClass::Other => {
                return Err(ValidationError::UnsupportedMedia {
                    mime: item.mime_type.clone(),
                });
            }
        }
    }

    match mode {
        PostMode::Short => validate_story(media),
        PostMode::Feed => {
            if media.len() > MAX_MEDIA {
                return Err(ValidationError::TooManyMedia {
                    count: media.len(),
                    max: MAX_MEDIA,
                });
            }
            Ok(())
        }
    }
}

fn validate_story(media: &[ResolvedMedia]) -> Result<(), ValidationError> {
    if media.len() != 1 || media[0].class() != MediaClass::Video {
        return Err(ValidationError::SingleVideoRequired);
    }

    let video = &media[0];
    let seconds = video.duration_seconds.unwrap_or(0.0);
    if !(STORY_MIN_SECONDS..=STORY_MAX_SECONDS).contains(&seconds) {
        return Err(ValidationError::VideoDurationOutOfRange {
            seconds,
            min: STORY_MIN_SECONDS,
            max: STORY_MAX_SECONDS,
        });
    }

    let width = video.width.unwrap_or(0);
    if width < MIN_VIDEO_WIDTH {
        return Err(ValidationError::VideoResolutionTooLow {
            width,
            min: MIN_VIDEO_WIDTH,
        });
    }

    Ok(())
}
