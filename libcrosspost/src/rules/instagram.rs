//! Instagram content rules
//!
//! Media-first platform: a post always needs at least one item. Captions
//! and hashtags are capped. Reel mode takes exactly one bounded video;
//! feed mode takes a capped carousel.

use crate::error::ValidationError;
use crate::rules::{count_hashtags, PostMode};
use crate::types::{MediaClass, ResolvedMedia};

pub const MAX_CAPTION: usize = 2200;
pub const MAX_HASHTAGS: usize = 30;
pub const MAX_CAROUSEL_ITEMS: usize = 10;
pub const REEL_MIN_SECONDS: f64 = 3.0;
pub const REEL_MAX_SECONDS: f64 = 90.0;
pub const MIN_VIDEO_WIDTH: u32 = 540;

const SUPPORTED_MIMES: [&str; 4] = ["image/jpeg", "image/png", "video/mp4", "video/quicktime"];

pub fn validate(
    content: &str,
    media: &[ResolvedMedia],
    mode: PostMode,
) -> Result<(), ValidationError> {
    let length = content.chars().count();
    if length > MAX_CAPTION {
        return Err(ValidationError::ContentTooLong {
            length,
            limit: MAX_CAPTION,
        });
    }

    let hashtags = count_hashtags(content);
    if hashtags > MAX_HASHTAGS {
        return Err(ValidationError::TooManyHashtags {
            count: hashtags,
            max: MAX_HASHTAGS,
        });
    }

    if media.is_empty() {
        return Err(ValidationError::MissingMedia);
    }

    for item in media {
        if !SUPPORTED_MIMES.contains(&item.mime_type.to_lowercase().as_str()) {
            return Err(ValidationError::UnsupportedMedia {
                mime: item.mime_type.clone(),
            });
        }
    }

    match mode {
        PostMode::Short => validate_reel(media),
        PostMode::Feed => {
            if media.len() > MAX_CAROUSEL_ITEMS {
                return Err(ValidationError::TooManyMedia {
                    count: media.len(),
                    max: MAX_CAROUSEL_ITEMS,
                });
            }
            Ok(())
        }
    }
}

fn validate_reel(media: &[ResolvedMedia]) -> Result<(), ValidationError> {
    if media.len() != 1 || media[0].class() != MediaClass::Video {
        return Err(ValidationError::SingleVideoRequired);
    }

    let video = &media[0];
    let seconds = video.duration_seconds.unwrap_or(0.0);
    if !(REEL_MIN_SECONDS..=REEL_MAX_SECONDS).contains(&seconds) {
        return Err(ValidationError::VideoDurationOutOfRange {
            seconds,
            min: REEL_MIN_SECONDS,
            max: REEL_MAX_SECONDS,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str) -> ResolvedMedia {
        ResolvedMedia {
            id: id.to_string(),
            url: format!("https://cdn.example.com/{}.jpg", id),
            mime_type: "image/jpeg".to_string(),
            width: Some(1080),
            height: Some(1350),
            duration_seconds: None,
            size_bytes: Some(300_000),
        }
    }

    fn video(seconds: f64, width: u32) -> ResolvedMedia {
        ResolvedMedia {
            id: "v".to_string(),
            url: "https://cdn.example.com/v.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            width: Some(width),
            height: Some(1920),
            duration_seconds: Some(seconds),
            size_bytes: Some(5_000_000),
        }
    }

    #[test]
    fn test_feed_post_ok() {
        assert!(validate("Sunset #nofilter", &[image("m1")], PostMode::Feed).is_ok());
    }

    #[test]
    fn test_media_required() {
        assert_eq!(
            validate("caption only", &[], PostMode::Feed).unwrap_err(),
            ValidationError::MissingMedia
        );
    }

    #[test]
    fn test_caption_too_long() {
        let caption = "a".repeat(MAX_CAPTION + 1);
        assert!(matches!(
            validate(&caption, &[image("m1")], PostMode::Feed),
            Err(ValidationError::ContentTooLong { limit: MAX_CAPTION, .. })
        ));
    }

    #[test]
    fn test_hashtag_ceiling() {
        let caption: String = (0..31).map(|i| format!("#tag{} ", i)).collect();
        assert_eq!(
            validate(&caption, &[image("m1")], PostMode::Feed).unwrap_err(),
            ValidationError::TooManyHashtags { count: 31, max: 30 }
        );
    }

    #[test]
    fn test_thirty_hashtags_ok() {
        let caption: String = (0..30).map(|i| format!("#tag{} ", i)).collect();
        assert!(validate(&caption, &[image("m1")], PostMode::Feed).is_ok());
    }

    #[test]
    fn test_unsupported_mime() {
        let mut gif = image("g");
        gif.mime_type = "image/tiff".to_string();
        assert!(matches!(
            validate("odd format", &[gif], PostMode::Feed),
            Err(ValidationError::UnsupportedMedia { .. })
        ));
    }

    #[test]
    fn test_carousel_cap() {
        let items: Vec<_> = (0..11).map(|i| image(&format!("m{}", i))).collect();
        assert_eq!(
            validate("big carousel", &items, PostMode::Feed).unwrap_err(),
            ValidationError::TooManyMedia { count: 11, max: 10 }
        );
    }

    #[test]
    fn test_reel_ok() {
        assert!(validate("New reel", &[video(30.0, 1080)], PostMode::Short).is_ok());
    }

    #[test]
    fn test_reel_requires_single_video() {
        assert_eq!(
            validate("reel", &[image("m1")], PostMode::Short).unwrap_err(),
            ValidationError::SingleVideoRequired
        );
        assert_eq!(
            validate("reel", &[video(30.0, 1080), video(30.0, 1080)], PostMode::Short)
                .unwrap_err(),
            ValidationError::SingleVideoRequired
        );
    }

    #[test]
    fn test_reel_duration_bounds() {
        assert!(matches!(
            validate("too short", &[video(1.0, 1080)], PostMode::Short),
            Err(ValidationError::VideoDurationOutOfRange { .. })
        ));
        assert!(matches!(
            validate("too long", &[video(120.0, 1080)], PostMode::Short),
            Err(ValidationError::VideoDurationOutOfRange { .. })
        ));
    }

    #[test]
    fn test_reel_resolution_floor() {
        assert_eq!(
            validate("tiny", &[video(30.0, 320)], PostMode::Short).unwrap_err(),
            ValidationError::VideoResolutionTooLow { width: 320, min: 540 }
        );
    }
}
