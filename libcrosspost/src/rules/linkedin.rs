//! LinkedIn content rules
//!
//! Large single-unit character limit, strict media-type exclusivity: a
//! document (PDF) travels alone, videos are capped at one, images at nine
//! and at a maximum pixel size per dimension.

use crate::error::ValidationError;
use crate::types::{MediaClass, ResolvedMedia};

pub const MAX_CHARS: usize = 3000;
pub const MAX_IMAGES: usize = 9;
pub const MAX_VIDEOS: usize = 1;
pub const MAX_IMAGE_DIMENSION: u32 = 6012;

pub fn validate(content: &str, media: &[ResolvedMedia]) -> Result<(), ValidationError> {
    let length = content.chars().count();
    if length > MAX_CHARS {
        return Err(ValidationError::ContentTooLong {
            length,
            limit: MAX_CHARS,
        });
    }

    let mut images = 0usize;
    let mut videos = 0usize;
    let mut documents = 0usize;

    for item in media {
        match item.class() {
            MediaClass::Image => images += 1,
            MediaClass::Video => videos += 1,
            MediaClass::Document => documents += 1,
            MediaClass::Other => {
                return Err(ValidationError::UnsupportedMedia {
                    mime: item.mime_type.clone(),
                });
            }
        }
    }

    if documents > 0 {
        if documents > 1 {
            return Err(ValidationError::TooManyDocuments { count: documents });
        }
        if images > 0 || videos > 0 {
            return Err(ValidationError::DocumentExclusive);
        }
    }

    if videos > MAX_VIDEOS {
        return Err(ValidationError::TooManyVideos {
            count: videos,
            max: MAX_VIDEOS,
        });
    }

    if images > MAX_IMAGES {
        return Err(ValidationError::TooManyImages {
            count: images,
            max: MAX_IMAGES,
        });
    }

    for item in media.iter().filter(|m| m.is_image()) {
        let width = item.width.unwrap_or(0);
        let height = item.height.unwrap_or(0);
        if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
            return Err(ValidationError::ImageTooLarge {
                width,
                height,
                max: MAX_IMAGE_DIMENSION,
            });
        }
    }

    Ok(())
}
