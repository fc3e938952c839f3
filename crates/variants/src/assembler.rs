use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::artifact::{ImageItem, VideoVariantRecord};
use crate::error::{Result, VariantError};
use crate::tier::SizeTier;

/// Everything produced for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoObject {
    pub output_directory: PathBuf,
    /// Milliseconds
    pub duration: u64,
    /// Highest tier first
    pub variants: Vec<VideoVariantRecord>,
    pub thumbnail: ImageItem,
    pub placeholder_frame: ImageItem,
    pub maximum_size_category: u8,
    pub preferred_size_category: u8,
}

/// Combine the produced artifacts into a [`VideoObject`]. Performs no I/O.
///
/// Variants are sorted highest tier first. The 720p variant is preferred when
/// present and supplies the duration; otherwise the highest tier is preferred
/// and the duration comes from the lowest one.
pub fn assemble_video_object(
    output_directory: PathBuf,
    thumbnail: Option<ImageItem>,
    placeholder_frame: Option<ImageItem>,
    mut variants: Vec<VideoVariantRecord>,
) -> Result<VideoObject> {
    let thumbnail = thumbnail.ok_or(VariantError::MissingArtifact("thumbnail"))?;
    let placeholder_frame = placeholder_frame.ok_or(VariantError::MissingArtifact("placeholder frame"))?;

    variants.sort_by(|a, b| b.size_category.cmp(&a.size_category));

    let maximum_size_category = variants
        .first()
        .map(|v| v.size_category)
        .ok_or(VariantError::NoVariantsProduced)?;

    let preferred = SizeTier::P720.size_category();
    let mut duration = 0;
    let mut preferred_size_category = maximum_size_category;
    for variant in &variants {
        duration = variant.duration;
        if variant.size_category == preferred {
            preferred_size_category = preferred;
            break;
        }
    }

    Ok(VideoObject {
        output_directory,
        duration,
        variants,
        thumbnail,
        placeholder_frame,
        maximum_size_category,
        preferred_size_category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(size_category: u8, duration: u64) -> VideoVariantRecord {
        let height = SizeTier::from_size_category(size_category).unwrap().height();
        VideoVariantRecord {
            codec: "h264".to_string(),
            height,
            width: height * 16 / 9,
            duration,
            name: format!("{}_{}.mp4", size_category, height),
            ext: "mp4".to_string(),
            size_category,
            bit_rate: None,
            mime_type: Some("video/mp4".to_string()),
        }
    }

    fn image(name: &str, size: u32, size_category: u8) -> Option<ImageItem> {
        Some(ImageItem {
            path: PathBuf::from(name),
            mime_type: Some("image/jpeg".to_string()),
            size: 1024,
            height: size,
            width: size,
            size_category,
        })
    }

    fn assemble(variants: Vec<VideoVariantRecord>) -> Result<VideoObject> {
        assemble_video_object(
            PathBuf::from("/out/clip"),
            image("thumb.jpeg", 90, 0),
            image("frame.jpeg", 480, 3),
            variants,
        )
    }

    #[test]
    fn test_720p_is_preferred_and_supplies_duration() {
        let object = assemble(vec![record(1, 10_000), record(3, 30_000), record(4, 40_000)]).unwrap();
        assert_eq!(object.maximum_size_category, 4);
        assert_eq!(object.preferred_size_category, 3);
        assert_eq!(object.duration, 30_000);
        let categories: Vec<u8> = object.variants.iter().map(|v| v.size_category).collect();
        assert_eq!(categories, vec![4, 3, 1]);
    }

    #[test]
    fn test_without_720p_duration_comes_from_lowest_tier() {
        let object = assemble(vec![record(0, 10_000), record(4, 40_000), record(2, 20_000)]).unwrap();
        assert_eq!(object.preferred_size_category, 4);
        assert_eq!(object.maximum_size_category, 4);
        assert_eq!(object.duration, 10_000);
    }

    #[test]
    fn test_missing_artifacts() {
        assert!(matches!(assemble(vec![]), Err(VariantError::NoVariantsProduced)));

        let err = assemble_video_object(PathBuf::from("/out"), None, image("f", 480, 3), vec![record(0, 1)]);
        assert!(matches!(err, Err(VariantError::MissingArtifact("thumbnail"))));
    }

    proptest! {
        #[test]
        fn test_bookkeeping_is_order_independent(
            categories in prop::collection::btree_set(0u8..5, 1..=5),
            rotate in 0usize..5,
        ) {
            let mut variants: Vec<_> = categories.iter().map(|c| record(*c, *c as u64 * 1000 + 7)).collect();
            let shift = rotate % variants.len();
            variants.rotate_left(shift);
            let object = assemble(variants).unwrap();

            let max = *categories.iter().max().unwrap();
            prop_assert_eq!(object.maximum_size_category, max);
            if categories.contains(&3) {
                prop_assert_eq!(object.preferred_size_category, 3);
                prop_assert_eq!(object.duration, 3007);
            } else {
                prop_assert_eq!(object.preferred_size_category, max);
                let min = *categories.iter().min().unwrap();
                prop_assert_eq!(object.duration, min as u64 * 1000 + 7);
            }
            prop_assert!(categories.contains(&object.preferred_size_category));
        }
    }
}
