use std::collections::BTreeMap;
use log::info;
use serde::{Deserialize, Serialize};
use crate::select::StreamSelection;
use crate::tier::{SizeTier, TierSet};

/// Allowed overshoot when a tier is taller than the source
const UPSCALE_TOLERANCE: f64 = 0.1;

/// Concrete encode parameters for one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodePreset {
    pub tier: SizeTier,
    pub height: u32,
    /// Zero until resolved against a source
    pub width: u32,
    pub audio_channels: u32,
    /// Audio VBR quality (`q:a`), lower is better
    pub audio_quality: u32,
    /// Video constant rate factor, lower is better
    pub video_quality: u32,
    pub size_category: u8,
}

impl EncodePreset {
    /// Template for a tier, before any source is known
    pub fn template(tier: SizeTier) -> Self {
        let (audio_channels, audio_quality, video_quality) = match tier {
            SizeTier::P240 => (1, 8, 40),
            SizeTier::P360 => (1, 7, 39),
            SizeTier::P480 => (2, 6, 39),
            SizeTier::P720 => (2, 6, 38),
            SizeTier::P1080 => (2, 6, 36),
        };
        Self {
            tier,
            height: tier.height(),
            width: 0,
            audio_channels,
            audio_quality,
            video_quality,
            size_category: tier.size_category(),
        }
    }

    /// File name of the rendition produced from this preset
    pub fn file_name(&self) -> String {
        format!("{}_{}.mp4", self.size_category, self.height)
    }
}

/// Width matching `target_height` at the source aspect ratio, bumped up to the next even number
pub fn even_width(target_height: u32, source_width: u32, source_height: u32) -> u32 {
    if source_height == 0 {
        return 0;
    }
    let width = (target_height as f64 / source_height as f64 * source_width as f64).round() as u32;
    if width % 2 == 1 {
        width + 1
    } else {
        width
    }
}

/// Whether a source of `source_height` can feed `tier` without a noticeable upscale
pub fn is_reachable(tier: SizeTier, source_height: u32) -> bool {
    let height = tier.height();
    if height <= source_height {
        return true;
    }
    (height - source_height) as f64 / height as f64 <= UPSCALE_TOLERANCE
}

/// Turns requested tiers into encode presets for a given source
#[derive(Debug, Clone, Copy, Default)]
pub struct PresetResolver;

impl PresetResolver {
    pub fn new() -> Self {
        PresetResolver
    }

    /// Resolve `tiers` against the selected streams, highest tier first.
    ///
    /// A mono source forces every preset to one channel. Tiers whose template is
    /// mono keep one channel without affecting the others.
    pub fn resolve(&self, tiers: TierSet, streams: &StreamSelection) -> Vec<EncodePreset> {
        let (source_width, source_height) = streams
            .video
            .as_ref()
            .map(|v| (v.width.unwrap_or(0), v.height.unwrap_or(0)))
            .unwrap_or((0, 0));

        let mono_source = streams
            .audio
            .as_ref()
            .map_or(false, |a| a.channels == Some(1));
        if mono_source {
            info!("Using mono audio since source only has mono");
        }

        let mut presets: Vec<EncodePreset> = tiers
            .iter()
            .map(|tier| {
                let mut preset = EncodePreset::template(tier);
                if mono_source {
                    preset.audio_channels = 1;
                }
                preset.width = even_width(preset.height, source_width, source_height);
                preset
            })
            .collect();

        presets.sort_by(|a, b| b.height.cmp(&a.height));
        presets
    }

    /// Tiers the source can feed, resolved against its dimensions
    pub fn possible_presets(&self, streams: &StreamSelection) -> BTreeMap<SizeTier, EncodePreset> {
        let source_height = streams
            .video
            .as_ref()
            .and_then(|v| v.height)
            .unwrap_or(0);

        let reachable: TierSet = SizeTier::LADDER
            .into_iter()
            .filter(|t| is_reachable(*t, source_height))
            .collect();

        self.resolve(reachable, streams)
            .into_iter()
            .map(|p| (p.tier, p))
            .collect()
    }
}
