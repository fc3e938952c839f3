use log::{debug, warn};
use crate::probe::{ProbeResult, StreamDescriptor};

/// Audio languages that earn a selection bonus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePreference {
    pub primary: String,
    pub secondary: String,
}

impl Default for LanguagePreference {
    fn default() -> Self {
        Self {
            primary: "mal".to_string(),
            secondary: "eng".to_string(),
        }
    }
}

/// The chosen video and audio streams of an input
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamSelection {
    pub video: Option<StreamDescriptor>,
    pub audio: Option<StreamDescriptor>,
}

/// Picks the best video and audio stream out of a probe result
#[derive(Debug, Clone, Default)]
pub struct StreamSelector {
    languages: LanguagePreference,
}

impl StreamSelector {
    pub fn new(languages: LanguagePreference) -> Self {
        Self { languages }
    }

    /// Select one video and one audio stream. Ties keep the stream seen first.
    pub fn select(&self, probe: &ProbeResult) -> StreamSelection {
        let mut video: Option<(u32, &StreamDescriptor)> = None;
        let mut audio: Option<(u32, &StreamDescriptor)> = None;

        for stream in &probe.streams {
            if stream.is_video() {
                let score = Self::video_score(stream);
                if video.map_or(true, |(best, _)| score > best) {
                    video = Some((score, stream));
                }
            } else if stream.is_audio() {
                let score = self.audio_score(stream);
                if audio.map_or(true, |(best, _)| score > best) {
                    audio = Some((score, stream));
                }
            }
        }

        if let Some((score, stream)) = video {
            debug!("Selected video stream #{} (score {})", stream.index, score);
        }
        if let Some((score, stream)) = audio {
            debug!("Selected audio stream #{} (score {})", stream.index, score);
        }

        StreamSelection {
            video: video.map(|(_, s)| s.clone()),
            audio: audio.map(|(_, s)| s.clone()),
        }
    }

    fn video_score(stream: &StreamDescriptor) -> u32 {
        stream.height.unwrap_or(0)
    }

    fn audio_score(&self, stream: &StreamDescriptor) -> u32 {
        let channel_score = match stream.channels.unwrap_or(0) {
            2 => 1000,
            c if c > 2 => 500,
            _ => 0,
        };

        let language_score = match stream.language.as_deref() {
            Some(lang) if lang == self.languages.primary => 1000,
            Some(lang) if lang == self.languages.secondary => 500,
            Some(_) => 0,
            None => {
                warn!("Language tag not found on audio stream #{}", stream.index);
                0
            }
        };

        channel_score + language_score
    }
}
