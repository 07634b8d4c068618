//! Payload descriptors for registered RTP payload types.

mod registry;

pub use registry::{PayloadRegistry, MAX_PAYLOAD_TYPE};

use crate::DEFAULT_VIDEO_FREQUENCY_HZ;

/// Media class a receiver serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Video codec families the receive path dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodecType {
    Generic,
    Vp8,
    H264,
    /// Repair payloads (RED / ULPFEC); these never re-initialize a decoder
    Fec,
}

impl VideoCodecType {
    /// Classify a registered payload name.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("vp8") {
            Self::Vp8
        } else if name.eq_ignore_ascii_case("h264") {
            Self::H264
        } else if name.eq_ignore_ascii_case("red") || name.eq_ignore_ascii_case("ulpfec") {
            Self::Fec
        } else {
            Self::Generic
        }
    }
}

/// Audio payload parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioPayload {
    /// Sample rate in Hz
    pub frequency_hz: u32,
    /// Channel count
    pub channels: u8,
    /// Configured bitrate in bits per second; 0 when unconstrained
    pub rate: u32,
}

/// Video payload parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPayload {
    pub codec: VideoCodecType,
    /// Maximum configured bitrate in bits per second; 0 when unconstrained
    pub max_rate: u32,
}

/// Media-specific half of a payload descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSpecific {
    Audio(AudioPayload),
    Video(VideoPayload),
}

impl PayloadSpecific {
    /// RTP timestamp rate of a stream carrying this payload.
    pub fn frequency_hz(&self) -> u32 {
        match self {
            Self::Audio(audio) => audio.frequency_hz,
            Self::Video(_) => DEFAULT_VIDEO_FREQUENCY_HZ,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio(_))
    }
}

/// A registered payload descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Encoding name as negotiated (e.g. "PCMU", "VP8", "red")
    pub name: String,
    pub specific: PayloadSpecific,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_codec_classification_ignores_case() {
        assert_eq!(VideoCodecType::from_name("VP8"), VideoCodecType::Vp8);
        assert_eq!(VideoCodecType::from_name("h264"), VideoCodecType::H264);
        assert_eq!(VideoCodecType::from_name("red"), VideoCodecType::Fec);
        assert_eq!(VideoCodecType::from_name("ULPFEC"), VideoCodecType::Fec);
        assert_eq!(VideoCodecType::from_name("I420"), VideoCodecType::Generic);
    }

    #[test]
    fn frequency_follows_the_media_kind() {
        let audio = PayloadSpecific::Audio(AudioPayload {
            frequency_hz: 16_000,
            channels: 1,
            rate: 0,
        });
        assert_eq!(audio.frequency_hz(), 16_000);

        let video = PayloadSpecific::Video(VideoPayload {
            codec: VideoCodecType::Vp8,
            max_rate: 0,
        });
        assert_eq!(video.frequency_hz(), DEFAULT_VIDEO_FREQUENCY_HZ);
    }
}
