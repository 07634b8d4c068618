//! Video receive strategy.
//!
//! Video streams run on the fixed 90 kHz RTP clock and never veto a payload
//! rebind; repair-payload handling (FEC) is decided by the receiver core
//! from the registered codec type.

use std::sync::{Arc, Mutex};

use crate::packet::RtpHeader;
use crate::payload::{MediaKind, PayloadSpecific, VideoCodecType, VideoPayload};
use crate::traits::{RtpData, RtpFeedback, StreamLiveness};
use crate::{Result, DEFAULT_VIDEO_FREQUENCY_HZ};

use super::{codec_payload, MediaReceiver, PayloadChange};

/// Video variant of the media dispatch strategy.
pub struct VideoReceiver {
    data_sink: Arc<dyn RtpData>,
    last_payload: Mutex<PayloadSpecific>,
}

impl VideoReceiver {
    pub fn new(data_sink: Arc<dyn RtpData>) -> Self {
        Self {
            data_sink,
            last_payload: Mutex::new(PayloadSpecific::Video(VideoPayload {
                codec: VideoCodecType::Generic,
                max_rate: 0,
            })),
        }
    }

    fn last(&self) -> std::sync::MutexGuard<'_, PayloadSpecific> {
        self.last_payload.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MediaReceiver for VideoReceiver {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn parse_packet(
        &self,
        header: &RtpHeader,
        _specific: &PayloadSpecific,
        is_red: bool,
        packet: &[u8],
        _arrival_ms: i64,
        is_first_packet: bool,
    ) -> Result<()> {
        let payload = codec_payload(header, packet, is_red)?;
        self.data_sink
            .on_received_payload_data(payload, header, is_first_packet)
    }

    fn frequency_hz(&self) -> u32 {
        DEFAULT_VIDEO_FREQUENCY_HZ
    }

    fn check_payload_changed(&self, _payload_type: u8) -> PayloadChange {
        PayloadChange::default()
    }

    fn should_report_csrc_changes(&self, _payload_type: u8) -> bool {
        true
    }

    fn on_payload_registered(
        &self,
        _name: &str,
        _payload_type: u8,
        _frequency_hz: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn set_last_payload(&self, specific: PayloadSpecific) {
        *self.last() = specific;
    }

    fn last_payload(&self) -> PayloadSpecific {
        *self.last()
    }

    fn invoke_on_initialize_decoder(
        &self,
        feedback: &dyn RtpFeedback,
        payload_type: u8,
        name: &str,
        specific: &PayloadSpecific,
    ) -> Result<()> {
        let max_rate = match specific {
            PayloadSpecific::Video(video) => video.max_rate,
            PayloadSpecific::Audio(audio) => audio.rate,
        };
        feedback.on_initialize_decoder(payload_type, name, DEFAULT_VIDEO_FREQUENCY_HZ, 1, max_rate)
    }

    fn process_dead_or_alive(&self, _last_payload_length: usize) -> StreamLiveness {
        StreamLiveness::Dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct NullSink;

    impl RtpData for NullSink {
        fn on_received_payload_data(
            &self,
            _payload: Bytes,
            _header: &RtpHeader,
            _is_first_packet: bool,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn video_never_vetoes_a_rebind() {
        let video = VideoReceiver::new(Arc::new(NullSink));
        assert_eq!(video.check_payload_changed(100), PayloadChange::default());
        assert!(video.should_report_csrc_changes(100));
    }

    #[test]
    fn video_runs_on_the_90khz_clock() {
        let video = VideoReceiver::new(Arc::new(NullSink));
        assert_eq!(video.frequency_hz(), DEFAULT_VIDEO_FREQUENCY_HZ);
    }

    #[test]
    fn video_is_dead_without_rtp() {
        let video = VideoReceiver::new(Arc::new(NullSink));
        assert_eq!(video.process_dead_or_alive(0), StreamLiveness::Dead);
        assert_eq!(video.process_dead_or_alive(1_200), StreamLiveness::Dead);
    }

    #[test]
    fn last_payload_round_trips() {
        let video = VideoReceiver::new(Arc::new(NullSink));
        let bound = PayloadSpecific::Video(VideoPayload {
            codec: VideoCodecType::Vp8,
            max_rate: 2_000_000,
        });
        video.set_last_payload(bound);
        assert_eq!(video.last_payload(), bound);
    }
}
