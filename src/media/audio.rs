//! Audio receive strategy.
//!
//! Knows about the two audio payloads that must not rebind the stream:
//! telephone events (DTMF) and comfort noise. Everything else is handed to
//! the host sink unmodified.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::packet::RtpHeader;
use crate::payload::{AudioPayload, MediaKind, PayloadSpecific};
use crate::traits::{RtpData, RtpFeedback, StreamLiveness};
use crate::{Result, DEFAULT_VIDEO_FREQUENCY_HZ};

use super::{codec_payload, MediaReceiver, PayloadChange};

/// Sample rate assumed before any payload is bound
const DEFAULT_AUDIO_FREQUENCY_HZ: u32 = 8_000;

/// Payloads shorter than this are keep-alive or comfort-noise sized
const MIN_MEDIA_PAYLOAD_LEN: usize = 10;

#[derive(Debug)]
struct AudioState {
    last_payload: PayloadSpecific,
    telephone_event_payload_type: Option<u8>,
    /// Comfort-noise payload types by their sample rate
    cng_payload_types: HashMap<u8, u32>,
    last_cng_payload_type: Option<u8>,
}

/// Audio variant of the media dispatch strategy.
pub struct AudioReceiver {
    data_sink: Arc<dyn RtpData>,
    state: Mutex<AudioState>,
}

impl AudioReceiver {
    pub fn new(data_sink: Arc<dyn RtpData>) -> Self {
        Self {
            data_sink,
            state: Mutex::new(AudioState {
                last_payload: PayloadSpecific::Audio(AudioPayload {
                    frequency_hz: DEFAULT_AUDIO_FREQUENCY_HZ,
                    channels: 1,
                    rate: 0,
                }),
                telephone_event_payload_type: None,
                cng_payload_types: HashMap::new(),
                last_cng_payload_type: None,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, AudioState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MediaReceiver for AudioReceiver {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Audio
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
        if self.state().telephone_event_payload_type == Some(header.payload_type) {
            trace!(
                sequence_number = header.sequence_number,
                "received telephone event"
            );
        }
        self.data_sink
            .on_received_payload_data(payload, header, is_first_packet)
    }

    fn frequency_hz(&self) -> u32 {
        match self.state().last_payload {
            PayloadSpecific::Audio(audio) => audio.frequency_hz,
            PayloadSpecific::Video(_) => DEFAULT_VIDEO_FREQUENCY_HZ,
        }
    }

    fn check_payload_changed(&self, payload_type: u8) -> PayloadChange {
        let mut state = self.state();

        if state.telephone_event_payload_type == Some(payload_type) {
            // DTMF rides alongside the codec; it never rebinds the stream.
            return PayloadChange {
                reset_statistics: false,
                discard_changes: true,
            };
        }

        if let Some(&frequency_hz) = state.cng_payload_types.get(&payload_type) {
            // Comfort noise keeps the current codec bound, possibly moving
            // the stream to the CN sample rate.
            let changed = state.last_cng_payload_type != Some(payload_type);
            state.last_cng_payload_type = Some(payload_type);
            if let PayloadSpecific::Audio(ref mut audio) = state.last_payload {
                audio.frequency_hz = frequency_hz;
            }
            return PayloadChange {
                reset_statistics: changed,
                discard_changes: true,
            };
        }

        PayloadChange::default()
    }

    fn should_report_csrc_changes(&self, payload_type: u8) -> bool {
        self.state().telephone_event_payload_type != Some(payload_type)
    }

    fn on_payload_registered(
        &self,
        name: &str,
        payload_type: u8,
        frequency_hz: u32,
    ) -> Result<()> {
        let mut state = self.state();
        if name.eq_ignore_ascii_case("telephone-event") {
            state.telephone_event_payload_type = Some(payload_type);
        } else if name.eq_ignore_ascii_case("cn") {
            state.cng_payload_types.insert(payload_type, frequency_hz);
        }
        Ok(())
    }

    fn set_last_payload(&self, specific: PayloadSpecific) {
        self.state().last_payload = specific;
    }

    fn last_payload(&self) -> PayloadSpecific {
        self.state().last_payload
    }

    fn invoke_on_initialize_decoder(
        &self,
        feedback: &dyn RtpFeedback,
        payload_type: u8,
        name: &str,
        specific: &PayloadSpecific,
    ) -> Result<()> {
        match specific {
            PayloadSpecific::Audio(audio) => feedback.on_initialize_decoder(
                payload_type,
                name,
                audio.frequency_hz,
                audio.channels,
                audio.rate,
            ),
            PayloadSpecific::Video(video) => feedback.on_initialize_decoder(
                payload_type,
                name,
                DEFAULT_VIDEO_FREQUENCY_HZ,
                1,
                video.max_rate,
            ),
        }
    }

    fn process_dead_or_alive(&self, last_payload_length: usize) -> StreamLiveness {
        // Comfort-noise sized payloads mean the peer is idle, not gone.
        if last_payload_length < MIN_MEDIA_PAYLOAD_LEN {
            StreamLiveness::Alive
        } else {
            StreamLiveness::Dead
        }
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

    fn audio_receiver() -> AudioReceiver {
        AudioReceiver::new(Arc::new(NullSink))
    }

    #[test]
    fn telephone_events_are_discarded_without_reset() {
        let audio = audio_receiver();
        audio.on_payload_registered("telephone-event", 106, 8_000).unwrap();

        let change = audio.check_payload_changed(106);
        assert!(change.discard_changes);
        assert!(!change.reset_statistics);

        assert!(!audio.should_report_csrc_changes(106));
        assert!(audio.should_report_csrc_changes(0));
    }

    #[test]
    fn comfort_noise_resets_only_when_its_type_changes() {
        let audio = audio_receiver();
        audio.on_payload_registered("CN", 13, 8_000).unwrap();
        audio.on_payload_registered("CN", 98, 16_000).unwrap();

        let first = audio.check_payload_changed(13);
        assert!(first.discard_changes && first.reset_statistics);

        let again = audio.check_payload_changed(13);
        assert!(again.discard_changes && !again.reset_statistics);

        // Wideband CN is a different type: reset again, and the stream
        // frequency follows it.
        let wideband = audio.check_payload_changed(98);
        assert!(wideband.discard_changes && wideband.reset_statistics);
        assert_eq!(audio.frequency_hz(), 16_000);
    }

    #[test]
    fn codec_payloads_do_not_discard() {
        let audio = audio_receiver();
        assert_eq!(audio.check_payload_changed(0), PayloadChange::default());
    }

    #[test]
    fn liveness_tracks_the_last_payload_size() {
        let audio = audio_receiver();
        assert_eq!(audio.process_dead_or_alive(1), StreamLiveness::Alive);
        assert_eq!(audio.process_dead_or_alive(160), StreamLiveness::Dead);
    }

    #[test]
    fn default_frequency_is_narrowband() {
        let audio = audio_receiver();
        assert_eq!(audio.frequency_hz(), 8_000);

        audio.set_last_payload(PayloadSpecific::Audio(AudioPayload {
            frequency_hz: 48_000,
            channels: 2,
            rate: 64_000,
        }));
        assert_eq!(audio.frequency_hz(), 48_000);
    }
}
