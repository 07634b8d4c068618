//! Payload-type registry for the receive path.
//!
//! Tracks what each payload-type number means for this stream, which number
//! carries RED, and the last payload types seen on the wire. The registry is
//! plain data; the receiver guards it with its own mutex.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Error;
use crate::Result;

use super::{AudioPayload, MediaKind, Payload, PayloadSpecific, VideoCodecType, VideoPayload};

/// Payload types are 7 bits on the wire
pub const MAX_PAYLOAD_TYPE: u8 = 127;

/// Registered payload types plus last-received bookkeeping.
#[derive(Debug)]
pub struct PayloadRegistry {
    kind: MediaKind,
    payloads: HashMap<u8, Payload>,
    red_payload_type: Option<u8>,
    last_received_payload_type: Option<u8>,
    last_received_media_payload_type: Option<u8>,
}

impl PayloadRegistry {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            payloads: HashMap::new(),
            red_payload_type: None,
            last_received_payload_type: None,
            last_received_media_payload_type: None,
        }
    }

    /// Register a payload type for reception.
    ///
    /// Returns `true` when a new descriptor was created. Re-registering an
    /// identical descriptor is a no-op; changing the parameters of an
    /// existing payload type is rejected.
    pub fn register_receive_payload(
        &mut self,
        name: &str,
        payload_type: u8,
        frequency_hz: u32,
        channels: u8,
        rate: u32,
    ) -> Result<bool> {
        if payload_type > MAX_PAYLOAD_TYPE {
            return Err(Error::InvalidParameter(format!(
                "payload type {payload_type} above {MAX_PAYLOAD_TYPE}"
            )));
        }

        let specific = match self.kind {
            MediaKind::Audio => PayloadSpecific::Audio(AudioPayload {
                frequency_hz,
                channels,
                rate,
            }),
            MediaKind::Video => PayloadSpecific::Video(VideoPayload {
                codec: VideoCodecType::from_name(name),
                max_rate: rate,
            }),
        };
        let payload = Payload {
            name: name.to_owned(),
            specific,
        };

        if let Some(existing) = self.payloads.get(&payload_type) {
            if *existing == payload {
                return Ok(false);
            }
            return Err(Error::PayloadTypeConflict { payload_type });
        }

        if name.eq_ignore_ascii_case("red") {
            self.red_payload_type = Some(payload_type);
        }
        debug!(payload_type, name, frequency_hz, "registered receive payload");
        self.payloads.insert(payload_type, payload);
        Ok(true)
    }

    /// Remove a payload-type registration.
    pub fn deregister_receive_payload(&mut self, payload_type: u8) -> Result<()> {
        if self.payloads.remove(&payload_type).is_none() {
            return Err(Error::UnknownPayloadType { payload_type });
        }
        if self.red_payload_type == Some(payload_type) {
            self.red_payload_type = None;
        }
        Ok(())
    }

    /// Reverse lookup: the payload-type number registered for these
    /// parameters. Audio matches name, frequency and channels; video
    /// matches by name alone.
    pub fn receive_payload_type(
        &self,
        name: &str,
        frequency_hz: u32,
        channels: u8,
        rate: u32,
    ) -> Result<u8> {
        for (&payload_type, payload) in &self.payloads {
            if !payload.name.eq_ignore_ascii_case(name) {
                continue;
            }
            match payload.specific {
                PayloadSpecific::Audio(audio) => {
                    // A zero rate on either side matches any rate.
                    if audio.frequency_hz == frequency_hz
                        && audio.channels == channels
                        && (rate == 0 || audio.rate == 0 || audio.rate == rate)
                    {
                        return Ok(payload_type);
                    }
                }
                PayloadSpecific::Video(_) => return Ok(payload_type),
            }
        }
        Err(Error::PayloadNotFound {
            name: name.to_owned(),
            frequency_hz,
        })
    }

    /// Descriptor registered for `payload_type`.
    pub fn payload(&self, payload_type: u8) -> Option<&Payload> {
        self.payloads.get(&payload_type)
    }

    /// The payload-type number carrying RED, if registered.
    pub fn red_payload_type(&self) -> Option<u8> {
        self.red_payload_type
    }

    pub fn is_red(&self, payload_type: u8) -> bool {
        self.red_payload_type == Some(payload_type)
    }

    /// Payload type of the most recently accepted packet.
    pub fn last_received_payload_type(&self) -> Option<u8> {
        self.last_received_payload_type
    }

    pub fn set_last_received_payload_type(&mut self, payload_type: u8) {
        self.last_received_payload_type = Some(payload_type);
    }

    /// Record the last *media* payload type (RED excluded).
    ///
    /// Returns `true` when it is unchanged from the previous media packet.
    pub fn report_media_payload_type(&mut self, media_payload_type: u8) -> bool {
        if self.last_received_media_payload_type == Some(media_payload_type) {
            return true;
        }
        self.last_received_media_payload_type = Some(media_payload_type);
        false
    }

    /// Forget the last received payload types (packet-timeout path).
    pub fn reset_last_received_payload_types(&mut self) {
        self.last_received_payload_type = None;
        self.last_received_media_payload_type = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_dedups_and_rejects_conflicts() {
        let mut registry = PayloadRegistry::new(MediaKind::Audio);

        assert!(registry
            .register_receive_payload("PCMU", 0, 8_000, 1, 64_000)
            .unwrap());
        // Identical registration is a no-op.
        assert!(!registry
            .register_receive_payload("PCMU", 0, 8_000, 1, 64_000)
            .unwrap());
        // Different parameters on the same number conflict.
        assert_eq!(
            registry.register_receive_payload("PCMU", 0, 16_000, 1, 64_000),
            Err(Error::PayloadTypeConflict { payload_type: 0 })
        );

        assert!(registry.register_receive_payload("opus", 200, 48_000, 2, 0).is_err());
    }

    #[test]
    fn red_registration_is_tracked() {
        let mut registry = PayloadRegistry::new(MediaKind::Audio);
        registry
            .register_receive_payload("red", 96, 8_000, 1, 0)
            .unwrap();

        assert_eq!(registry.red_payload_type(), Some(96));
        assert!(registry.is_red(96));
        assert!(!registry.is_red(0));

        registry.deregister_receive_payload(96).unwrap();
        assert_eq!(registry.red_payload_type(), None);
    }

    #[test]
    fn reverse_lookup_matches_audio_parameters() {
        let mut registry = PayloadRegistry::new(MediaKind::Audio);
        registry
            .register_receive_payload("ISAC", 103, 16_000, 1, 32_000)
            .unwrap();
        registry
            .register_receive_payload("ISAC", 104, 32_000, 1, 56_000)
            .unwrap();

        assert_eq!(registry.receive_payload_type("isac", 16_000, 1, 0), Ok(103));
        assert_eq!(registry.receive_payload_type("ISAC", 32_000, 1, 56_000), Ok(104));
        assert!(registry.receive_payload_type("ISAC", 48_000, 1, 0).is_err());
    }

    #[test]
    fn video_descriptors_classify_the_codec() {
        let mut registry = PayloadRegistry::new(MediaKind::Video);
        registry
            .register_receive_payload("VP8", 100, 90_000, 1, 0)
            .unwrap();
        registry
            .register_receive_payload("ulpfec", 127, 90_000, 1, 0)
            .unwrap();

        match registry.payload(100).unwrap().specific {
            PayloadSpecific::Video(video) => assert_eq!(video.codec, VideoCodecType::Vp8),
            PayloadSpecific::Audio(_) => panic!("video registry produced an audio payload"),
        }
        match registry.payload(127).unwrap().specific {
            PayloadSpecific::Video(video) => assert_eq!(video.codec, VideoCodecType::Fec),
            PayloadSpecific::Audio(_) => panic!("video registry produced an audio payload"),
        }
    }

    #[test]
    fn media_payload_type_reporting_excludes_changes() {
        let mut registry = PayloadRegistry::new(MediaKind::Video);

        assert!(!registry.report_media_payload_type(100));
        assert!(registry.report_media_payload_type(100));
        assert!(!registry.report_media_payload_type(101));

        registry.reset_last_received_payload_types();
        assert!(!registry.report_media_payload_type(101));
        assert_eq!(registry.last_received_payload_type(), None);
    }
}
