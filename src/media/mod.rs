//! Media dispatch strategies.
//!
//! The receiver core is media-agnostic; everything audio- or video-specific
//! sits behind [`MediaReceiver`]. Strategies keep their own small lock and
//! are always called with the receiver's mutex released, so they may invoke
//! host callbacks directly.

mod audio;
mod video;

pub use audio::AudioReceiver;
pub use video::VideoReceiver;

use bytes::Bytes;

use crate::packet::RtpHeader;
use crate::payload::{MediaKind, PayloadSpecific};
use crate::traits::{RtpFeedback, StreamLiveness};
use crate::{Error, Result};

/// Side effects a strategy requests when the payload-type number flips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadChange {
    /// Reception statistics should restart from scratch.
    pub reset_statistics: bool,
    /// Keep the current binding; this packet does not rebind the stream.
    pub discard_changes: bool,
}

/// Media-specific half of the receive path.
pub trait MediaReceiver: Send + Sync {
    /// Which media class this strategy serves.
    fn media_kind(&self) -> MediaKind;

    /// Hand the codec payload to the host sink, unwrapping RED one level
    /// when `is_red` is set.
    fn parse_packet(
        &self,
        header: &RtpHeader,
        specific: &PayloadSpecific,
        is_red: bool,
        packet: &[u8],
        arrival_ms: i64,
        is_first_packet: bool,
    ) -> Result<()>;

    /// Sample rate of the stream described by the last bound payload.
    fn frequency_hz(&self) -> u32;

    /// Classify a payload-type flip before the binding is updated.
    fn check_payload_changed(&self, payload_type: u8) -> PayloadChange;

    /// Whether CSRC add/remove callbacks apply for this payload type.
    fn should_report_csrc_changes(&self, payload_type: u8) -> bool;

    /// A payload type was newly registered with the receiver.
    fn on_payload_registered(&self, name: &str, payload_type: u8, frequency_hz: u32)
        -> Result<()>;

    /// Cache the media-specific payload now bound to the stream.
    fn set_last_payload(&self, specific: PayloadSpecific);

    /// The cached media-specific payload.
    fn last_payload(&self) -> PayloadSpecific;

    /// Route a decoder re-initialization to the host with media-appropriate
    /// parameters.
    fn invoke_on_initialize_decoder(
        &self,
        feedback: &dyn RtpFeedback,
        payload_type: u8,
        name: &str,
        specific: &PayloadSpecific,
    ) -> Result<()>;

    /// Liveness opinion when RTCP still sees the peer, judged from the
    /// length of the last received payload.
    fn process_dead_or_alive(&self, last_payload_length: usize) -> StreamLiveness;
}

/// Slice the codec payload out of the raw packet, skipping the one-byte RED
/// block header when the outer payload was RED.
pub(crate) fn codec_payload(header: &RtpHeader, packet: &[u8], is_red: bool) -> Result<Bytes> {
    let start = header.header_length;
    let end = packet.len().saturating_sub(header.padding_length);
    if start > end {
        return Err(Error::MalformedLength {
            packet_length: packet.len(),
            header_length: header.header_length,
            padding_length: header.padding_length,
        });
    }
    let mut body = &packet[start..end];
    if is_red {
        if body.is_empty() {
            return Err(Error::MalformedLength {
                packet_length: packet.len(),
                header_length: header.header_length,
                padding_length: header.padding_length,
            });
        }
        // Primary-block RED header is the single payload-type byte.
        body = &body[1..];
    }
    Ok(Bytes::copy_from_slice(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::RtpHeader;

    #[test]
    fn codec_payload_strips_header_and_padding() {
        let mut header = RtpHeader::new(0, 1, 0, 1);
        header.padding_length = 2;

        let mut packet = vec![0u8; 12];
        packet.extend_from_slice(&[1, 2, 3, 4]);
        packet.extend_from_slice(&[0, 2]); // padding

        let body = codec_payload(&header, &packet, false).unwrap();
        assert_eq!(&body[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn codec_payload_unwraps_red_one_level() {
        let header = RtpHeader::new(96, 1, 0, 1);
        let mut packet = vec![0u8; 12];
        packet.push(0x00); // inner payload type byte
        packet.extend_from_slice(&[9, 9]);

        let body = codec_payload(&header, &packet, true).unwrap();
        assert_eq!(&body[..], &[9, 9]);
    }

    #[test]
    fn codec_payload_rejects_truncation() {
        let mut header = RtpHeader::new(0, 1, 0, 1);
        header.padding_length = 20;
        let packet = vec![0u8; 16];
        assert!(codec_payload(&header, &packet, false).is_err());

        let header = RtpHeader::new(96, 1, 0, 1);
        let packet = vec![0u8; 12];
        assert!(codec_payload(&header, &packet, true).is_err());
    }
}
