//! Pre-parsed RTP header handed to the receive path.

use crate::{RtpCsrc, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// Fixed RTP header size in bytes, before CSRCs and extensions
pub const RTP_MIN_HEADER_SIZE: usize = 12;

/// A parsed RTP header as produced by the transport-side parser.
///
/// `header_length` covers the fixed header, the CSRC list and any header
/// extension, so the payload body starts at that offset in the raw packet
/// buffer. RTX unwrapping rewrites `ssrc`, `sequence_number` and
/// `header_length` in place, which is why ingress takes the header by
/// mutable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// Synchronization source of the stream
    pub ssrc: RtpSsrc,

    /// Sequence number (modular 16-bit)
    pub sequence_number: RtpSequenceNumber,

    /// Media timestamp at the payload clock rate
    pub timestamp: RtpTimestamp,

    /// Payload type (7 bits)
    pub payload_type: u8,

    /// Marker bit
    pub marker: bool,

    /// Total header length in bytes (fixed header + CSRCs + extension)
    pub header_length: usize,

    /// Trailing padding declared by the padding bit, in bytes
    pub padding_length: usize,

    /// Contributing sources advertised by a mixer, at most 15
    pub csrc: Vec<RtpCsrc>,

    /// Transmission-time offset extension (RFC 5450), a signed 24-bit
    /// sample count sign-extended by the parser; 0 when absent
    pub transmission_time_offset: i32,

    /// Per-CSRC audio level bytes (RFC 6465); empty for video and for
    /// mixers that do not advertise levels
    pub csrc_energy: Vec<u8>,
}

impl RtpHeader {
    /// Create a minimal header with no CSRCs and no extension.
    pub fn new(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
    ) -> Self {
        Self {
            ssrc,
            sequence_number,
            timestamp,
            payload_type,
            marker: false,
            header_length: RTP_MIN_HEADER_SIZE,
            padding_length: 0,
            csrc: Vec::new(),
            transmission_time_offset: 0,
            csrc_energy: Vec::new(),
        }
    }

    /// Payload body length for a packet of `packet_length` bytes.
    pub fn payload_length(&self, packet_length: usize) -> usize {
        packet_length.saturating_sub(self.header_length + self.padding_length)
    }
}

impl Default for RtpHeader {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_length_subtracts_header_and_padding() {
        let mut header = RtpHeader::new(0, 100, 1_000, 0x1234_5678);
        assert_eq!(header.payload_length(172), 160);

        header.padding_length = 4;
        assert_eq!(header.payload_length(172), 156);

        // A truncated buffer never underflows.
        assert_eq!(header.payload_length(10), 0);
    }

    #[test]
    fn new_uses_the_fixed_header_size() {
        let header = RtpHeader::new(96, 1, 2, 3);
        assert_eq!(header.header_length, RTP_MIN_HEADER_SIZE);
        assert!(header.csrc.is_empty());
        assert_eq!(header.transmission_time_offset, 0);
    }
}
