//! Error types for the RTP receive path.
//!
//! Every rejection the receiver can produce is a variant here; entry points
//! return `crate::Result` and never panic on adversarial input.

use thiserror::Error;

/// Errors produced by the receive path and its registries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The declared header and padding lengths do not fit in the packet.
    #[error("packet of {packet_length} bytes cannot hold {header_length} header and {padding_length} padding bytes")]
    MalformedLength {
        packet_length: usize,
        header_length: usize,
        padding_length: usize,
    },

    /// An RTX packet is too short to carry the original sequence number.
    #[error("RTX packet too short to carry the original sequence number")]
    RtxTooShort,

    /// The packet's SSRC does not match the configured filter.
    #[error("SSRC {ssrc:#010x} does not match the configured filter {filter:#010x}")]
    SsrcFilterMismatch { ssrc: u32, filter: u32 },

    /// The payload type has not been registered for reception.
    #[error("payload type {payload_type} is not registered")]
    UnknownPayloadType { payload_type: u8 },

    /// A RED payload wraps another RED payload; one level of redundancy is
    /// the most the receive path accepts.
    #[error("RED payload wraps another RED payload")]
    NestedRed,

    /// A payload type is already registered with different parameters.
    #[error("payload type {payload_type} already registered with different parameters")]
    PayloadTypeConflict { payload_type: u8 },

    /// No registered payload matches the requested parameters.
    #[error("no registered payload named {name:?} at {frequency_hz} Hz")]
    PayloadNotFound { name: String, frequency_hz: u32 },

    /// The host rejected decoder creation for this payload type.
    #[error("decoder initialization rejected for payload type {payload_type}")]
    DecoderInit { payload_type: u8 },

    /// The media payload sink rejected the packet.
    #[error("media parse failed: {0}")]
    MediaParse(String),

    /// No receive statistics are available yet.
    #[error("no receive statistics available")]
    NoStatistics,

    /// The receiver has not seen a packet yet.
    #[error("no packets have been received")]
    NoPacketsReceived,

    /// A configuration or lookup parameter was invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
