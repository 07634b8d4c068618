//! Receive-side RTP endpoint state machine.
//!
//! This crate ingests pre-parsed RTP headers plus raw packet bytes and keeps
//! everything a receiver report needs: fraction lost, cumulative loss, the
//! extended highest sequence number and interarrival jitter (RFC 3550
//! section 6.4.1, in Q4 fixed point). Along the way it detects SSRC, payload
//! and CSRC changes, unwraps RTX retransmissions onto the primary stream,
//! classifies late packets as retransmits or benign reorders, and drives
//! liveness/timeout callbacks into the host.
//!
//! Socket I/O, byte-level header parsing and codec depacketization live
//! outside this crate: the transport hands in an [`RtpHeader`], media
//! dispatch goes through a [`media::MediaReceiver`] strategy, and the
//! companion RTCP module is only consulted for its round-trip-time estimate
//! and notified of remote SSRC changes.
//!
//! All host callbacks are invoked with the receiver's lock released; see
//! [`receiver::RtpReceiver`] for the locking discipline.

pub mod clock;
pub mod error;
pub mod media;
pub mod packet;
pub mod payload;
pub mod receiver;
pub mod stats;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use media::{AudioReceiver, MediaReceiver, VideoReceiver};
pub use packet::{RtpExtensionType, RtpHeader, RtpHeaderExtensionMap};
pub use payload::{MediaKind, Payload, PayloadRegistry, PayloadSpecific, VideoCodecType};
pub use receiver::{DataCounters, ReceiveStatistics, RtpReceiver};
pub use traits::{NackMethod, PacketKind, RtcpModule, RtpData, RtpFeedback, StreamLiveness};

/// Result type alias for receive-path operations
pub type Result<T> = std::result::Result<T, Error>;

/// RTP synchronization source identifier
pub type RtpSsrc = u32;

/// RTP contributing source identifier
pub type RtpCsrc = u32;

/// RTP media timestamp (modular, at the payload clock rate)
pub type RtpTimestamp = u32;

/// RTP sequence number (modular 16-bit)
pub type RtpSequenceNumber = u16;

/// Maximum number of CSRC entries an RTP header can carry
pub const RTP_CSRC_MAX: usize = 15;

/// RTP timestamp clock rate assumed for all video payloads
pub const DEFAULT_VIDEO_FREQUENCY_HZ: u32 = 90_000;

/// How far a sequence number may lag the received maximum before the remote
/// side is assumed to have restarted
pub const DEFAULT_MAX_REORDERING_THRESHOLD: i32 = 50;
