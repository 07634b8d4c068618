//! Host-facing contracts of the receive path.
//!
//! Every method on these traits is invoked with the receiver's mutex
//! released; implementations may call back into the receiver's read
//! accessors without deadlocking.

use bytes::Bytes;

use crate::packet::RtpHeader;
use crate::{Result, RtpCsrc, RtpSsrc};

/// Kind of the first packet observed on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Zero-length body, used by peers to hold NAT bindings open
    KeepAlive,
    /// A packet with media payload
    Rtp,
}

/// Negative-acknowledgement mode configured for the stream.
///
/// With NACK enabled, late packets are presumed retransmissions and excluded
/// from the received count when loss is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NackMethod {
    #[default]
    Off,
    Rtcp,
}

/// Periodic liveness verdict reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLiveness {
    Alive,
    Dead,
}

/// Receive-path event callbacks implemented by the host.
pub trait RtpFeedback: Send + Sync {
    /// First packet of a stream; fired once per idle-to-active transition.
    fn on_received_packet(&self, kind: PacketKind);

    /// The remote stream identity changed.
    fn on_incoming_ssrc_changed(&self, ssrc: RtpSsrc);

    /// A contributing source appeared (`added`) or vanished.
    ///
    /// `csrc == 0` signals a pure cardinality change from duplicate
    /// entries; real CSRCs of zero are never reported individually.
    fn on_incoming_csrc_changed(&self, csrc: RtpCsrc, added: bool);

    /// Ask the host to (re)create a decoder for the stream.
    ///
    /// An `Err` means the payload is unsupported; the receiver logs and
    /// keeps running.
    fn on_initialize_decoder(
        &self,
        payload_type: u8,
        name: &str,
        frequency_hz: u32,
        channels: u8,
        rate: u32,
    ) -> Result<()>;

    /// No packet arrived within the configured timeout (one-shot).
    fn on_packet_timeout(&self, id: i32);

    /// Periodic dead-or-alive verdict.
    fn on_periodic_dead_or_alive(&self, id: i32, liveness: StreamLiveness);
}

/// Sink for depacketized media payloads.
pub trait RtpData: Send + Sync {
    /// Deliver one packet's codec payload (RED already unwrapped).
    fn on_received_payload_data(
        &self,
        payload: Bytes,
        header: &RtpHeader,
        is_first_packet: bool,
    ) -> Result<()>;
}

/// The companion RTCP module.
///
/// Consumed in exactly two places: remote-SSRC propagation on identity
/// changes, and the round-trip-time estimate used to tell retransmissions
/// from reorders.
pub trait RtcpModule: Send + Sync {
    /// Tell the RTCP side which remote SSRC its report blocks describe.
    fn set_remote_ssrc(&self, ssrc: RtpSsrc);

    /// Minimum observed round-trip time in milliseconds; 0 when no
    /// estimate exists yet.
    fn min_rtt_ms(&self, ssrc: RtpSsrc) -> u32;
}
