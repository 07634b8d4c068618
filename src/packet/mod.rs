//! Packet-level types consumed by the receive path.
//!
//! The byte-level RTP parser lives with the transport; the receiver only
//! sees the pre-parsed [`RtpHeader`] plus the raw packet bytes, and the
//! typed header-extension registrations in [`RtpHeaderExtensionMap`].

mod extension;
mod header;

pub use extension::{RtpExtensionType, RtpHeaderExtensionMap, MAX_EXTENSION_ID, MIN_EXTENSION_ID};
pub use header::{RtpHeader, RTP_MIN_HEADER_SIZE};
