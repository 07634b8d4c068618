//! Typed RTP header-extension registrations.
//!
//! Maps the extensions the receive path understands to their negotiated
//! one-byte extension ids (RFC 5285). The transport-side parser consults a
//! copy of this map; the receiver only stores the registrations.

use tracing::warn;

use crate::error::Error;
use crate::Result;

/// Smallest valid one-byte extension id
pub const MIN_EXTENSION_ID: u8 = 1;

/// Largest valid one-byte extension id
pub const MAX_EXTENSION_ID: u8 = 14;

/// Header extensions understood by the receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpExtensionType {
    /// Transmission time offset, RFC 5450
    TransmissionTimeOffset,
    /// Audio level indication, RFC 6464
    AudioLevel,
}

/// Registered extension-type to id mapping for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpHeaderExtensionMap {
    entries: Vec<(u8, RtpExtensionType)>,
}

impl RtpHeaderExtensionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `extension` under the negotiated `id`.
    ///
    /// Re-registering the same pairing is a no-op; remapping a type to a new
    /// id or reusing an id for another type is rejected.
    pub fn register(&mut self, extension: RtpExtensionType, id: u8) -> Result<()> {
        if !(MIN_EXTENSION_ID..=MAX_EXTENSION_ID).contains(&id) {
            return Err(Error::InvalidParameter(format!(
                "extension id {id} out of range ({MIN_EXTENSION_ID}-{MAX_EXTENSION_ID})"
            )));
        }
        for &(existing_id, existing_type) in &self.entries {
            if existing_type == extension {
                if existing_id == id {
                    return Ok(());
                }
                warn!(?extension, existing_id, id, "extension already registered");
                return Err(Error::InvalidParameter(format!(
                    "extension {extension:?} already registered with id {existing_id}"
                )));
            }
            if existing_id == id {
                return Err(Error::InvalidParameter(format!(
                    "extension id {id} already used by {existing_type:?}"
                )));
            }
        }
        self.entries.push((id, extension));
        Ok(())
    }

    /// Remove the registration for `extension`, if any.
    pub fn deregister(&mut self, extension: RtpExtensionType) {
        self.entries.retain(|&(_, t)| t != extension);
    }

    /// Negotiated id for `extension`.
    pub fn id(&self, extension: RtpExtensionType) -> Option<u8> {
        self.entries
            .iter()
            .find(|&&(_, t)| t == extension)
            .map(|&(id, _)| id)
    }

    /// Extension registered under `id`.
    pub fn extension_type(&self, id: u8) -> Option<RtpExtensionType> {
        self.entries
            .iter()
            .find(|&&(i, _)| i == id)
            .map(|&(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_look_up() {
        let mut map = RtpHeaderExtensionMap::new();
        map.register(RtpExtensionType::TransmissionTimeOffset, 1)
            .unwrap();
        map.register(RtpExtensionType::AudioLevel, 2).unwrap();

        assert_eq!(map.id(RtpExtensionType::TransmissionTimeOffset), Some(1));
        assert_eq!(map.extension_type(2), Some(RtpExtensionType::AudioLevel));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn register_rejects_out_of_range_ids() {
        let mut map = RtpHeaderExtensionMap::new();
        assert!(map.register(RtpExtensionType::AudioLevel, 0).is_err());
        assert!(map.register(RtpExtensionType::AudioLevel, 15).is_err());
    }

    #[test]
    fn register_rejects_conflicts_but_accepts_reregistration() {
        let mut map = RtpHeaderExtensionMap::new();
        map.register(RtpExtensionType::TransmissionTimeOffset, 3)
            .unwrap();

        // Same pairing again is fine.
        map.register(RtpExtensionType::TransmissionTimeOffset, 3)
            .unwrap();

        // Remapping the type or reusing the id is not.
        assert!(map
            .register(RtpExtensionType::TransmissionTimeOffset, 4)
            .is_err());
        assert!(map.register(RtpExtensionType::AudioLevel, 3).is_err());
    }

    #[test]
    fn deregister_frees_the_id() {
        let mut map = RtpHeaderExtensionMap::new();
        map.register(RtpExtensionType::AudioLevel, 5).unwrap();
        map.deregister(RtpExtensionType::AudioLevel);
        assert!(map.is_empty());

        map.register(RtpExtensionType::TransmissionTimeOffset, 5)
            .unwrap();
        assert_eq!(map.extension_type(5), Some(RtpExtensionType::TransmissionTimeOffset));
    }

    #[test]
    fn copies_are_independent() {
        let mut map = RtpHeaderExtensionMap::new();
        map.register(RtpExtensionType::AudioLevel, 2).unwrap();

        let copy = map.clone();
        map.deregister(RtpExtensionType::AudioLevel);

        assert_eq!(copy.id(RtpExtensionType::AudioLevel), Some(2));
        assert!(map.id(RtpExtensionType::AudioLevel).is_none());
    }
}
