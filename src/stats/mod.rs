//! Receive-side rate measurement.

mod bitrate;

pub use bitrate::BitrateMeter;
