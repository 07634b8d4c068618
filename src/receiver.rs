//! Receive-side RTP state machine.
//!
//! [`RtpReceiver`] ingests pre-parsed headers plus raw packet bytes and
//! maintains everything a receiver report needs: in-order/old packet counts,
//! the extended highest sequence number across 16-bit wraparound, and the
//! RFC 3550 interarrival jitter estimate in Q4 fixed point. It also detects
//! SSRC, payload-type and CSRC changes, unwraps RTX retransmissions, and
//! drives timeout/liveness callbacks.
//!
//! Locking discipline: one mutex guards the whole receiver state. Every host
//! callback, and every media-strategy call that may take its own lock, is
//! invoked with that mutex released; callback arguments are snapshotted into
//! locals first. The companion RTCP module's round-trip time is likewise
//! snapshotted before the statistics critical section.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::error::Error;
use crate::media::MediaReceiver;
use crate::packet::{RtpExtensionType, RtpHeader, RtpHeaderExtensionMap};
use crate::payload::{PayloadRegistry, PayloadSpecific, VideoCodecType};
use crate::stats::BitrateMeter;
use crate::traits::{NackMethod, PacketKind, RtcpModule, RtpFeedback, StreamLiveness};
use crate::{
    Result, RtpCsrc, RtpSequenceNumber, RtpSsrc, RtpTimestamp, DEFAULT_MAX_REORDERING_THRESHOLD,
    DEFAULT_VIDEO_FREQUENCY_HZ, RTP_CSRC_MAX,
};

/// Interarrival jumps of at least this many samples bypass the jitter
/// filter (about 5 s of 90 kHz video)
const JITTER_JUMP_GUARD_SAMPLES: u32 = 450_000;

/// The smoothed per-packet overhead starts at the fixed RTP header size
const INITIAL_PACKET_OVERHEAD: u16 = 12;

/// A stream is trivially alive if a packet arrived within this window
const ALIVE_WINDOW_MS: i64 = 1_000;

/// Receiver-report inputs per RFC 3550 (one report block).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStatistics {
    /// Fraction of packets lost since the last report, scaled 0..=255
    pub fraction_lost: u8,
    /// Cumulative packets lost, truncated to the 24 bits the report carries
    pub cumulative_lost: u32,
    /// Wrap count in the high 16 bits, highest sequence number in the low
    pub extended_high_seq_num: u32,
    /// Interarrival jitter in samples (Q4 internal value scaled down)
    pub jitter: u32,
    /// Highest jitter observed since the last statistics reset
    pub max_jitter: u32,
    /// Jitter with the sender's transmission-time offset removed (RFC 5450)
    pub jitter_transmission_time_offset: u32,
}

/// Raw receive counters, reorders and retransmissions included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataCounters {
    pub bytes_received: u32,
    pub packets_received: u32,
}

#[derive(Debug)]
struct ReceiverState {
    registry: PayloadRegistry,
    extension_map: RtpHeaderExtensionMap,
    bitrate: BitrateMeter,

    ssrc: RtpSsrc,
    csrcs: Vec<RtpCsrc>,
    energy: Vec<u8>,

    use_ssrc_filter: bool,
    ssrc_filter: RtpSsrc,
    rtx: bool,
    ssrc_rtx: RtpSsrc,

    last_receive_time_ms: i64,
    last_received_payload_length: usize,
    packet_timeout_ms: u32,

    jitter_q4: i32,
    jitter_max_q4: i32,
    jitter_q4_transmission_time_offset: i32,
    cumulative_loss: u32,
    local_time_last_received_timestamp: u32,
    last_received_frame_time_ms: i64,
    last_received_timestamp: RtpTimestamp,
    last_received_sequence_number: RtpSequenceNumber,
    last_received_transmission_time_offset: i32,

    received_seq_first: RtpSequenceNumber,
    received_seq_max: RtpSequenceNumber,
    received_seq_wraps: u32,

    received_packet_overhead: u16,
    received_byte_count: u32,
    received_old_packet_count: u32,
    received_inorder_packet_count: u32,

    last_report_inorder_packets: u32,
    last_report_old_packets: u32,
    last_report_seq_max: RtpSequenceNumber,
    last_report_fraction_lost: u8,
    last_report_cumulative_lost: u32,
    last_report_extended_high_seq_num: u32,
    last_report_jitter: u32,
    last_report_jitter_transmission_time_offset: u32,

    nack_method: NackMethod,
    max_reordering_threshold: i32,
}

impl ReceiverState {
    fn new(registry: PayloadRegistry) -> Self {
        Self {
            registry,
            extension_map: RtpHeaderExtensionMap::new(),
            bitrate: BitrateMeter::new(),
            ssrc: 0,
            csrcs: Vec::new(),
            energy: Vec::new(),
            use_ssrc_filter: false,
            ssrc_filter: 0,
            rtx: false,
            ssrc_rtx: 0,
            last_receive_time_ms: 0,
            last_received_payload_length: 0,
            packet_timeout_ms: 0,
            jitter_q4: 0,
            jitter_max_q4: 0,
            jitter_q4_transmission_time_offset: 0,
            cumulative_loss: 0,
            local_time_last_received_timestamp: 0,
            last_received_frame_time_ms: 0,
            last_received_timestamp: 0,
            last_received_sequence_number: 0,
            last_received_transmission_time_offset: 0,
            received_seq_first: 0,
            received_seq_max: 0,
            received_seq_wraps: 0,
            received_packet_overhead: INITIAL_PACKET_OVERHEAD,
            received_byte_count: 0,
            received_old_packet_count: 0,
            received_inorder_packet_count: 0,
            last_report_inorder_packets: 0,
            last_report_old_packets: 0,
            last_report_seq_max: 0,
            last_report_fraction_lost: 0,
            last_report_cumulative_lost: 0,
            last_report_extended_high_seq_num: 0,
            last_report_jitter: 0,
            last_report_jitter_transmission_time_offset: 0,
            nack_method: NackMethod::Off,
            max_reordering_threshold: DEFAULT_MAX_REORDERING_THRESHOLD,
        }
    }

    fn have_not_received_packets(&self) -> bool {
        self.last_receive_time_ms == 0
    }

    fn reset_statistics(&mut self) {
        self.last_report_inorder_packets = 0;
        self.last_report_old_packets = 0;
        self.last_report_seq_max = 0;
        self.last_report_fraction_lost = 0;
        self.last_report_cumulative_lost = 0;
        self.last_report_extended_high_seq_num = 0;
        self.last_report_jitter = 0;
        self.last_report_jitter_transmission_time_offset = 0;
        self.jitter_q4 = 0;
        self.jitter_max_q4 = 0;
        self.cumulative_loss = 0;
        self.jitter_q4_transmission_time_offset = 0;
        self.received_seq_wraps = 0;
        self.received_seq_max = 0;
        self.received_seq_first = 0;
        self.received_byte_count = 0;
        self.received_old_packet_count = 0;
        self.received_inorder_packet_count = 0;
    }

    fn reset_data_counters(&mut self) {
        self.received_byte_count = 0;
        self.received_old_packet_count = 0;
        self.received_inorder_packet_count = 0;
        self.last_report_inorder_packets = 0;
    }

    /// Wrap-aware in-order test.
    ///
    /// A transition across the 0xFF00/0x00FF boundary counts as a wrap in
    /// either direction; beyond the reordering threshold the remote side is
    /// assumed to have restarted and the packet is accepted as in order.
    fn in_order_packet(&self, sequence_number: RtpSequenceNumber) -> bool {
        if self.received_seq_max >= sequence_number {
            if !(self.received_seq_max > 0xff00 && sequence_number < 0x00ff) {
                if self.received_seq_max as i32 - self.max_reordering_threshold
                    > sequence_number as i32
                {
                    // Remote restart far behind the window.
                } else {
                    return false;
                }
            }
        } else if sequence_number > 0xff00 && self.received_seq_max < 0x00ff {
            // A late packet from before the wrap.
            if self.received_seq_max as i32 - self.max_reordering_threshold
                > sequence_number as i32
            {
                // Remote restart.
            } else {
                return false;
            }
        }
        true
    }

    /// Decide whether an out-of-order packet is a retransmission rather
    /// than a benign reorder, by comparing its lateness in wall time
    /// against its lateness in RTP time plus the expected network delay.
    fn retransmit_of_old_packet(
        &self,
        sequence_number: RtpSequenceNumber,
        rtp_timestamp: RtpTimestamp,
        now_ms: i64,
        frequency_hz: u32,
        min_rtt_ms: u32,
    ) -> bool {
        if self.in_order_packet(sequence_number) {
            return false;
        }
        let frequency_khz = (frequency_hz / 1_000).max(1);
        let time_diff_ms = now_ms - self.last_receive_time_ms;

        // Truncates toward zero for negative deltas.
        let rtp_timestamp_diff_ms =
            rtp_timestamp.wrapping_sub(self.last_received_timestamp) as i32
                / frequency_khz as i32;

        let max_delay_ms = if min_rtt_ms == 0 {
            // Jitter variance in samples; two standard deviations give a
            // ~95% confidence bound, converted to ms by the kHz rate.
            let jitter_std = ((self.jitter_q4 >> 4) as f32).sqrt();
            let delay = ((2.0 * jitter_std) / frequency_khz as f32) as i64;
            delay.max(1)
        } else {
            (min_rtt_ms as i64 / 3) + 1
        };
        time_diff_ms > rtp_timestamp_diff_ms as i64 + max_delay_ms
    }

    fn update_statistics(
        &mut self,
        header: &RtpHeader,
        payload_bytes: usize,
        old_packet: bool,
        arrival_samples: u32,
    ) {
        self.bitrate.update(payload_bytes);
        self.received_byte_count = self.received_byte_count.wrapping_add(payload_bytes as u32);

        if self.received_seq_max == 0 && self.received_seq_wraps == 0 {
            // First packet after a reset.
            self.received_seq_first = header.sequence_number;
            self.received_seq_max = header.sequence_number;
            self.received_inorder_packet_count = 1;
            self.local_time_last_received_timestamp = arrival_samples;
            return;
        }

        if self.in_order_packet(header.sequence_number) {
            self.received_inorder_packet_count += 1;

            let seq_diff = header.sequence_number as i32 - self.received_seq_max as i32;
            if seq_diff < 0 {
                // The 16-bit space wrapped since the previous maximum.
                self.received_seq_wraps += 1;
                trace!(
                    sequence_number = header.sequence_number,
                    wraps = self.received_seq_wraps,
                    "sequence number wraparound"
                );
            }
            self.received_seq_max = header.sequence_number;

            if header.timestamp != self.last_received_timestamp
                && self.received_inorder_packet_count > 1
            {
                let receive_diff =
                    arrival_samples.wrapping_sub(self.local_time_last_received_timestamp);
                let timestamp_diff =
                    header.timestamp.wrapping_sub(self.last_received_timestamp);
                let time_diff_samples =
                    (receive_diff.wrapping_sub(timestamp_diff) as i32).unsigned_abs();

                // Some sources deliver wild timestamp jumps mid-stream;
                // leave the estimate untouched rather than absorb them.
                if time_diff_samples < JITTER_JUMP_GUARD_SAMPLES {
                    // Q4 fixed point, 1/16 gain, rounded to nearest.
                    let jitter_diff_q4 = (time_diff_samples << 4) as i32 - self.jitter_q4;
                    self.jitter_q4 += (jitter_diff_q4 + 8) >> 4;
                }

                // RFC 5450 variant with the sender-declared pacing offset
                // removed from both timestamps.
                let timestamp_diff_ext = header
                    .timestamp
                    .wrapping_add(header.transmission_time_offset as u32)
                    .wrapping_sub(
                        self.last_received_timestamp
                            .wrapping_add(self.last_received_transmission_time_offset as u32),
                    );
                let time_diff_samples_ext =
                    (receive_diff.wrapping_sub(timestamp_diff_ext) as i32).unsigned_abs();

                if time_diff_samples_ext < JITTER_JUMP_GUARD_SAMPLES {
                    let jitter_diff_q4 = (time_diff_samples_ext << 4) as i32
                        - self.jitter_q4_transmission_time_offset;
                    self.jitter_q4_transmission_time_offset += (jitter_diff_q4 + 8) >> 4;
                }
            }
            self.local_time_last_received_timestamp = arrival_samples;
        } else if old_packet {
            self.received_old_packet_count += 1;
        } else {
            // Benign reordering still counts as received.
            self.received_inorder_packet_count += 1;
        }

        // One-pole overhead average from RFC 5104 4.2.1.2:
        // avg_OH (new) = 15/16 * avg_OH (old) + 1/16 * pckt_OH.
        let packet_overhead = (header.header_length + header.padding_length) as u32;
        self.received_packet_overhead =
            ((15 * self.received_packet_overhead as u32 + packet_overhead) >> 4) as u16;
    }
}

/// Receive-side RTP endpoint.
///
/// One instance tracks one incoming stream. The host feeds packets through
/// [`incoming_packet`](Self::incoming_packet) from its receive thread, calls
/// [`packet_timeout`](Self::packet_timeout) /
/// [`process_dead_or_alive`](Self::process_dead_or_alive) /
/// [`process_bitrate`](Self::process_bitrate) from a timer thread, and reads
/// statistics from wherever its RTCP sender runs.
pub struct RtpReceiver {
    id: i32,
    clock: Arc<dyn Clock>,
    media: Arc<dyn MediaReceiver>,
    rtcp: Arc<dyn RtcpModule>,
    feedback: Arc<dyn RtpFeedback>,
    state: Mutex<ReceiverState>,
}

impl RtpReceiver {
    pub fn new(
        id: i32,
        clock: Arc<dyn Clock>,
        media: Arc<dyn MediaReceiver>,
        rtcp: Arc<dyn RtcpModule>,
        feedback: Arc<dyn RtpFeedback>,
    ) -> Self {
        let registry = PayloadRegistry::new(media.media_kind());
        Self {
            id,
            clock,
            media,
            rtcp,
            feedback,
            state: Mutex::new(ReceiverState::new(registry)),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    fn state(&self) -> MutexGuard<'_, ReceiverState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ---------------------------------------------------------------------
    // Ingress
    // ---------------------------------------------------------------------

    /// Feed one received packet into the state machine.
    ///
    /// `header` is the transport-parsed view of `packet`; RTX unwrapping
    /// rewrites it in place so the caller observes the recovered identity.
    pub fn incoming_packet(&self, header: &mut RtpHeader, packet: &[u8]) -> Result<()> {
        let packet_length = packet.len();
        if packet_length < header.header_length + header.padding_length {
            warn!(
                packet_length,
                header_length = header.header_length,
                padding_length = header.padding_length,
                "dropping packet with invalid length"
            );
            return Err(Error::MalformedLength {
                packet_length,
                header_length: header.header_length,
                padding_length: header.padding_length,
            });
        }

        let first_packet_kind = {
            let state = self.state();
            if state.rtx && state.ssrc_rtx == header.ssrc {
                if header.header_length + 2 > packet_length {
                    return Err(Error::RtxTooShort);
                }
                // The original sequence number leads the RTX payload; fold
                // the packet back onto the primary stream.
                header.ssrc = state.ssrc;
                header.sequence_number = u16::from_be_bytes([
                    packet[header.header_length],
                    packet[header.header_length + 1],
                ]);
                header.header_length += 2;
            }
            if state.use_ssrc_filter && header.ssrc != state.ssrc_filter {
                warn!(ssrc = header.ssrc, "dropping packet, SSRC does not match filter");
                return Err(Error::SsrcFilterMismatch {
                    ssrc: header.ssrc,
                    filter: state.ssrc_filter,
                });
            }
            if state.have_not_received_packets() {
                if header.payload_length(packet_length) == 0 {
                    Some(PacketKind::KeepAlive)
                } else {
                    Some(PacketKind::Rtp)
                }
            } else {
                None
            }
        };
        if let Some(kind) = first_packet_kind {
            self.feedback.on_received_packet(kind);
        }

        let first_payload_byte = if packet_length > header.header_length {
            packet[header.header_length]
        } else {
            0
        };

        self.check_ssrc_changed(header);

        let payload_length = header.payload_length(packet_length);
        let (is_red, specific) = match self.check_payload_changed(header, first_payload_byte) {
            Ok(resolved) => resolved,
            Err(_) if payload_length == 0 => {
                trace!("received keep-alive packet");
                return Ok(());
            }
            Err(err) => {
                warn!(payload_type = header.payload_type, "received invalid payload type");
                return Err(err);
            }
        };

        self.check_csrc(header);

        let (is_first_packet_in_frame, idle) = {
            let state = self.state();
            (
                state.last_received_sequence_number.wrapping_add(1) == header.sequence_number
                    && state.last_received_timestamp != header.timestamp,
                state.have_not_received_packets(),
            )
        };
        let is_first_packet = is_first_packet_in_frame || idle;

        self.media.parse_packet(
            header,
            &specific,
            is_red,
            packet,
            self.clock.now_ms(),
            is_first_packet,
        )?;

        // Snapshot collaborator answers used inside the critical section.
        let frequency_hz = self.media.frequency_hz();
        let min_rtt_ms = self.rtcp.min_rtt_ms(header.ssrc);
        let now_ms = self.clock.now_ms();
        let arrival_samples = self.clock.current_rtp(frequency_hz);

        let mut state = self.state();
        // Classify against the previous packet before the maximum advances.
        let old_packet = state.retransmit_of_old_packet(
            header.sequence_number,
            header.timestamp,
            now_ms,
            frequency_hz,
            min_rtt_ms,
        );
        state.update_statistics(header, payload_length, old_packet, arrival_samples);

        state.last_receive_time_ms = now_ms;
        state.last_received_payload_length = payload_length;

        if !old_packet {
            if state.last_received_timestamp != header.timestamp {
                state.last_received_timestamp = header.timestamp;
                state.last_received_frame_time_ms = now_ms;
            }
            state.last_received_sequence_number = header.sequence_number;
            state.last_received_transmission_time_offset = header.transmission_time_offset;
        }
        Ok(())
    }

    /// Detect and apply a stream identity change.
    fn check_ssrc_changed(&self, header: &RtpHeader) {
        let mut new_ssrc = None;
        let mut re_initialize_decoder: Option<(u8, String, u32, u8, u32)> = None;

        {
            let mut state = self.state();
            let last_received_payload_type = state.registry.last_received_payload_type();
            if state.ssrc != header.ssrc
                || (last_received_payload_type.is_none() && state.ssrc == 0)
            {
                new_ssrc = Some(header.ssrc);

                state.reset_statistics();

                state.last_received_timestamp = 0;
                state.last_received_sequence_number = 0;
                state.last_received_transmission_time_offset = 0;
                state.last_received_frame_time_ms = 0;

                // An SSRC flip with the codec unchanged is a restart of the
                // same stream; the decoder is re-created for it.
                if state.ssrc != 0 && Some(header.payload_type) == last_received_payload_type {
                    let Some(payload) = state.registry.payload(header.payload_type) else {
                        return;
                    };
                    let (frequency_hz, channels, rate) = match payload.specific {
                        PayloadSpecific::Audio(audio) => {
                            (audio.frequency_hz, audio.channels, audio.rate)
                        }
                        PayloadSpecific::Video(_) => (DEFAULT_VIDEO_FREQUENCY_HZ, 1, 0),
                    };
                    re_initialize_decoder = Some((
                        header.payload_type,
                        payload.name.clone(),
                        frequency_hz,
                        channels,
                        rate,
                    ));
                }
                state.ssrc = header.ssrc;
            }
        }
        if let Some(ssrc) = new_ssrc {
            debug!(ssrc, "incoming SSRC changed");
            // The RTCP side needs the new remote SSRC before its next report.
            self.rtcp.set_remote_ssrc(ssrc);
            self.feedback.on_incoming_ssrc_changed(ssrc);
        }
        if let Some((payload_type, name, frequency_hz, channels, rate)) = re_initialize_decoder {
            if self
                .feedback
                .on_initialize_decoder(payload_type, &name, frequency_hz, channels, rate)
                .is_err()
            {
                warn!(payload_type, "failed to create decoder for payload type");
            }
        }
    }

    /// Resolve the packet's payload type against the current binding.
    ///
    /// Returns the RED flag and the media-specific descriptor the media
    /// strategy should parse with.
    fn check_payload_changed(
        &self,
        header: &RtpHeader,
        first_payload_byte: u8,
    ) -> Result<(bool, PayloadSpecific)> {
        let mut is_red = false;
        let mut payload_type = header.payload_type;

        {
            let state = self.state();
            let last_received_payload_type = state.registry.last_received_payload_type();

            if Some(payload_type) == last_received_payload_type {
                drop(state);
                return Ok((false, self.media.last_payload()));
            }

            if state.registry.is_red(payload_type) {
                // The real codec payload type hides in the first byte.
                payload_type = first_payload_byte & 0x7f;
                is_red = true;

                if state.registry.is_red(payload_type) {
                    // Letting this through would bind RED as the media type
                    // and corrupt packets would no longer be caught here.
                    return Err(Error::NestedRed);
                }
                if Some(payload_type) == last_received_payload_type {
                    drop(state);
                    return Ok((is_red, self.media.last_payload()));
                }
            }
        }

        // The strategy may veto the rebind (DTMF, comfort noise).
        let change = self.media.check_payload_changed(payload_type);
        if change.reset_statistics {
            self.state().reset_statistics();
        }
        if change.discard_changes {
            return Ok((false, self.media.last_payload()));
        }

        let (payload_name, specific, re_initialize_decoder) = {
            let mut state = self.state();
            let payload = state
                .registry
                .payload(payload_type)
                .cloned()
                .ok_or(Error::UnknownPayloadType { payload_type })?;
            state.registry.set_last_received_payload_type(payload_type);

            let mut re_initialize_decoder = true;
            if let PayloadSpecific::Video(video) = payload.specific {
                if video.codec == VideoCodecType::Fec {
                    // Repair-only packets never re-create the decoder.
                    re_initialize_decoder = false;
                } else if state.registry.report_media_payload_type(payload_type) {
                    // Same media codec as before.
                    re_initialize_decoder = false;
                }
            }
            if re_initialize_decoder {
                state.reset_statistics();
            }
            (payload.name, payload.specific, re_initialize_decoder)
        };

        self.media.set_last_payload(specific);

        if re_initialize_decoder {
            debug!(payload_type, name = %payload_name, "payload type changed, re-initializing decoder");
            self.media.invoke_on_initialize_decoder(
                self.feedback.as_ref(),
                payload_type,
                &payload_name,
                &specific,
            )?;
        }
        Ok((is_red, specific))
    }

    /// Diff the advertised CSRC set against the tracked one and report
    /// every appearance and disappearance.
    fn check_csrc(&self, header: &RtpHeader) {
        if !self.media.should_report_csrc_changes(header.payload_type) {
            return;
        }

        let (old_csrcs, num_csrcs_diff) = {
            let mut state = self.state();

            // Per-CSRC audio levels ride along with the CSRC list.
            match header.csrc_energy.len() {
                0 => state.energy.clear(),
                n if n <= RTP_CSRC_MAX => {
                    state.energy.clear();
                    state.energy.extend_from_slice(&header.csrc_energy);
                }
                _ => {}
            }

            if header.csrc.is_empty() && state.csrcs.is_empty() {
                return;
            }
            let old = std::mem::replace(&mut state.csrcs, header.csrc.clone());
            state.csrcs.truncate(RTP_CSRC_MAX);
            let diff = state.csrcs.len() as i32 - old.len() as i32;
            (old, diff)
        };

        let mut have_called_callback = false;
        for &csrc in header.csrc.iter().take(RTP_CSRC_MAX) {
            if csrc != 0 && !old_csrcs.contains(&csrc) {
                have_called_callback = true;
                self.feedback.on_incoming_csrc_changed(csrc, true);
            }
        }
        for &csrc in &old_csrcs {
            if csrc != 0 && !header.csrc.contains(&csrc) {
                have_called_callback = true;
                self.feedback.on_incoming_csrc_changed(csrc, false);
            }
        }
        if !have_called_callback && num_csrcs_diff != 0 {
            // Duplicate entries can change the cardinality without changing
            // the set; CSRC 0 signals that case. Known interop quirk: peers
            // that use 0 as a real CSRC cannot tell the two apart.
            self.feedback.on_incoming_csrc_changed(0, num_csrcs_diff > 0);
        }
    }

    // ---------------------------------------------------------------------
    // Reports and counters
    // ---------------------------------------------------------------------

    /// Receiver-report statistics.
    ///
    /// With `reset` the delta counters are folded into a fresh report and
    /// snapshotted for the next one; without it the last generated report is
    /// returned unchanged. Errors until a packet (and for `reset = false`, a
    /// first report) exists.
    pub fn statistics(&self, reset: bool) -> Result<ReceiveStatistics> {
        let mut state = self.state();
        if state.received_seq_first == 0 && state.received_byte_count == 0 {
            // Nothing received; the RTCP sender skips the report block.
            return Err(Error::NoStatistics);
        }

        if !reset {
            if state.last_report_inorder_packets == 0 {
                return Err(Error::NoStatistics);
            }
            return Ok(ReceiveStatistics {
                fraction_lost: state.last_report_fraction_lost,
                cumulative_lost: state.last_report_cumulative_lost & 0x00ff_ffff,
                extended_high_seq_num: state.last_report_extended_high_seq_num,
                jitter: state.last_report_jitter,
                max_jitter: (state.jitter_max_q4 >> 4) as u32,
                jitter_transmission_time_offset: state
                    .last_report_jitter_transmission_time_offset,
            });
        }

        if state.last_report_inorder_packets == 0 {
            // First report: the expected count spans [seq_first, seq_max].
            state.last_report_seq_max = state.received_seq_first.wrapping_sub(1);
        }

        let mut expected_since_last = state
            .received_seq_max
            .wrapping_sub(state.last_report_seq_max);
        if state.last_report_seq_max > state.received_seq_max {
            // The sequence space cannot march a full period backwards
            // within one report interval.
            expected_since_last = 0;
        }

        let mut received_since_last = state
            .received_inorder_packet_count
            .wrapping_sub(state.last_report_inorder_packets);
        if state.nack_method == NackMethod::Off {
            // Reordered old packets were received, not lost. With NACK they
            // are presumed retransmissions and stay excluded.
            let old_packets = state
                .received_old_packet_count
                .wrapping_sub(state.last_report_old_packets);
            received_since_last = received_since_last.wrapping_add(old_packets);
        }

        let missing = (expected_since_last as u32).saturating_sub(received_since_last);
        let fraction_lost = if expected_since_last > 0 {
            ((255 * missing) / expected_since_last as u32) as u8
        } else {
            0
        };

        state.cumulative_loss = state.cumulative_loss.wrapping_add(missing);
        if state.jitter_q4 > state.jitter_max_q4 {
            state.jitter_max_q4 = state.jitter_q4;
        }
        let extended_high_seq_num =
            (state.received_seq_wraps << 16) | state.received_seq_max as u32;

        let report = ReceiveStatistics {
            fraction_lost,
            cumulative_lost: state.cumulative_loss & 0x00ff_ffff,
            extended_high_seq_num,
            jitter: (state.jitter_q4 >> 4) as u32,
            max_jitter: (state.jitter_max_q4 >> 4) as u32,
            jitter_transmission_time_offset: (state.jitter_q4_transmission_time_offset >> 4)
                as u32,
        };

        state.last_report_fraction_lost = report.fraction_lost;
        state.last_report_cumulative_lost = state.cumulative_loss;
        state.last_report_extended_high_seq_num = report.extended_high_seq_num;
        state.last_report_jitter = report.jitter;
        state.last_report_jitter_transmission_time_offset =
            report.jitter_transmission_time_offset;
        state.last_report_inorder_packets = state.received_inorder_packet_count;
        state.last_report_old_packets = state.received_old_packet_count;
        state.last_report_seq_max = state.received_seq_max;

        Ok(report)
    }

    /// Clear all report statistics (identity changes do this implicitly).
    pub fn reset_statistics(&self) {
        self.state().reset_statistics();
    }

    /// Clear the raw data counters without touching report state.
    pub fn reset_data_counters(&self) {
        self.state().reset_data_counters();
    }

    /// Raw received bytes and packets, reorders and retransmissions included.
    pub fn data_counters(&self) -> DataCounters {
        let state = self.state();
        DataCounters {
            bytes_received: state.received_byte_count,
            packets_received: state
                .received_old_packet_count
                .wrapping_add(state.received_inorder_packet_count),
        }
    }

    /// In-order packets received.
    pub fn packet_count(&self) -> u32 {
        self.state().received_inorder_packet_count
    }

    /// Payload bytes received.
    pub fn byte_count(&self) -> u32 {
        self.state().received_byte_count
    }

    /// Smoothed per-packet header-plus-padding overhead in bytes.
    pub fn packet_overhead(&self) -> u16 {
        self.state().received_packet_overhead
    }

    /// The last received RTP timestamp extrapolated to "now" by the elapsed
    /// time in samples.
    pub fn estimated_remote_timestamp(&self) -> Result<RtpTimestamp> {
        let frequency_hz = self.media.frequency_hz();
        let current_samples = self.clock.current_rtp(frequency_hz);
        let state = self.state();
        if state.local_time_last_received_timestamp == 0 {
            return Err(Error::NoPacketsReceived);
        }
        let elapsed = current_samples.wrapping_sub(state.local_time_last_received_timestamp);
        Ok(state.last_received_timestamp.wrapping_add(elapsed))
    }

    // ---------------------------------------------------------------------
    // Liveness
    // ---------------------------------------------------------------------

    /// True while no packet has been accepted (also after a packet timeout).
    pub fn have_not_received_packets(&self) -> bool {
        self.state().have_not_received_packets()
    }

    /// One-shot inactivity check, driven by the host's timer thread.
    pub fn packet_timeout(&self) {
        let timed_out = {
            let mut state = self.state();
            if state.packet_timeout_ms == 0 || state.have_not_received_packets() {
                false
            } else {
                let now_ms = self.clock.now_ms();
                if now_ms - state.last_receive_time_ms > state.packet_timeout_ms as i64 {
                    // Back to idle until the next packet; the payload
                    // binding is forgotten so it re-announces itself.
                    state.last_receive_time_ms = 0;
                    state.registry.reset_last_received_payload_types();
                    true
                } else {
                    false
                }
            }
        };
        if timed_out {
            self.feedback.on_packet_timeout(self.id);
        }
    }

    /// Periodic liveness verdict.
    ///
    /// A packet in the last second means alive; otherwise, if RTCP still
    /// sees the peer, the media strategy judges from the last payload
    /// length; otherwise dead. Always reports to the host.
    pub fn process_dead_or_alive(&self, rtcp_alive: bool, now_ms: i64) {
        let liveness = {
            let state = self.state();
            if state.last_receive_time_ms + ALIVE_WINDOW_MS > now_ms {
                StreamLiveness::Alive
            } else if rtcp_alive {
                let last_payload_length = state.last_received_payload_length;
                drop(state);
                self.media.process_dead_or_alive(last_payload_length)
            } else {
                StreamLiveness::Dead
            }
        };
        self.feedback.on_periodic_dead_or_alive(self.id, liveness);
    }

    /// Fold the receive window into the bitrate estimate.
    pub fn process_bitrate(&self) {
        let now_ms = self.clock.now_ms();
        self.state().bitrate.process(now_ms);
    }

    /// Smoothed receive bitrate in bits per second.
    pub fn bitrate_bps(&self) -> u32 {
        self.state().bitrate.bitrate_bps()
    }

    /// Smoothed receive rate in packets per second.
    pub fn packet_rate(&self) -> u32 {
        self.state().bitrate.packet_rate()
    }

    // ---------------------------------------------------------------------
    // Configuration and identity accessors
    // ---------------------------------------------------------------------

    /// Milliseconds of silence before [`packet_timeout`](Self::packet_timeout)
    /// fires; 0 disables the check.
    pub fn set_packet_timeout(&self, timeout_ms: u32) {
        self.state().packet_timeout_ms = timeout_ms;
    }

    /// Configure NACK. A negative reordering threshold is rejected; with
    /// NACK off the threshold reverts to the default.
    pub fn set_nack_status(
        &self,
        method: NackMethod,
        max_reordering_threshold: i32,
    ) -> Result<()> {
        let mut state = self.state();
        if max_reordering_threshold < 0 {
            return Err(Error::InvalidParameter(
                "negative max reordering threshold".into(),
            ));
        }
        state.max_reordering_threshold = if method == NackMethod::Rtcp {
            max_reordering_threshold
        } else {
            DEFAULT_MAX_REORDERING_THRESHOLD
        };
        state.nack_method = method;
        Ok(())
    }

    pub fn nack_method(&self) -> NackMethod {
        self.state().nack_method
    }

    /// Bind the RTX SSRC whose packets are folded onto the primary stream.
    pub fn set_rtx_status(&self, enable: bool, ssrc: RtpSsrc) {
        let mut state = self.state();
        state.rtx = enable;
        state.ssrc_rtx = ssrc;
    }

    pub fn rtx_status(&self) -> (bool, RtpSsrc) {
        let state = self.state();
        (state.rtx, state.ssrc_rtx)
    }

    /// Accept only packets carrying `allowed_ssrc` when enabled.
    pub fn set_ssrc_filter(&self, enable: bool, allowed_ssrc: RtpSsrc) {
        let mut state = self.state();
        state.use_ssrc_filter = enable;
        state.ssrc_filter = if enable { allowed_ssrc } else { 0 };
    }

    /// The configured filter SSRC, when filtering is enabled.
    pub fn ssrc_filter(&self) -> Option<RtpSsrc> {
        let state = self.state();
        state.use_ssrc_filter.then_some(state.ssrc_filter)
    }

    /// Current remote SSRC; 0 until the first packet.
    pub fn ssrc(&self) -> RtpSsrc {
        self.state().ssrc
    }

    /// Currently advertised contributing sources.
    pub fn csrcs(&self) -> Vec<RtpCsrc> {
        self.state().csrcs.clone()
    }

    /// Per-CSRC audio levels from the last audio packet that carried them.
    pub fn energy(&self) -> Vec<u8> {
        self.state().energy.clone()
    }

    /// Sequence number of the last accepted (non-retransmitted) packet.
    pub fn sequence_number(&self) -> RtpSequenceNumber {
        self.state().last_received_sequence_number
    }

    /// Timestamp of the last accepted (non-retransmitted) packet.
    pub fn timestamp(&self) -> RtpTimestamp {
        self.state().last_received_timestamp
    }

    /// Wall time of the last packet that started a new frame.
    pub fn last_received_frame_time_ms(&self) -> i64 {
        self.state().last_received_frame_time_ms
    }

    // ---------------------------------------------------------------------
    // Payload registry and header extensions
    // ---------------------------------------------------------------------

    /// Register a payload type for reception, notifying the media strategy
    /// when a new descriptor is created.
    pub fn register_receive_payload(
        &self,
        name: &str,
        payload_type: u8,
        frequency_hz: u32,
        channels: u8,
        rate: u32,
    ) -> Result<()> {
        let created_new = self.state().registry.register_receive_payload(
            name,
            payload_type,
            frequency_hz,
            channels,
            rate,
        )?;
        if created_new {
            self.media
                .on_payload_registered(name, payload_type, frequency_hz)?;
        }
        Ok(())
    }

    pub fn deregister_receive_payload(&self, payload_type: u8) -> Result<()> {
        self.state().registry.deregister_receive_payload(payload_type)
    }

    /// Payload-type number registered for these parameters.
    pub fn receive_payload_type(
        &self,
        name: &str,
        frequency_hz: u32,
        channels: u8,
        rate: u32,
    ) -> Result<u8> {
        self.state()
            .registry
            .receive_payload_type(name, frequency_hz, channels, rate)
    }

    /// The payload type registered as RED, if any.
    pub fn red_payload_type(&self) -> Option<u8> {
        self.state().registry.red_payload_type()
    }

    /// Codec family of the last bound video payload.
    pub fn video_codec_type(&self) -> Option<VideoCodecType> {
        match self.media.last_payload() {
            PayloadSpecific::Video(video) => Some(video.codec),
            PayloadSpecific::Audio(_) => None,
        }
    }

    /// Maximum configured bitrate of the last bound payload, 0 when
    /// unconstrained.
    pub fn max_configured_bitrate(&self) -> u32 {
        match self.media.last_payload() {
            PayloadSpecific::Video(video) => video.max_rate,
            PayloadSpecific::Audio(audio) => audio.rate,
        }
    }

    pub fn register_rtp_header_extension(
        &self,
        extension: RtpExtensionType,
        extension_id: u8,
    ) -> Result<()> {
        self.state().extension_map.register(extension, extension_id)
    }

    pub fn deregister_rtp_header_extension(&self, extension: RtpExtensionType) {
        self.state().extension_map.deregister(extension);
    }

    /// Copy of the registered header-extension map for the transport parser.
    pub fn header_extension_map(&self) -> RtpHeaderExtensionMap {
        self.state().extension_map.clone()
    }
}

impl Drop for RtpReceiver {
    fn drop(&mut self) {
        // Every tracked CSRC gets its paired removal callback.
        let csrcs = std::mem::take(&mut self.state().csrcs);
        for csrc in csrcs {
            self.feedback.on_incoming_csrc_changed(csrc, false);
        }
    }
}
