//! Windowed receive-rate measurement.
//!
//! Ticked once per accepted packet and folded into a rate estimate by the
//! periodic process call. Estimates are smoothed 50/50 with the previous
//! window so a single short window does not whipsaw the value.

/// Shortest window the estimate updates over, in milliseconds
const MIN_RATE_WINDOW_MS: i64 = 100;

/// A gap this long with no process call restarts the estimate
const RATE_RESET_MS: i64 = 10_000;

/// Byte and packet rate meter over process-call windows.
#[derive(Debug, Default)]
pub struct BitrateMeter {
    window_bytes: u32,
    window_packets: u32,
    time_last_rate_update_ms: i64,
    bitrate_bps: u32,
    packet_rate: u32,
}

impl BitrateMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received packet carrying `bytes` payload bytes.
    pub fn update(&mut self, bytes: usize) {
        self.window_bytes = self.window_bytes.wrapping_add(bytes as u32);
        self.window_packets = self.window_packets.wrapping_add(1);
    }

    /// Fold the accumulated window into the rate estimate.
    pub fn process(&mut self, now_ms: i64) {
        let window_ms = now_ms - self.time_last_rate_update_ms;
        if window_ms < MIN_RATE_WINDOW_MS {
            return;
        }

        if window_ms > RATE_RESET_MS {
            // First call, or the stream went quiet; restart rather than
            // average across the gap.
            self.bitrate_bps = 0;
            self.packet_rate = 0;
        } else {
            let window_bps = (self.window_bytes as u64 * 8 * 1000 / window_ms as u64) as u32;
            let window_packet_rate =
                (self.window_packets as u64 * 1000 / window_ms as u64) as u32;
            self.bitrate_bps = (self.bitrate_bps / 2).wrapping_add(window_bps / 2);
            self.packet_rate = (self.packet_rate / 2).wrapping_add(window_packet_rate / 2);
        }

        self.window_bytes = 0;
        self.window_packets = 0;
        self.time_last_rate_update_ms = now_ms;
    }

    /// Current smoothed bitrate in bits per second.
    pub fn bitrate_bps(&self) -> u32 {
        self.bitrate_bps
    }

    /// Current smoothed packet rate in packets per second.
    pub fn packet_rate(&self) -> u32 {
        self.packet_rate
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_stream_converges_on_the_wire_rate() {
        let mut meter = BitrateMeter::new();
        meter.process(0);

        // 50 packets of 160 bytes over each second is 64 kbit/s.
        let mut now = 0;
        for _ in 0..8 {
            for _ in 0..50 {
                meter.update(160);
            }
            now += 1_000;
            meter.process(now);
        }

        let bps = meter.bitrate_bps();
        assert!(bps > 56_000 && bps <= 64_000, "bitrate {bps} out of range");
        let pps = meter.packet_rate();
        assert!(pps > 43 && pps <= 50, "packet rate {pps} out of range");
    }

    #[test]
    fn short_windows_are_deferred() {
        let mut meter = BitrateMeter::new();
        meter.process(0);

        meter.update(1_000);
        meter.process(50);
        assert_eq!(meter.bitrate_bps(), 0);

        // The bytes are still in the window once it is long enough.
        meter.process(200);
        assert!(meter.bitrate_bps() > 0);
    }

    #[test]
    fn long_silence_resets_the_estimate() {
        let mut meter = BitrateMeter::new();
        meter.process(0);
        for _ in 0..50 {
            meter.update(160);
        }
        meter.process(1_000);
        assert!(meter.bitrate_bps() > 0);

        meter.process(20_000);
        assert_eq!(meter.bitrate_bps(), 0);
        assert_eq!(meter.packet_rate(), 0);
    }
}
