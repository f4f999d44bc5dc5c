//! System configuration — the compile-time constants of the wire-level
//! contract, held in a `Default`-constructible struct.
//!
//! There is no persistence and no CLI: `SystemConfig` exists purely so
//! tests can vary thresholds (e.g. a short debounce window for fast unit
//! tests) without touching the constants production code is built
//! against. `SystemConfig::default()` reproduces every
//! compatibility-critical value named in the specification.

/// Tunable parameters shared by the button, ultrasound, and master FSMs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemConfig {
    // --- Button debounce ---
    /// Debounce window applied to both press and release edges (ms).
    pub debounce_ms: u32,

    // --- Urbanite press-duration thresholds ---
    /// Minimum press duration classified as a pause toggle (ms).
    pub pause_ms: u32,
    /// Minimum press duration classified as power on/off (ms).
    pub on_off_ms: u32,
    /// Minimum press duration classified as an emergency toggle (ms).
    pub emergency_ms: u32,

    // --- Ultrasound timing ---
    /// Trigger pulse high time (µs).
    pub trigger_high_us: u32,
    /// Measurement period: time between the start of successive trigger
    /// pulses (ms).
    pub measurement_period_ms: u32,
    /// Echo capture timer resolution (µs per tick).
    pub capture_tick_us: u32,

    // --- Display ---
    /// Collision warning threshold (cm) — the RED/YELLOW colour boundary.
    /// In pause mode the display is forced on whenever distance drops
    /// below half of this value.
    pub warning_min_cm: u32,

    /// Dwell time of each emergency-flash phase (ms).
    pub emergency_flash_period_ms: u32,
}

/// Length of the median filter window (number of raw samples averaged
/// into one reported distance).
pub const MEDIAN_WINDOW: usize = 5;

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            pause_ms: 250,
            on_off_ms: 1000,
            emergency_ms: 3000,
            trigger_high_us: 10,
            measurement_period_ms: 100,
            capture_tick_us: 1,
            warning_min_cm: 25,
            emergency_flash_period_ms: 1000,
        }
    }
}

impl SystemConfig {
    /// `pause_ms < on_off_ms < emergency_ms` is a load-bearing invariant
    /// of the Urbanite master FSM's press classification — checked once
    /// at construction rather than re-derived on every press.
    pub fn validate(&self) -> bool {
        self.pause_ms < self.on_off_ms && self.on_off_ms < self.emergency_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_threshold_ordering() {
        assert!(SystemConfig::default().validate());
    }
}
