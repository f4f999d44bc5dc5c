//! Host-simulated port implementation — a single struct implementing
//! every port trait, standing in for the board crate in tests and the
//! demo binary (§1: no concrete hardware driver lives in this crate).
//!
//! Timers are simulated in software: `advance_ms` moves the clock
//! forward and resolves the trigger/cycle timers and the echo capture
//! window against a caller-supplied echo latency, the same way a real
//! `UltrasoundPort` implementation would resolve them against actual
//! GPIO edges.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::ports::{ButtonPort, DisplayPort, Rgb, SystemPort, UltrasoundPort};

/// Per-ultrasound simulated timer state.
#[derive(Default, Clone, Copy)]
struct UltrasoundState {
    enabled: bool,
    trigger_ready: bool,
    trigger_end: bool,
    echo_init_tick: u32,
    echo_end_tick: u32,
    echo_overflows: u32,
    echo_received: bool,
    trigger_started_at: Option<u32>,
    /// Echo round-trip latency the simulation should report for the
    /// *next* completed cycle, in the port's tick units. `None` means
    /// "never respond" (a disconnected sensor).
    echo_latency_ticks: Option<u32>,
    next_cycle_at: u32,
}

/// Simulated board: one clock, one button line, one ultrasound channel,
/// one RGB output. Good enough to drive the Urbanite master end to end
/// without real silicon.
pub struct SimPort {
    pub now_ms: u32,
    pub pressed: bool,
    pub rgb: Rgb,
    measurement_period_ticks: u32,
    ultrasound: HashMap<u32, UltrasoundState>,
    /// Ids this simulated board is wired up for, mirroring a real board
    /// crate that only recognises a fixed set of peripheral ids. `init`
    /// rejects anything outside this set. `None` means "accept any id" —
    /// used by callers that don't care about exercising the rejection path.
    configured_ids: Option<HashSet<u32>>,
}

impl SimPort {
    /// `trigger_high_us` is accepted for parity with the real port's
    /// constructor but unused: at millisecond simulation resolution a
    /// 10µs pulse always resolves within a single `advance_ms` tick.
    ///
    /// Accepts any peripheral id at `init` — use
    /// [`with_configured_ids`](Self::with_configured_ids) to model a
    /// board that only wires up a fixed set.
    pub fn new(_trigger_high_us: u32, measurement_period_ticks: u32) -> Self {
        Self {
            now_ms: 0,
            pressed: false,
            rgb: Rgb::OFF,
            measurement_period_ticks,
            ultrasound: HashMap::new(),
            configured_ids: None,
        }
    }

    /// Restrict `init` to only the given ids, rejecting any other id
    /// with `Error::InvalidPeripheral` — the host-simulated analogue of
    /// a board crate that only wires up a fixed set of peripherals.
    #[must_use]
    pub fn with_configured_ids(mut self, ids: &[u32]) -> Self {
        self.configured_ids = Some(ids.iter().copied().collect());
        self
    }

    fn check_configured(&self, kind: &'static str, id: u32) -> Result<()> {
        match &self.configured_ids {
            Some(ids) if !ids.contains(&id) => Err(Error::InvalidPeripheral(kind, id)),
            _ => Ok(()),
        }
    }

    /// Program the echo latency (in capture ticks) the next ultrasound
    /// cycle on `id` should resolve to. Call before the cycle that
    /// should observe it.
    pub fn set_echo_latency_ticks(&mut self, id: u32, latency_ticks: Option<u32>) {
        self.ultrasound.entry(id).or_default().echo_latency_ticks = latency_ticks;
    }

    /// Advance the simulated clock by `delta_ms`, resolving any
    /// in-flight trigger pulse or echo window along the way.
    pub fn advance_ms(&mut self, delta_ms: u32) {
        self.now_ms = self.now_ms.wrapping_add(delta_ms);
        let ids: Vec<u32> = self.ultrasound.keys().copied().collect();
        for id in ids {
            self.resolve_ultrasound(id);
        }
    }

    fn resolve_ultrasound(&mut self, id: u32) {
        let st = self.ultrasound.get_mut(&id).unwrap();
        // `trigger_high_us` is microseconds; at millisecond simulation
        // resolution a pulse this short always resolves within one tick.
        if st.trigger_started_at.is_some() {
            st.trigger_end = true;
            st.trigger_started_at = None;
            if let Some(latency) = st.echo_latency_ticks {
                st.echo_init_tick = 1;
                st.echo_end_tick = 1 + latency.max(1);
                st.echo_received = true;
            }
        }
        if st.enabled && self.now_ms >= st.next_cycle_at {
            st.trigger_ready = true;
            st.next_cycle_at = self.now_ms + self.measurement_period_ticks;
        }
    }
}

impl SystemPort for SimPort {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }

    fn sleep(&mut self) {
        // Host simulation has no low-power idle primitive to invoke;
        // the caller's loop simply proceeds to the next iteration.
    }
}

impl ButtonPort for SimPort {
    fn init(&mut self, id: u32) -> Result<()> {
        self.check_configured("button", id)
    }

    fn pressed(&self, _id: u32) -> bool {
        self.pressed
    }

    fn set_pressed(&mut self, _id: u32, value: bool) {
        self.pressed = value;
    }

    fn value(&self, _id: u32) -> bool {
        self.pressed
    }

    fn interrupt_pending(&self, _id: u32) -> bool {
        false
    }

    fn interrupt_clear(&mut self, _id: u32) {}

    fn interrupt_disable(&mut self, _id: u32) {}
}

impl UltrasoundPort for SimPort {
    fn init(&mut self, id: u32) -> Result<()> {
        self.check_configured("ultrasound", id)?;
        self.ultrasound.entry(id).or_default();
        Ok(())
    }

    fn start_measurement(&mut self, id: u32) {
        let now = self.now_ms;
        let st = self.ultrasound.entry(id).or_default();
        st.trigger_end = false;
        st.trigger_started_at = Some(now);
    }

    fn start_new_measurement_timer(&mut self, id: u32) {
        let now = self.now_ms;
        let period = self.measurement_period_ticks;
        let st = self.ultrasound.entry(id).or_default();
        st.enabled = true;
        st.next_cycle_at = now + period;
    }

    fn stop_new_measurement_timer(&mut self, id: u32) {
        self.ultrasound.entry(id).or_default().enabled = false;
    }

    fn stop_echo_timer(&mut self, _id: u32) {}

    fn stop_trigger_timer(&mut self, _id: u32) {}

    fn stop_ultrasound(&mut self, id: u32) {
        let st = self.ultrasound.entry(id).or_default();
        st.enabled = false;
        st.trigger_ready = false;
        st.trigger_end = false;
        st.echo_init_tick = 0;
        st.echo_end_tick = 0;
        st.echo_received = false;
    }

    fn echo_init_tick(&self, id: u32) -> u32 {
        self.ultrasound.get(&id).map_or(0, |s| s.echo_init_tick)
    }

    fn set_echo_init_tick(&mut self, id: u32, tick: u32) {
        self.ultrasound.entry(id).or_default().echo_init_tick = tick;
    }

    fn echo_end_tick(&self, id: u32) -> u32 {
        self.ultrasound.get(&id).map_or(0, |s| s.echo_end_tick)
    }

    fn set_echo_end_tick(&mut self, id: u32, tick: u32) {
        self.ultrasound.entry(id).or_default().echo_end_tick = tick;
    }

    fn echo_overflows(&self, id: u32) -> u32 {
        self.ultrasound
            .get(&id)
            .map_or(0, |s| s.echo_overflows)
    }

    fn set_echo_overflows(&mut self, id: u32, count: u32) {
        self.ultrasound.entry(id).or_default().echo_overflows = count;
    }

    fn echo_received(&self, id: u32) -> bool {
        self.ultrasound
            .get(&id)
            .is_some_and(|s| s.echo_received)
    }

    fn set_echo_received(&mut self, id: u32, value: bool) {
        self.ultrasound.entry(id).or_default().echo_received = value;
    }

    fn trigger_end(&self, id: u32) -> bool {
        self.ultrasound.get(&id).is_some_and(|s| s.trigger_end)
    }

    fn set_trigger_end(&mut self, id: u32, value: bool) {
        self.ultrasound.entry(id).or_default().trigger_end = value;
    }

    fn trigger_ready(&self, id: u32) -> bool {
        self.ultrasound
            .get(&id)
            .is_some_and(|s| s.trigger_ready)
    }

    fn set_trigger_ready(&mut self, id: u32, value: bool) {
        self.ultrasound.entry(id).or_default().trigger_ready = value;
    }

    fn reset_echo_ticks(&mut self, id: u32) {
        let st = self.ultrasound.entry(id).or_default();
        st.echo_init_tick = 0;
        st.echo_end_tick = 0;
        st.echo_received = false;
    }
}

impl DisplayPort for SimPort {
    fn init(&mut self, id: u32) -> Result<()> {
        self.check_configured("display", id)
    }

    fn set_rgb(&mut self, _id: u32, rgb: Rgb) {
        self.rgb = rgb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_cycle_resolves_an_echo() {
        let mut port = SimPort::new(10, 100);
        UltrasoundPort::init(&mut port, 1).unwrap();
        port.set_echo_latency_ticks(1, Some(991));
        port.set_trigger_ready(1, true);
        port.start_measurement(1);
        port.advance_ms(1);
        assert!(port.trigger_end(1));
        assert!(port.echo_received(1));
    }

    #[test]
    fn init_rejects_an_id_outside_the_configured_set() {
        let mut port = SimPort::new(10, 100).with_configured_ids(&[1]);
        assert!(UltrasoundPort::init(&mut port, 1).is_ok());
        let err = UltrasoundPort::init(&mut port, 2).unwrap_err();
        assert_eq!(err, Error::InvalidPeripheral("ultrasound", 2));
    }
}
