//! Ultrasound FSM — drives one HC-SR04-style trigger/echo measurement
//! cycle per period, with timer-overflow-aware elapsed-time accounting
//! and a median filter over the raw captures.
//!
//! ```text
//!  WAIT_START ──[enabled & trigger_ready]──▶ TRIGGER_START
//!                                                  │ [trigger_end]
//!                                                  ▼
//!                                          WAIT_ECHO_START
//!                                                  │ [echo_init_tick > 0]
//!                                                  ▼
//!                                          WAIT_ECHO_END
//!                                                  │ [echo_received]
//!                                                  ▼
//!                                          SET_DISTANCE
//!                                                  │
//!                        [trigger_ready] ──────────┴──────────▶ back to TRIGGER_START
//!                        [!enabled] from any active state ─────▶ WAIT_START
//! ```
//!
//! The cycle timer firing (`trigger_ready`) always wins a race with a
//! slow or missing echo: every active state carries a row back to
//! `TRIGGER_START` so a non-responding sensor cannot wedge the FSM
//! (§5 cancellation/timeouts). When that row fires from anywhere but
//! `SET_DISTANCE`, the in-flight capture is simply discarded — the
//! sample ring is only ever written from the `WAIT_ECHO_END →
//! SET_DISTANCE` row.

use log::warn;

use crate::config::MEDIAN_WINDOW;
use crate::fsm::{Engine, Transition};
use crate::ports::UltrasoundPort;

/// Ultrasound FSM states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    WaitStart,
    TriggerStart,
    WaitEchoStart,
    WaitEchoEnd,
    SetDistance,
}

/// Persistent state private to one ultrasound FSM instance.
pub struct Ctx {
    pub ultrasound_id: u32,
    pub enabled: bool,
    capture_tick_us: u32,
    sample_ring: [u32; MEDIAN_WINDOW],
    idx: usize,
    distance_cm: u32,
    new_sample: bool,
}

/// Capture-timer wraparound width, in ticks (the timer's 16-bit auto-reload).
const TIMER_WRAP: u64 = 65_536;

/// Convert a rising/falling capture pair plus the overflow count observed
/// between them into elapsed ticks, accounting for at most one
/// timer wraparound inside the capture window.
pub fn elapsed_ticks(init_tick: u32, end_tick: u32, overflows: u32) -> u64 {
    let (elapsed, overflows) = if end_tick >= init_tick {
        ((end_tick - init_tick) as u64, overflows)
    } else {
        (
            (TIMER_WRAP - init_tick as u64) + end_tick as u64,
            overflows.saturating_sub(1),
        )
    };
    elapsed + (overflows as u64) * TIMER_WRAP
}

/// Round-trip microseconds to centimetres: 58.3 µs per cm at 343 m/s,
/// i.e. `distance_cm = floor(elapsed_us * 10 / 583)`.
pub fn distance_cm_from_elapsed_us(elapsed_us: u64) -> u32 {
    ((elapsed_us * 10) / 583) as u32
}

/// Median of a full sample window. Even-length windows average the two
/// central values, matching the specification's tie-break rule.
pub fn median(samples: &[u32; MEDIAN_WINDOW]) -> u32 {
    let mut sorted = *samples;
    sorted.sort_unstable();
    let mid = MEDIAN_WINDOW / 2;
    if MEDIAN_WINDOW % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2
    }
}

/// True once the periodic cycle timer has fired and the FSM is enabled.
/// Used both to kick off the very first cycle from `WaitStart` and to
/// force a restart from any in-flight state (the implicit timeout).
fn cycle_elapsed<P: UltrasoundPort>(ctx: &Ctx, port: &P) -> bool {
    ctx.enabled && port.trigger_ready(ctx.ultrasound_id)
}

fn disabled<P: UltrasoundPort>(ctx: &Ctx, _port: &P) -> bool {
    !ctx.enabled
}

fn trigger_pulse_done<P: UltrasoundPort>(ctx: &Ctx, port: &P) -> bool {
    port.trigger_end(ctx.ultrasound_id)
}

fn echo_rising_seen<P: UltrasoundPort>(ctx: &Ctx, port: &P) -> bool {
    port.echo_init_tick(ctx.ultrasound_id) > 0
}

fn echo_falling_seen<P: UltrasoundPort>(ctx: &Ctx, port: &P) -> bool {
    port.echo_received(ctx.ultrasound_id)
}

fn begin_cycle<P: UltrasoundPort>(ctx: &mut Ctx, port: &mut P) {
    port.reset_echo_ticks(ctx.ultrasound_id);
    port.set_trigger_ready(ctx.ultrasound_id, false);
    port.start_measurement(ctx.ultrasound_id);
}

/// The cycle timer fired again before the trigger pulse finished —
/// hardware non-response (§7b). The in-flight cycle is discarded.
fn forced_restart<P: UltrasoundPort>(ctx: &mut Ctx, port: &mut P) {
    warn!(
        "ultrasound {}: cycle timer forced a restart before the trigger pulse completed",
        ctx.ultrasound_id
    );
    begin_cycle(ctx, port);
}

/// The cycle timer fired again before an echo edge arrived — a lost
/// edge (§7c). `echo_init_tick == 0` means the rising edge never came;
/// otherwise the falling edge was the one lost. Either way the sample
/// is skipped and the ring index does not advance.
fn forced_restart_lost_edge<P: UltrasoundPort>(ctx: &mut Ctx, port: &mut P) {
    if port.echo_init_tick(ctx.ultrasound_id) == 0 {
        warn!(
            "ultrasound {}: lost echo rising edge, skipping sample and forcing re-measurement",
            ctx.ultrasound_id
        );
    } else {
        warn!(
            "ultrasound {}: lost echo falling edge, skipping sample and forcing re-measurement",
            ctx.ultrasound_id
        );
    }
    begin_cycle(ctx, port);
}

fn drop_trigger_line<P: UltrasoundPort>(ctx: &mut Ctx, port: &mut P) {
    port.stop_trigger_timer(ctx.ultrasound_id);
    port.set_trigger_end(ctx.ultrasound_id, false);
}

fn capture_distance<P: UltrasoundPort>(ctx: &mut Ctx, port: &mut P) {
    let id = ctx.ultrasound_id;
    let init = port.echo_init_tick(id);
    let end = port.echo_end_tick(id);
    let overflows = port.echo_overflows(id);

    let ticks = elapsed_ticks(init, end, overflows);
    let us = ticks * ctx.capture_tick_us as u64;
    let raw_cm = distance_cm_from_elapsed_us(us);

    ctx.sample_ring[ctx.idx] = raw_cm;
    ctx.idx += 1;
    if ctx.idx == MEDIAN_WINDOW {
        ctx.distance_cm = median(&ctx.sample_ring);
        ctx.new_sample = true;
        ctx.idx = 0;
    }

    port.stop_echo_timer(id);
    port.reset_echo_ticks(id);
}

fn stop_and_halt<P: UltrasoundPort>(ctx: &mut Ctx, port: &mut P) {
    port.stop_ultrasound(ctx.ultrasound_id);
}

fn transition_table<P: UltrasoundPort>() -> [Transition<Ctx, P, State>; 9] {
    [
        Transition {
            from: State::WaitStart,
            guard: cycle_elapsed,
            to: State::TriggerStart,
            action: Some(begin_cycle),
        },
        Transition {
            from: State::TriggerStart,
            guard: trigger_pulse_done,
            to: State::WaitEchoStart,
            action: Some(drop_trigger_line),
        },
        Transition {
            from: State::TriggerStart,
            guard: cycle_elapsed,
            to: State::TriggerStart,
            action: Some(forced_restart),
        },
        Transition {
            from: State::WaitEchoStart,
            guard: echo_rising_seen,
            to: State::WaitEchoEnd,
            action: None,
        },
        Transition {
            from: State::WaitEchoStart,
            guard: cycle_elapsed,
            to: State::TriggerStart,
            action: Some(forced_restart_lost_edge),
        },
        Transition {
            from: State::WaitEchoEnd,
            guard: echo_falling_seen,
            to: State::SetDistance,
            action: Some(capture_distance),
        },
        Transition {
            from: State::WaitEchoEnd,
            guard: cycle_elapsed,
            to: State::TriggerStart,
            action: Some(forced_restart_lost_edge),
        },
        Transition {
            from: State::SetDistance,
            guard: cycle_elapsed,
            to: State::TriggerStart,
            action: Some(begin_cycle),
        },
        Transition {
            from: State::SetDistance,
            guard: disabled,
            to: State::WaitStart,
            action: Some(stop_and_halt),
        },
    ]
}

/// The ultrasound FSM. `P` is the board crate's concrete port implementation.
pub struct UltrasoundFsm<P: UltrasoundPort> {
    engine: Engine<Ctx, P, State, 9>,
    ctx: Ctx,
}

impl<P: UltrasoundPort> UltrasoundFsm<P> {
    pub fn new(ultrasound_id: u32, capture_tick_us: u32) -> Self {
        Self {
            engine: Engine::new("ultrasound", State::WaitStart, transition_table()),
            ctx: Ctx {
                ultrasound_id,
                enabled: false,
                capture_tick_us,
                sample_ring: [0; MEDIAN_WINDOW],
                idx: 0,
                distance_cm: 0,
                new_sample: false,
            },
        }
    }

    /// Clear the ring, enable the FSM, and mark the trigger ready so the
    /// next `fire` starts the first measurement cycle.
    pub fn start(&mut self, port: &mut P) {
        self.ctx.sample_ring = [0; MEDIAN_WINDOW];
        self.ctx.idx = 0;
        self.ctx.enabled = true;
        port.set_trigger_ready(self.ctx.ultrasound_id, true);
        port.start_new_measurement_timer(self.ctx.ultrasound_id);
    }

    /// Disable the FSM and command the port to halt all timers and
    /// clear captures. Takes effect on the next `fire`.
    pub fn stop(&mut self, port: &mut P) {
        self.ctx.enabled = false;
        port.stop_new_measurement_timer(self.ctx.ultrasound_id);
        port.stop_ultrasound(self.ctx.ultrasound_id);
        self.engine.force_state(State::WaitStart);
    }

    pub fn fire(&mut self, port: &mut P) {
        self.engine.fire(&mut self.ctx, port);
    }

    pub fn state(&self) -> State {
        self.engine.state()
    }

    /// Last median-filtered distance. Only meaningful once at least one
    /// full window has completed.
    pub fn distance_cm(&self) -> u32 {
        self.ctx.distance_cm
    }

    /// Consume the one-shot "a fresh median just landed" edge.
    pub fn take_new_sample(&mut self) -> Option<u32> {
        if self.ctx.new_sample {
            self.ctx.new_sample = false;
            Some(self.ctx.distance_cm)
        } else {
            None
        }
    }

    /// Peek the "a fresh median just landed" edge without consuming it.
    pub fn has_new_sample(&self) -> bool {
        self.ctx.new_sample
    }

    /// True between `start` and `stop` — the leaf is actively cycling.
    pub fn enabled(&self) -> bool {
        self.ctx.enabled
    }

    /// Per §9's open question: the Urbanite activity gate must not
    /// depend on ultrasound liveness. This is always `false`, by design.
    pub fn check_activity(&self) -> bool {
        false
    }
}
