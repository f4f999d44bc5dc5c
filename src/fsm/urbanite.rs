//! Urbanite master FSM — owns the button, ultrasound, and display leaves
//! and classifies button-press duration into pause/on-off/emergency
//! actions (§4.5).
//!
//! ```text
//!        ┌──[no activity]──▶ SLEEP_WHILE_OFF ──[any leaf active]──┐
//!        │                         ▲   │                          │
//!        ▼                         └───┘ [no activity]            │
//!       OFF ◀─────────────────────────────────────────────────────┘
//!        │ [press ≥ on_off_ms]
//!        ▼
//!     MEASURE ──[no activity]──▶ SLEEP_WHILE_ON ──[ultrasound new sample]──▶ MEASURE
//!      │  ▲                            ▲   │
//!      │  │ [on_off_ms ≤ press < emergency_ms] ──▶ OFF                       │
//!      │  │                                                                  │
//!      │  └──[press ≥ emergency_ms]──▶ EMERGENCY ──[press ≥ emergency_ms]────┘
//!      │                                   │  ▲
//!      │                                   └──┘ [emergency flash due]
//!      └──[pause-window press]──▶ MEASURE (toggles paused)
//! ```
//!
//! The master fires all three leaves once per iteration (button first,
//! then ultrasound, then display), then evaluates its own table against
//! the freshly updated leaf state — so "press ≥ threshold" and "new
//! sample" guards always see this tick's result, never last tick's.
//!
//! Within `OFF` and `MEASURE` the generic "no activity" sleep guard is
//! ordered *last* among that state's rows, after every duration- or
//! sample-driven guard. A literal top-to-bottom reading that put it
//! first would race a freshly classified press: `duration_ms` becomes
//! readable in the exact tick `check_activity()` drops to `false` (the
//! button settles into `Released`), so "no activity" and "press ≥
//! threshold" can both hold at once. Catch-alls sort last; see
//! `DESIGN.md` for the full writeup.

use log::info;

use crate::config::SystemConfig;
use crate::error::Result;
use crate::fsm::button::ButtonFsm;
use crate::fsm::display::DisplayFsm;
use crate::fsm::ultrasound::UltrasoundFsm;
use crate::fsm::{Engine, Transition};
use crate::ports::{ButtonPort, DisplayPort, SystemPort, UltrasoundPort};

/// Urbanite master FSM states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Off,
    Measure,
    SleepWhileOff,
    SleepWhileOn,
    Emergency,
}

/// The three leaves plus the shared port, bundled so the master's guards
/// and actions can borrow disjoint fields of one `&mut` reference.
pub struct Leaves<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort> {
    pub button: ButtonFsm<P>,
    pub ultrasound: UltrasoundFsm<P>,
    pub display: DisplayFsm<P>,
    pub ports: P,
}

/// Persistent state private to the master FSM.
pub struct Ctx {
    pause_ms: u32,
    on_off_ms: u32,
    emergency_ms: u32,
    warning_min_cm: u32,
    emergency_flash_period_ms: u32,
    now_ms: u32,
    paused: bool,
    last_distance_cm: Option<u32>,
    emergency: bool,
    emergency_phase: bool,
    next_phase_at_ms: u32,
}

/// Monotonic "is `now` at or after `target`" comparison, wraparound-safe.
fn at_or_after(now: u32, target: u32) -> bool {
    now.wrapping_sub(target) < (u32::MAX / 2)
}

fn any_leaf_active<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    leaves: &Leaves<P>,
) -> bool {
    leaves.button.check_activity()
        || leaves.ultrasound.check_activity()
        || leaves.display.is_active_non_idle()
}

fn off_power_on<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    leaves.button.duration_ms() >= ctx.on_off_ms
}

fn off_no_activity<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    _ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    !any_leaf_active(leaves)
}

fn sleep_off_any_active<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    _ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    any_leaf_active(leaves)
}

fn measure_pause_window<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    let d = leaves.button.duration_ms();
    d >= ctx.pause_ms && d < ctx.on_off_ms
}

fn measure_new_sample<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    _ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    leaves.ultrasound.has_new_sample()
}

fn measure_emergency_on<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    leaves.button.duration_ms() >= ctx.emergency_ms
}

fn measure_power_off<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    let d = leaves.button.duration_ms();
    d >= ctx.on_off_ms && d < ctx.emergency_ms
}

fn measure_no_activity<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    _ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    !any_leaf_active(leaves)
}

fn sleep_on_new_sample<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    _ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    leaves.ultrasound.has_new_sample()
}

fn sleep_on_no_activity<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    _ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    !any_leaf_active(leaves)
}

fn emergency_exit<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &Ctx,
    leaves: &Leaves<P>,
) -> bool {
    leaves.button.duration_ms() >= ctx.emergency_ms
}

fn emergency_flash_due<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &Ctx,
    _leaves: &Leaves<P>,
) -> bool {
    ctx.emergency && at_or_after(ctx.now_ms, ctx.next_phase_at_ms)
}

/// Reflect the current `paused`/`last_distance_cm` state onto the
/// display: forwards every sample while unpaused, and while paused
/// forwards only samples under half `warning_min_cm` (otherwise keeps
/// the display dark — still alerts on an imminent collision, §4.5).
fn apply_pause_state<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    if ctx.paused {
        match ctx.last_distance_cm {
            Some(d) if d < ctx.warning_min_cm / 2 => {
                leaves.display.set_enabled(true);
                leaves.display.push_distance(d as i32);
            }
            _ => leaves.display.set_enabled(false),
        }
    } else {
        leaves.display.set_enabled(true);
        if let Some(d) = ctx.last_distance_cm {
            leaves.display.push_distance(d as i32);
        }
    }
}

fn sleep<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    _ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    leaves.ports.sleep();
}

fn power_on<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    leaves.button.reset_duration();
    leaves.ultrasound.start(&mut leaves.ports);
    leaves.display.set_enabled(true);
    ctx.paused = false;
    ctx.last_distance_cm = None;
    ctx.emergency = false;
}

fn toggle_pause<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    leaves.button.reset_duration();
    ctx.paused = !ctx.paused;
    apply_pause_state(ctx, leaves);
}

fn on_new_sample<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    if let Some(sample) = leaves.ultrasound.take_new_sample() {
        ctx.last_distance_cm = Some(sample);
        apply_pause_state(ctx, leaves);
    }
}

fn enter_emergency<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    leaves.button.reset_duration();
    leaves.ultrasound.stop(&mut leaves.ports);
    ctx.emergency = true;
    ctx.emergency_phase = true;
    ctx.next_phase_at_ms = ctx.now_ms + ctx.emergency_flash_period_ms;
    leaves.display.set_enabled(true);
    leaves.display.push_distance(0);
}

fn flash_emergency<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    ctx.emergency_phase = !ctx.emergency_phase;
    ctx.next_phase_at_ms = ctx.now_ms + ctx.emergency_flash_period_ms;
    leaves
        .display
        .push_distance(if ctx.emergency_phase { 0 } else { 500 });
}

fn exit_emergency<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    leaves.button.reset_duration();
    leaves.ultrasound.start(&mut leaves.ports);
    ctx.emergency = false;
    apply_pause_state(ctx, leaves);
}

fn power_off<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
    ctx: &mut Ctx,
    leaves: &mut Leaves<P>,
) {
    leaves.button.reset_duration();
    leaves.ultrasound.stop(&mut leaves.ports);
    leaves.display.set_enabled(false);
    ctx.paused = false;
}

fn transition_table<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
) -> [Transition<Ctx, Leaves<P>, State>; 12] {
    [
        Transition {
            from: State::Off,
            guard: off_power_on,
            to: State::Measure,
            action: Some(power_on),
        },
        Transition {
            from: State::Off,
            guard: off_no_activity,
            to: State::SleepWhileOff,
            action: Some(sleep),
        },
        Transition {
            from: State::SleepWhileOff,
            guard: sleep_off_any_active,
            to: State::Off,
            action: None,
        },
        Transition {
            from: State::SleepWhileOff,
            guard: off_no_activity,
            to: State::SleepWhileOff,
            action: Some(sleep),
        },
        Transition {
            from: State::Measure,
            guard: measure_pause_window,
            to: State::Measure,
            action: Some(toggle_pause),
        },
        Transition {
            from: State::Measure,
            guard: measure_new_sample,
            to: State::Measure,
            action: Some(on_new_sample),
        },
        Transition {
            from: State::Measure,
            guard: measure_emergency_on,
            to: State::Emergency,
            action: Some(enter_emergency),
        },
        Transition {
            from: State::Measure,
            guard: measure_power_off,
            to: State::Off,
            action: Some(power_off),
        },
        Transition {
            from: State::Measure,
            guard: measure_no_activity,
            to: State::SleepWhileOn,
            action: Some(sleep),
        },
        Transition {
            from: State::SleepWhileOn,
            guard: sleep_on_new_sample,
            to: State::Measure,
            action: None,
        },
        Transition {
            from: State::SleepWhileOn,
            guard: sleep_on_no_activity,
            to: State::SleepWhileOn,
            action: Some(sleep),
        },
        Transition {
            from: State::Emergency,
            guard: emergency_exit,
            to: State::Measure,
            action: Some(exit_emergency),
        },
    ]
}

fn emergency_flash_row<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
) -> Transition<Ctx, Leaves<P>, State> {
    Transition {
        from: State::Emergency,
        guard: emergency_flash_due,
        to: State::Emergency,
        action: Some(flash_emergency),
    }
}

fn full_table<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort>(
) -> [Transition<Ctx, Leaves<P>, State>; 13] {
    let base = transition_table::<P>();
    let [t0, t1, t2, t3, t4, t5, t6, t7, t8, t9, t10, t11] = base;
    [
        t0,
        t1,
        t2,
        t3,
        t4,
        t5,
        t6,
        t7,
        t8,
        t9,
        t10,
        t11,
        emergency_flash_row::<P>(),
    ]
}

/// The Urbanite master FSM. Owns the button, ultrasound, and display
/// leaves plus the shared port; drives every leaf exactly once per
/// [`fire`](Self::fire), then evaluates its own table against the
/// freshly updated result.
pub struct UrbaniteFsm<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort> {
    engine: Engine<Ctx, Leaves<P>, State, 13>,
    ctx: Ctx,
    leaves: Leaves<P>,
}

impl<P: ButtonPort + UltrasoundPort + DisplayPort + SystemPort> UrbaniteFsm<P> {
    /// Construct the master FSM, initialising each leaf's peripheral id
    /// on the port first (§7a). An id the port layer does not recognise
    /// is a programmer error and is unrecoverable — the caller should
    /// treat `Err` as a halt-on-boot condition.
    pub fn new(
        config: SystemConfig,
        button_id: u32,
        ultrasound_id: u32,
        display_id: u32,
        mut ports: P,
    ) -> Result<Self> {
        ButtonPort::init(&mut ports, button_id)?;
        UltrasoundPort::init(&mut ports, ultrasound_id)?;
        DisplayPort::init(&mut ports, display_id)?;

        Ok(Self {
            engine: Engine::new("urbanite", State::Off, full_table()),
            ctx: Ctx {
                pause_ms: config.pause_ms,
                on_off_ms: config.on_off_ms,
                emergency_ms: config.emergency_ms,
                warning_min_cm: config.warning_min_cm,
                emergency_flash_period_ms: config.emergency_flash_period_ms,
                now_ms: 0,
                paused: false,
                last_distance_cm: None,
                emergency: false,
                emergency_phase: false,
                next_phase_at_ms: 0,
            },
            leaves: Leaves {
                button: ButtonFsm::new(button_id, config.debounce_ms),
                ultrasound: UltrasoundFsm::new(ultrasound_id, config.capture_tick_us),
                display: DisplayFsm::new(display_id),
                ports,
            },
        })
    }

    /// Fire the button, ultrasound, and display leaves once each, then
    /// evaluate the master's own transition table against the result.
    /// Unlike the leaves' own `fire` (logged at `debug!` by the shared
    /// engine), a master state change is operator-visible and logged at
    /// `info!` here.
    pub fn fire(&mut self) {
        let now = self.leaves.ports.now_ms();
        self.ctx.now_ms = now;
        self.leaves.button.fire(now, &mut self.leaves.ports);
        self.leaves.ultrasound.fire(&mut self.leaves.ports);
        self.leaves.display.fire(&mut self.leaves.ports);
        let before = self.engine.state();
        self.engine.fire(&mut self.ctx, &mut self.leaves);
        let after = self.engine.state();
        if after != before {
            info!("urbanite: {:?} -> {:?}", before, after);
        }
    }

    pub fn state(&self) -> State {
        self.engine.state()
    }

    pub fn is_paused(&self) -> bool {
        self.ctx.paused
    }

    pub fn is_emergency(&self) -> bool {
        self.ctx.emergency
    }

    pub fn last_distance_cm(&self) -> Option<u32> {
        self.ctx.last_distance_cm
    }

    pub fn ultrasound_enabled(&self) -> bool {
        self.leaves.ultrasound.enabled()
    }

    pub fn display_enabled(&self) -> bool {
        self.leaves.display.enabled()
    }

    pub fn ports(&self) -> &P {
        &self.leaves.ports
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.leaves.ports
    }
}
