//! Button FSM — debounces a single momentary input and measures press
//! duration against the monotonic millisecond clock.
//!
//! ```text
//!  RELEASED ──[pressed]──▶ PRESSED_WAIT ──[debounced]──▶ PRESSED
//!     ▲                                                     │
//!     │                                          [released edge]
//!     │                                                     ▼
//!     └──[debounced]── RELEASED_WAIT ◀─────────────────────┘
//! ```
//!
//! `duration_ms` is only meaningful in `Released` and only becomes
//! non-zero on a clean press→release classified by debounce (§4.2).
//! [`ButtonFsm::reset_duration`] must be called by the consumer
//! (the Urbanite master) after reading a classification, so the same
//! press is never consumed twice.

use crate::fsm::{Engine, Transition};
use crate::ports::ButtonPort;

/// Button FSM states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Released,
    PressedWait,
    Pressed,
    ReleasedWait,
}

/// Persistent state private to one button FSM instance.
pub struct Ctx {
    pub button_id: u32,
    pub debounce_ms: u32,
    pub now_ms: u32,
    press_tick: u32,
    release_tick: u32,
    duration_ms: u32,
}

fn is_pressed<P: ButtonPort>(ctx: &Ctx, port: &P) -> bool {
    port.pressed(ctx.button_id)
}

fn is_released<P: ButtonPort>(ctx: &Ctx, port: &P) -> bool {
    !port.pressed(ctx.button_id)
}

fn debounce_elapsed_since_press(ctx: &Ctx) -> bool {
    ctx.now_ms.wrapping_sub(ctx.press_tick) >= ctx.debounce_ms
}

fn debounce_elapsed_since_release(ctx: &Ctx) -> bool {
    ctx.now_ms.wrapping_sub(ctx.release_tick) >= ctx.debounce_ms
}

fn on_press_edge<P: ButtonPort>(ctx: &mut Ctx, port: &mut P) {
    ctx.press_tick = ctx.now_ms;
    port.set_pressed(ctx.button_id, false);
}

fn on_release_edge<P: ButtonPort>(ctx: &mut Ctx, port: &mut P) {
    ctx.duration_ms = ctx.now_ms.wrapping_sub(ctx.press_tick);
    ctx.release_tick = ctx.now_ms;
    port.set_pressed(ctx.button_id, false);
}

fn transition_table<P: ButtonPort>() -> [Transition<Ctx, P, State>; 4] {
    [
        Transition {
            from: State::Released,
            guard: is_pressed,
            to: State::PressedWait,
            action: Some(on_press_edge),
        },
        Transition {
            from: State::PressedWait,
            guard: |ctx: &Ctx, _: &P| debounce_elapsed_since_press(ctx),
            to: State::Pressed,
            action: None,
        },
        Transition {
            from: State::Pressed,
            guard: is_released,
            to: State::ReleasedWait,
            action: Some(on_release_edge),
        },
        Transition {
            from: State::ReleasedWait,
            guard: |ctx: &Ctx, _: &P| debounce_elapsed_since_release(ctx),
            to: State::Released,
            action: None,
        },
    ]
}

/// The button FSM. `P` is the board crate's concrete port implementation.
pub struct ButtonFsm<P: ButtonPort> {
    engine: Engine<Ctx, P, State, 4>,
    ctx: Ctx,
}

impl<P: ButtonPort> ButtonFsm<P> {
    pub fn new(button_id: u32, debounce_ms: u32) -> Self {
        Self {
            engine: Engine::new("button", State::Released, transition_table()),
            ctx: Ctx {
                button_id,
                debounce_ms,
                now_ms: 0,
                press_tick: 0,
                release_tick: 0,
                duration_ms: 0,
            },
        }
    }

    /// Advance the FSM by one evaluation of its transition table.
    pub fn fire(&mut self, now_ms: u32, port: &mut P) {
        self.ctx.now_ms = now_ms;
        self.engine.fire(&mut self.ctx, port);
    }

    pub fn state(&self) -> State {
        self.engine.state()
    }

    /// Duration of the most recently classified press. Valid only in
    /// `State::Released`; zero until a clean press→release completes.
    pub fn duration_ms(&self) -> u32 {
        self.ctx.duration_ms
    }

    /// Clear the last classification so it cannot be consumed twice.
    pub fn reset_duration(&mut self) {
        self.ctx.duration_ms = 0;
    }

    /// True whenever the button is anywhere but `Released` — the
    /// activity signal the Urbanite master's sleep guards read.
    pub fn check_activity(&self) -> bool {
        self.engine.state() != State::Released
    }
}
