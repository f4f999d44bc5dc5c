//! Display FSM and distance→colour interpolation.
//!
//! ```text
//!  WAIT_DISPLAY ──[enabled]──▶ SET_DISPLAY ──[!enabled]──▶ WAIT_DISPLAY
//!                                   │  ▲
//!                                   └──┘ [new_colour]
//! ```
//!
//! | Range (cm)  | Start      | End        |
//! |-------------|------------|------------|
//! | \[0, 25\]   | RED        | YELLOW     |
//! | (25, 50\]   | YELLOW     | GREEN      |
//! | (50, 150\]  | GREEN      | TURQUOISE  |
//! | (150, 175\] | TURQUOISE  | BLUE       |
//! | (175, 200\] | BLUE       | (solid)    |
//! | otherwise   | OFF        | —          |
//!
//! `t` interpolates linearly across each range into `[0, 255]`; each
//! output channel is `((255-t)*c1 + t*c2) / 255`.

use crate::fsm::{Engine, Transition};
use crate::ports::{DisplayPort, Rgb};

/// Display FSM states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    WaitDisplay,
    SetDisplay,
}

const RED: Rgb = Rgb::new(255, 0, 0);
const YELLOW: Rgb = Rgb::new(255, 255, 0);
const GREEN: Rgb = Rgb::new(0, 255, 0);
const TURQUOISE: Rgb = Rgb::new(64, 224, 208);
const BLUE: Rgb = Rgb::new(0, 0, 255);

fn lerp_channel(c1: u8, c2: u8, t: u32) -> u8 {
    (((255 - t) * c1 as u32 + t * c2 as u32) / 255) as u8
}

fn lerp(c1: Rgb, c2: Rgb, t: u32) -> Rgb {
    Rgb::new(
        lerp_channel(c1.r, c2.r, t),
        lerp_channel(c1.g, c2.g, t),
        lerp_channel(c1.b, c2.b, t),
    )
}

/// `t ∈ [0, 255]`, the linear position of `d` within `(lo, hi]`.
fn t_for(d: i32, lo: i32, hi: i32) -> u32 {
    (((d - lo) as i64 * 255) / (hi - lo) as i64) as u32
}

/// Map a distance in centimetres to the rendered colour. Negative values
/// (the `distance_cm == -1` "unset" sentinel) and anything past 200cm
/// render `Rgb::OFF`.
pub fn colour_for_distance(d: i32) -> Rgb {
    match d {
        0..=25 => lerp(RED, YELLOW, t_for(d, 0, 25)),
        26..=50 => lerp(YELLOW, GREEN, t_for(d, 25, 50)),
        51..=150 => lerp(GREEN, TURQUOISE, t_for(d, 50, 150)),
        151..=175 => lerp(TURQUOISE, BLUE, t_for(d, 150, 175)),
        176..=200 => BLUE,
        _ => Rgb::OFF,
    }
}

/// Persistent state private to one display FSM instance.
pub struct Ctx {
    pub display_id: u32,
    pub enabled: bool,
    distance_cm: i32,
    new_colour: bool,
    idle: bool,
}

fn enabled<P: DisplayPort>(ctx: &Ctx, _port: &P) -> bool {
    ctx.enabled
}

fn disabled<P: DisplayPort>(ctx: &Ctx, _port: &P) -> bool {
    !ctx.enabled
}

fn has_new_colour<P: DisplayPort>(ctx: &Ctx, _port: &P) -> bool {
    ctx.new_colour
}

fn render_off<P: DisplayPort>(ctx: &mut Ctx, port: &mut P) {
    port.set_rgb(ctx.display_id, Rgb::OFF);
}

fn render_off_and_unidle<P: DisplayPort>(ctx: &mut Ctx, port: &mut P) {
    port.set_rgb(ctx.display_id, Rgb::OFF);
    ctx.idle = false;
}

fn render_colour<P: DisplayPort>(ctx: &mut Ctx, port: &mut P) {
    port.set_rgb(ctx.display_id, colour_for_distance(ctx.distance_cm));
    ctx.new_colour = false;
    ctx.idle = true;
}

fn transition_table<P: DisplayPort>() -> [Transition<Ctx, P, State>; 3] {
    [
        Transition {
            from: State::WaitDisplay,
            guard: enabled,
            to: State::SetDisplay,
            action: Some(render_off),
        },
        Transition {
            from: State::SetDisplay,
            guard: has_new_colour,
            to: State::SetDisplay,
            action: Some(render_colour),
        },
        Transition {
            from: State::SetDisplay,
            guard: disabled,
            to: State::WaitDisplay,
            action: Some(render_off_and_unidle),
        },
    ]
}

/// The display FSM. `P` is the board crate's concrete port implementation.
pub struct DisplayFsm<P: DisplayPort> {
    engine: Engine<Ctx, P, State, 3>,
    ctx: Ctx,
}

impl<P: DisplayPort> DisplayFsm<P> {
    pub fn new(display_id: u32) -> Self {
        Self {
            engine: Engine::new("display", State::WaitDisplay, transition_table()),
            ctx: Ctx {
                display_id,
                enabled: false,
                distance_cm: -1,
                new_colour: false,
                idle: false,
            },
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.ctx.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.ctx.enabled
    }

    /// Forward a new distance sample for rendering on the next `fire`.
    pub fn push_distance(&mut self, distance_cm: i32) {
        self.ctx.distance_cm = distance_cm;
        self.ctx.new_colour = true;
    }

    pub fn fire(&mut self, port: &mut P) {
        self.engine.fire(&mut self.ctx, port);
    }

    pub fn state(&self) -> State {
        self.engine.state()
    }

    /// True once enabled and settled onto a rendered colour. Used by the
    /// Urbanite master's activity gate (§9's open question: ultrasound
    /// liveness is never part of that predicate).
    pub fn is_active_non_idle(&self) -> bool {
        self.ctx.enabled && !self.ctx.idle
    }
}
