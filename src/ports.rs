//! Port traits — the narrow hardware contract the core FSMs consume.
//!
//! ```text
//!   Board crate (GPIO, EXTI, timers, ISRs) ──▶ Port trait ──▶ FSM core
//! ```
//!
//! Everything on the other side of these traits — pin assignment, EXTI
//! configuration, timer peripheral setup, the sleep/wake primitive — is
//! out of scope for this crate (§1). Each trait mirrors exactly the
//! narrow contract the specification hands the core; no method exists
//! here that the FSMs do not call.
//!
//! ISR contracts (§6) are the *write* side of the mirrored fields these
//! traits expose as getters/setters: an ISR calls the setter from
//! interrupt context, the FSM calls the getter from the main loop. Each
//! hardware-mirror field has exactly one ISR writer; multi-word
//! invariants (e.g. `echo_init_tick` before `echo_end_tick`) are the
//! implementing board crate's responsibility to uphold in the order the
//! specification documents.

use crate::error::Result;

/// RGB triple, each channel 0-255. `0` switches the corresponding PWM
/// channel off; non-zero writes a duty cycle proportional to `channel/255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Monotonic millisecond clock and the CPU sleep primitive. Owned by
/// whichever leaf or master needs wall-clock time; a single
/// implementation backs all FSMs since there is exactly one system tick.
pub trait SystemPort {
    /// Monotonic millisecond counter. Wraps at `u32::MAX`; callers compare
    /// with wrapping subtraction, never raw `>=`/`<`.
    fn now_ms(&self) -> u32;

    /// Wait for interrupt. Returns when any enabled interrupt fires
    /// (button EXTI, trigger/echo/cycle timer IRQs, system tick).
    fn sleep(&mut self);
}

/// Button peripheral contract. One id per physical button; this crate
/// uses exactly one.
pub trait ButtonPort {
    /// Initialise the peripheral for `id`. `Err` is a programmer error —
    /// an id the board crate does not wire up — and is unrecoverable.
    fn init(&mut self, id: u32) -> Result<()>;

    /// True if an unconsumed press edge is pending. Reading this clears
    /// nothing; see [`set_pressed`](Self::set_pressed).
    fn pressed(&self, id: u32) -> bool;

    /// Mark the pending press edge as consumed (mirrors the ISR's "not
    /// pressed" bookkeeping described in the Button FSM transition table).
    fn set_pressed(&mut self, id: u32, value: bool);

    /// Raw line level, debounce notwithstanding.
    fn value(&self, id: u32) -> bool;

    fn interrupt_pending(&self, id: u32) -> bool;
    fn interrupt_clear(&mut self, id: u32);
    fn interrupt_disable(&mut self, id: u32);
}

/// Ultrasound peripheral contract: one trigger GPIO, one echo capture
/// timer (with overflow counting), one one-shot trigger-duration timer,
/// one periodic cycle timer, all addressed by `id`.
pub trait UltrasoundPort {
    fn init(&mut self, id: u32) -> Result<()>;

    /// Raise the trigger line and start the trigger-duration, echo, and
    /// cycle timers for one measurement cycle.
    fn start_measurement(&mut self, id: u32);

    fn start_new_measurement_timer(&mut self, id: u32);
    fn stop_new_measurement_timer(&mut self, id: u32);

    fn stop_echo_timer(&mut self, id: u32);
    fn stop_trigger_timer(&mut self, id: u32);

    /// Halt all timers for `id` and clear captures — used by `stop()`.
    fn stop_ultrasound(&mut self, id: u32);

    /// Rising-edge capture tick (0 = not yet captured this cycle).
    fn echo_init_tick(&self, id: u32) -> u32;
    fn set_echo_init_tick(&mut self, id: u32, tick: u32);

    /// Falling-edge capture tick.
    fn echo_end_tick(&self, id: u32) -> u32;
    fn set_echo_end_tick(&mut self, id: u32, tick: u32);

    /// Capture-timer wraparounds observed between the rising and
    /// falling edges.
    fn echo_overflows(&self, id: u32) -> u32;
    fn set_echo_overflows(&mut self, id: u32, count: u32);

    /// Set once the falling edge has been captured; the single flag the
    /// FSM waits on before computing distance.
    fn echo_received(&self, id: u32) -> bool;
    fn set_echo_received(&mut self, id: u32, value: bool);

    /// Set by the trigger timer's update ISR once the trigger pulse has
    /// been high for the configured duration.
    fn trigger_end(&self, id: u32) -> bool;
    fn set_trigger_end(&mut self, id: u32, value: bool);

    /// Set by the cycle timer's update ISR — time to start a fresh
    /// measurement regardless of whether the previous echo arrived.
    fn trigger_ready(&self, id: u32) -> bool;
    fn set_trigger_ready(&mut self, id: u32, value: bool);

    /// Clear `echo_init_tick`/`echo_end_tick`/`echo_received` ahead of the
    /// next capture window.
    fn reset_echo_ticks(&mut self, id: u32);
}

/// Display peripheral contract: one RGB PWM output addressed by `id`.
pub trait DisplayPort {
    fn init(&mut self, id: u32) -> Result<()>;

    fn set_rgb(&mut self, id: u32, rgb: Rgb);
}
