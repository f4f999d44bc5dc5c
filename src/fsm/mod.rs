//! Generic transition-table finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust: a fixed, ordered table of
//! `(from_state, guard, to_state, action)` rows, scanned top-to-bottom on
//! every [`Engine::fire`]. The first row whose `from` matches the current
//! state and whose `guard` returns `true` wins; its `action` (if any) runs,
//! then `current` becomes `to`. Table order is the documented
//! conflict-resolution rule — put more specific rows first.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Table<Ctx, S>                                              │
//! │  ┌───────┬────────────┬───────┬────────────────────────┐    │
//! │  │ from  │ guard      │ to    │ action                  │    │
//! │  ├───────┼────────────┼───────┼────────────────────────┤    │
//! │  │ S::A  │ fn(&Ctx)   │ S::B  │ Option<fn(&mut Ctx)>    │    │
//! │  │ S::B  │ fn(&Ctx)   │ S::A  │ None                    │    │
//! │  └───────┴────────────┴───────┴────────────────────────┘    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! One [`Engine`] is instantiated per concrete FSM (button, ultrasound,
//! display, the Urbanite master), each with its own state enum and context
//! type — no up-casting, no `dyn`, no heap. `Ctx` is state private to the
//! FSM instance (persists across calls); `Env` is the externally-owned
//! collaborator passed in by reference at each `fire` (the port layer for
//! the three leaves, the three leaves themselves for the Urbanite master).
//! Guards read `(&Ctx, &Env)`; actions mutate `(&mut Ctx, &mut Env)`.
//! Guards MUST be idempotent and free of side effects beyond reading
//! `Env`'s query methods.

pub mod button;
pub mod display;
pub mod ultrasound;
pub mod urbanite;

use log::debug;

/// A single transition-table row.
pub struct Transition<Ctx, Env, S> {
    pub from: S,
    pub guard: fn(&Ctx, &Env) -> bool,
    pub to: S,
    pub action: Option<fn(&mut Ctx, &mut Env)>,
}

/// The generic engine: current state plus an immutable transition table.
///
/// `fire` is the only mutator. `N` is the table length, fixed at
/// construction — tables live in arrays built by each concrete FSM's
/// `transition_table()` constructor, so there is no heap allocation.
pub struct Engine<Ctx, Env, S, const N: usize> {
    current: S,
    table: [Transition<Ctx, Env, S>; N],
    name: &'static str,
}

impl<Ctx, Env, S, const N: usize> Engine<Ctx, Env, S, N>
where
    S: Copy + PartialEq + core::fmt::Debug,
{
    /// Construct an engine starting in `initial`, with the given table.
    pub fn new(name: &'static str, initial: S, table: [Transition<Ctx, Env, S>; N]) -> Self {
        Self {
            current: initial,
            table,
            name,
        }
    }

    /// The FSM's current state.
    pub fn state(&self) -> S {
        self.current
    }

    /// Advance the FSM by one evaluation of its transition table.
    ///
    /// Scans top-to-bottom; the first row with `from == current` and a
    /// guard that evaluates `true` fires. At most one transition happens
    /// per call — `fire` does not chain.
    pub fn fire(&mut self, ctx: &mut Ctx, env: &mut Env) {
        for row in &self.table {
            if row.from == self.current && (row.guard)(ctx, env) {
                if let Some(action) = row.action {
                    action(ctx, env);
                }
                if row.to != self.current {
                    debug!("{}: {:?} -> {:?}", self.name, self.current, row.to);
                }
                self.current = row.to;
                return;
            }
        }
    }

    /// Force the FSM into `state` without running any table row.
    ///
    /// Used only by the master FSM, which needs to reset a leaf's state
    /// without passing through its own transition table (e.g. restarting
    /// the ultrasound leaf when leaving `EMERGENCY`).
    pub fn force_state(&mut self, state: S) {
        self.current = state;
    }
}
