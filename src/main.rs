//! Urbanite demo binary — drives the master FSM against the host
//! simulated port so the whole stack (button debounce, ultrasound
//! trigger/echo/median, distance→colour display, press classification)
//! can be exercised without a board.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     UrbaniteFsm (master)                 │
//! │   ┌────────────┐  ┌──────────────┐  ┌─────────────────┐  │
//! │   │ ButtonFsm  │  │ UltrasoundFsm│  │   DisplayFsm     │  │
//! │   └────────────┘  └──────────────┘  └─────────────────┘  │
//! │                         SimPort                          │
//! └──────────────────────────────────────────────────────────┘
//! ```

use anyhow::{ensure, Result};
use log::info;

use urbanite::config::SystemConfig;
use urbanite::fsm::urbanite::UrbaniteFsm;
use urbanite::ports::ButtonPort;
use urbanite::sim::SimPort;

const BUTTON_ID: u32 = 0;
const ULTRASOUND_ID: u32 = 0;
const DISPLAY_ID: u32 = 0;

fn main() -> Result<()> {
    env_logger::init();

    let config = SystemConfig::default();
    ensure!(config.validate(), "threshold ordering invariant violated");

    info!("urbanite demo: cold start, press the button for 1.2s to arm");

    let port = SimPort::new(config.trigger_high_us, config.measurement_period_ms)
        .with_configured_ids(&[BUTTON_ID, ULTRASOUND_ID, DISPLAY_ID]);
    let mut fsm = match UrbaniteFsm::new(config, BUTTON_ID, ULTRASOUND_ID, DISPLAY_ID, port) {
        Ok(fsm) => fsm,
        Err(e) => {
            // Peripheral init failure is critical — log and halt.
            log::error!("port init failed: {e} — halting");
            #[allow(clippy::empty_loop)]
            loop {}
        }
    };

    // Scripted scenario standing in for real button/echo hardware: arm
    // the system, let it settle on a 17cm obstacle, then release.
    press_for(&mut fsm, config.on_off_ms + 200, config.debounce_ms);
    info!("state = {:?}", fsm.state());

    fsm.ports_mut().set_echo_latency_ticks(ULTRASOUND_ID, Some(991));
    // A handful of extra cycles beyond one median window (5 samples):
    // the first couple of cycles after arming still drain stale
    // WaitEchoStart/TriggerStart churn from before the echo was wired up.
    for _ in 0..40 {
        fsm.ports_mut().advance_ms(config.measurement_period_ms);
        fsm.fire();
    }
    info!(
        "state = {:?}, last distance = {:?}cm",
        fsm.state(),
        fsm.last_distance_cm()
    );

    Ok(())
}

/// Drive a `duration_ms` press through the simulated button line,
/// advancing the clock in 1ms steps and firing the master each step.
fn press_for(fsm: &mut UrbaniteFsm<SimPort>, duration_ms: u32, debounce_ms: u32) {
    fsm.ports_mut().set_pressed(BUTTON_ID, true);
    fsm.fire();
    // The press-edge action consumes and clears `pressed`; re-assert it
    // every tick the button stays physically held, as a real ISR would.
    for _ in 0..duration_ms {
        fsm.ports_mut().set_pressed(BUTTON_ID, true);
        fsm.ports_mut().advance_ms(1);
        fsm.fire();
    }
    fsm.ports_mut().set_pressed(BUTTON_ID, false);
    for _ in 0..(debounce_ms + 2) {
        fsm.ports_mut().advance_ms(1);
        fsm.fire();
    }
}
