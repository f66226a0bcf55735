//! Fixed-period host scheduler
//!
//! Drives a [`PeriodicCallbackTarget`] through its lifecycle with compile-time
//! state safety.
//!
//! # State Machine
//!
//! ```text
//! Constructed ──► Initialized ──► Running ──► (shutdown) ──► TickStats
//!               (target.init)
//! ```
//!
//! # Tick
//!
//! ```text
//! teleop_tick (Teleop only) ──► periodic_update ──► simulation_tick (sim only)
//! ```
//!
//! On the tick where the mode switches to `Disabled`, `disabled_init` runs
//! before anything else.
//!
//! Every callback runs under `catch_unwind`. A panicking callback is logged
//! and counted, the rest of the tick and all later ticks still run. A tick
//! that takes longer than the period is counted as a loop overrun. Overrun
//! warnings are logged at most once per stats interval.

use chrono::Local;
use statum::{machine, state};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle hooks a robot program exposes to the scheduler
///
/// The scheduler guarantees `init` runs exactly once, before any of the
/// periodic hooks, and that no two hooks ever run at the same time.
pub trait PeriodicCallbackTarget {
    /// One-time setup after construction
    fn init(&mut self);

    /// Every tick, in every mode
    fn periodic_update(&mut self);

    /// Every tick while the robot is under operator control
    fn teleop_tick(&mut self);

    /// Every tick while running in simulation
    fn simulation_tick(&mut self);

    /// Once when the robot leaves an enabled mode for `Disabled`
    fn disabled_init(&mut self) {}
}

/// Operating mode selected by the driver station side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RobotMode {
    #[default]
    Disabled,
    Teleop,
}

#[derive(Clone, Debug)]
pub struct SchedulerSettings {
    pub period: Duration,
    pub simulation: bool,
    pub stats_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(20),
            simulation: false,
            stats_interval: Duration::from_secs(10),
        }
    }
}

/// Counters reported when the scheduler stops
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub teleop_ticks: u64,
    pub overruns: u64,
    pub faults: u64,
}

#[state]
#[derive(Debug, Clone)]
pub enum SchedulerState {
    Constructed,
    Initialized,
    Running,
}

#[machine]
pub struct HostScheduler<S: SchedulerState> {
    target: Box<dyn PeriodicCallbackTarget>,
    settings: SchedulerSettings,
    mode: watch::Receiver<RobotMode>,
    last_mode: RobotMode,
    stats: TickStats,
    last_overrun_warning: Option<Instant>,
}

impl<S: SchedulerState> HostScheduler<S> {
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}

impl HostScheduler<Constructed> {
    pub fn create(
        target: Box<dyn PeriodicCallbackTarget>,
        settings: SchedulerSettings,
        mode: watch::Receiver<RobotMode>,
    ) -> Self {
        info!("Creating host scheduler with settings: {:?}", settings);
        Self::new(
            target,
            settings,
            mode,
            RobotMode::Disabled,
            TickStats::default(),
            None,
        )
    }

    /// Run `init` on the target and transition to Initialized
    pub fn initialize(mut self) -> HostScheduler<Initialized> {
        info!("Initializing robot program");
        if !run_guarded("init", || self.target.init()) {
            self.stats.faults += 1;
        }
        self.transition()
    }
}

impl HostScheduler<Initialized> {
    pub fn start(self) -> HostScheduler<Running> {
        info!(
            "Starting periodic loop: period {:?}, simulation {}",
            self.settings.period, self.settings.simulation
        );
        self.transition()
    }
}

impl HostScheduler<Running> {
    /// Run one loop iteration
    pub fn tick(&mut self) {
        let started = Instant::now();

        let mode = *self.mode.borrow_and_update();
        if mode != self.last_mode {
            info!("Robot mode changed: {:?} -> {:?}", self.last_mode, mode);
            self.last_mode = mode;
            if mode == RobotMode::Disabled
                && !run_guarded("disabled_init", || self.target.disabled_init())
            {
                self.stats.faults += 1;
            }
        }

        if mode == RobotMode::Teleop {
            self.stats.teleop_ticks += 1;
            if !run_guarded("teleop_tick", || self.target.teleop_tick()) {
                self.stats.faults += 1;
            }
        }

        if !run_guarded("periodic_update", || self.target.periodic_update()) {
            self.stats.faults += 1;
        }

        if self.settings.simulation
            && !run_guarded("simulation_tick", || self.target.simulation_tick())
        {
            self.stats.faults += 1;
        }

        self.stats.ticks += 1;

        let elapsed = started.elapsed();
        if elapsed > self.settings.period {
            self.stats.overruns += 1;
            let quiet = self
                .last_overrun_warning
                .is_some_and(|at| started.duration_since(at) < self.settings.stats_interval);
            if quiet {
                debug!("Loop overrun: {:?} spent this tick", elapsed);
            } else {
                warn!(
                    "Loop time of {:?} overrun ({:?} spent this tick, {} overruns total)",
                    self.settings.period, elapsed, self.stats.overruns
                );
                self.last_overrun_warning = Some(started);
            }
        }
    }

    /// Tick at the configured period until `shutdown` is cancelled
    pub async fn run_until_shutdown(mut self, shutdown: CancellationToken) -> TickStats {
        info!("Starting periodic loop");

        let mut interval = tokio::time::interval(self.settings.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut window_ticks = 0u64;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::from_std(self.settings.stats_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(10));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping periodic loop");
                    break;
                }

                _ = interval.tick() => {
                    self.tick();
                    window_ticks += 1;
                }
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                info!(
                    "Scheduler stats: {} ticks in last {} seconds (avg {:.1}/sec), {} overruns, {} faults total",
                    window_ticks,
                    log_interval.num_seconds(),
                    window_ticks as f64 / log_interval.num_seconds().max(1) as f64,
                    self.stats.overruns,
                    self.stats.faults
                );
                window_ticks = 0;
                last_log_time = now;
            }
        }

        info!("Periodic loop stopped: {:?}", self.stats);
        self.stats
    }
}

// Returns false if the callback panicked
fn run_guarded(name: &str, callback: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => true,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            error!("Unhandled fault in {}: {}", name, message);
            debug!("Continuing with the next callback after fault in {}", name);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        calls: Rc<RefCell<Vec<&'static str>>>,
        panic_in_teleop: bool,
        periodic_delay: Option<Duration>,
    }

    impl PeriodicCallbackTarget for Recorder {
        fn init(&mut self) {
            self.calls.borrow_mut().push("init");
        }

        fn periodic_update(&mut self) {
            self.calls.borrow_mut().push("periodic");
            if let Some(delay) = self.periodic_delay {
                std::thread::sleep(delay);
            }
        }

        fn teleop_tick(&mut self) {
            self.calls.borrow_mut().push("teleop");
            if self.panic_in_teleop {
                panic!("teleop exploded");
            }
        }

        fn simulation_tick(&mut self) {
            self.calls.borrow_mut().push("simulation");
        }

        fn disabled_init(&mut self) {
            self.calls.borrow_mut().push("disabled");
        }
    }

    fn scheduler(
        recorder: Recorder,
        simulation: bool,
        mode: RobotMode,
    ) -> (HostScheduler<Running>, watch::Sender<RobotMode>) {
        let (mode_tx, mode_rx) = watch::channel(mode);
        let settings = SchedulerSettings {
            period: Duration::from_millis(5),
            simulation,
            ..Default::default()
        };
        let scheduler = HostScheduler::create(Box::new(recorder), settings, mode_rx)
            .initialize()
            .start();
        (scheduler, mode_tx)
    }

    #[test]
    fn init_runs_once_before_any_tick() {
        let recorder = Recorder::default();
        let calls = Rc::clone(&recorder.calls);
        let (mut scheduler, _mode) = scheduler(recorder, false, RobotMode::Disabled);

        scheduler.tick();
        scheduler.tick();

        assert_eq!(*calls.borrow(), vec!["init", "periodic", "periodic"]);
    }

    #[test]
    fn teleop_and_simulation_follow_mode_and_flag() {
        let recorder = Recorder::default();
        let calls = Rc::clone(&recorder.calls);
        let (mut scheduler, mode) = scheduler(recorder, true, RobotMode::Disabled);

        scheduler.tick();
        mode.send(RobotMode::Teleop).unwrap();
        scheduler.tick();

        assert_eq!(
            *calls.borrow(),
            vec![
                "init",
                "periodic",
                "simulation",
                "teleop",
                "periodic",
                "simulation"
            ]
        );
        assert_eq!(scheduler.stats().teleop_ticks, 1);
    }

    #[test]
    fn panicking_callback_does_not_stop_the_loop() {
        let recorder = Recorder {
            panic_in_teleop: true,
            ..Default::default()
        };
        let calls = Rc::clone(&recorder.calls);
        let (mut scheduler, _mode) = scheduler(recorder, false, RobotMode::Teleop);

        scheduler.tick();
        scheduler.tick();

        assert_eq!(scheduler.stats().faults, 2);
        assert_eq!(scheduler.stats().ticks, 2);
        assert_eq!(
            *calls.borrow(),
            vec!["init", "teleop", "periodic", "teleop", "periodic"]
        );
    }

    #[test]
    fn disabled_init_runs_once_when_leaving_teleop() {
        let recorder = Recorder::default();
        let calls = Rc::clone(&recorder.calls);
        let (mut scheduler, mode) = scheduler(recorder, false, RobotMode::Teleop);

        scheduler.tick();
        mode.send(RobotMode::Disabled).unwrap();
        scheduler.tick();
        scheduler.tick();

        assert_eq!(
            *calls.borrow(),
            vec!["init", "teleop", "periodic", "disabled", "periodic", "periodic"]
        );
        assert_eq!(scheduler.stats().teleop_ticks, 1);
    }

    #[test]
    fn starting_disabled_skips_disabled_init() {
        let recorder = Recorder::default();
        let calls = Rc::clone(&recorder.calls);
        let (mut scheduler, _mode) = scheduler(recorder, false, RobotMode::Disabled);

        scheduler.tick();

        assert!(!calls.borrow().contains(&"disabled"));
    }

    #[test]
    fn slow_tick_counts_as_overrun() {
        let recorder = Recorder {
            periodic_delay: Some(Duration::from_millis(15)),
            ..Default::default()
        };
        let (mut scheduler, _mode) = scheduler(recorder, false, RobotMode::Disabled);

        scheduler.tick();
        assert_eq!(scheduler.stats().overruns, 1);

        // Still counted while the warning is throttled
        scheduler.tick();
        assert_eq!(scheduler.stats().overruns, 2);
        assert_eq!(scheduler.stats().faults, 0);
    }

    #[tokio::test]
    async fn run_until_shutdown_ticks_until_cancelled() {
        let recorder = Recorder::default();
        let calls = Rc::clone(&recorder.calls);
        let (scheduler, _mode) = scheduler(recorder, false, RobotMode::Teleop);

        let shutdown = CancellationToken::new();
        let stopper = shutdown.clone();
        let (stats, ()) = tokio::join!(scheduler.run_until_shutdown(shutdown), async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            stopper.cancel();
        });

        assert!(stats.ticks > 0);
        assert_eq!(stats.teleop_ticks, stats.ticks);
        assert_eq!(calls.borrow()[0], "init");
        assert_eq!(calls.borrow().iter().filter(|c| **c == "init").count(), 1);
    }
}
