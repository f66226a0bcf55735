use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tagbot::config::RobotConfig;
use tagbot::controller::{InputDevice, ScriptedInput, StickAxis};
use tagbot::drivetrain::DriveCommand;
use tagbot::robot::Robot;
use tagbot::scheduler::{HostScheduler, PeriodicCallbackTarget, RobotMode, SchedulerSettings};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

fn robot() -> Robot<ScriptedInput> {
    Robot::simulated(RobotConfig::default()).unwrap()
}

#[test]
fn port_zero_scenario() {
    let mut robot = robot();
    assert_eq!(robot.controller().port(), 0);

    robot.init();
    assert!(robot.is_initialized());

    robot.teleop_tick();
    let command = robot.drivetrain().last_command().unwrap();
    assert!(command.is_stop());
    assert_eq!(command, DriveCommand::STOP);

    // Forward on the stick is negative Y
    robot.controller_mut().set_axis(StickAxis::LeftY, -1.0);
    robot.teleop_tick();
    let command = robot.drivetrain().last_command().unwrap();
    assert!(command.forward_mps > 0.0);
    assert_eq!(command.forward_mps, RobotConfig::default().drive.max_speed_mps);
}

#[test]
fn same_input_gives_same_command() {
    let mut robot = robot();
    robot.init();
    robot.controller_mut().set_axis(StickAxis::LeftY, -0.4);
    robot.controller_mut().set_axis(StickAxis::RightX, 0.25);

    robot.teleop_tick();
    let first = robot.drivetrain().last_command();
    let first_speeds = robot.drivetrain().last_wheel_speeds();
    robot.teleop_tick();

    assert_eq!(robot.drivetrain().last_command(), first);
    assert_eq!(robot.drivetrain().last_wheel_speeds(), first_speeds);
}

#[test]
fn driving_forward_in_simulation_moves_the_estimate() {
    let mut robot = robot();
    robot.init();
    robot.controller_mut().set_axis(StickAxis::LeftY, -0.5);

    for _ in 0..50 {
        robot.teleop_tick();
        robot.periodic_update();
        robot.simulation_tick();
    }

    let estimate = robot.drivetrain().pose();
    let truth = robot.simulation().unwrap().pose();
    assert!(estimate.x_m > 0.5);
    assert!(estimate.distance_to(truth.x_m, truth.y_m) < 0.1);
}

#[tokio::test]
async fn scheduler_runs_robot_until_shutdown() {
    let (mode_tx, mode_rx) = watch::channel(RobotMode::Teleop);
    let settings = SchedulerSettings {
        period: Duration::from_millis(5),
        simulation: true,
        ..Default::default()
    };
    let scheduler = HostScheduler::create(Box::new(robot()), settings, mode_rx)
        .initialize()
        .start();

    let shutdown = CancellationToken::new();
    let stopper = shutdown.clone();
    let (stats, ()) = tokio::join!(scheduler.run_until_shutdown(shutdown), async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.cancel();
    });

    assert!(stats.ticks > 0);
    assert_eq!(stats.faults, 0);
    drop(mode_tx);
}

struct Shared(Rc<RefCell<Robot<ScriptedInput>>>);

impl PeriodicCallbackTarget for Shared {
    fn init(&mut self) {
        self.0.borrow_mut().init();
    }

    fn periodic_update(&mut self) {
        self.0.borrow_mut().periodic_update();
    }

    fn teleop_tick(&mut self) {
        self.0.borrow_mut().teleop_tick();
    }

    fn simulation_tick(&mut self) {
        self.0.borrow_mut().simulation_tick();
    }

    fn disabled_init(&mut self) {
        self.0.borrow_mut().disabled_init();
    }
}

#[test]
fn switching_to_disabled_stops_the_robot() {
    let robot = Rc::new(RefCell::new(robot()));
    robot
        .borrow_mut()
        .controller_mut()
        .set_axis(StickAxis::LeftY, -1.0);

    let (mode_tx, mode_rx) = watch::channel(RobotMode::Teleop);
    let settings = SchedulerSettings {
        simulation: true,
        ..Default::default()
    };
    let target = Box::new(Shared(Rc::clone(&robot)));
    let mut scheduler = HostScheduler::create(target, settings, mode_rx)
        .initialize()
        .start();

    for _ in 0..10 {
        scheduler.tick();
    }
    let moving = robot.borrow().simulation().unwrap().pose();
    assert!(moving.x_m > 0.1);

    mode_tx.send(RobotMode::Disabled).unwrap();
    for _ in 0..50 {
        scheduler.tick();
    }
    let coasted = robot.borrow().simulation().unwrap().pose();
    for _ in 0..50 {
        scheduler.tick();
    }
    let stopped = robot.borrow().simulation().unwrap().pose();

    assert_eq!(
        robot.borrow().drivetrain().last_command(),
        Some(DriveCommand::STOP)
    );
    // Stick is still held forward, but teleop no longer runs
    assert!(stopped.distance_to(coasted.x_m, coasted.y_m) < 1e-3);
    assert!(coasted.x_m < moving.x_m + 1.0);
    assert_eq!(scheduler.stats().teleop_ticks, 10);
    assert_eq!(scheduler.stats().faults, 0);
}
