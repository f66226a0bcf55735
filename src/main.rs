use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tagbot::config::{default_config_path, RobotConfig};
use tagbot::controller::{GamepadInput, ScriptedInput};
use tagbot::robot::Robot;
use tagbot::scheduler::{HostScheduler, PeriodicCallbackTarget, RobotMode, SchedulerSettings};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tagbot")]
#[command(about = "Differential drive robot with AprilTag aim assist", long_about = None)]
#[command(version)]
struct Cli {
    /// Run against the simulated drivetrain and camera
    #[arg(long)]
    sim: bool,

    /// Config file, created with defaults if missing
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stay disabled instead of entering teleop after init
    #[arg(long)]
    disabled: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    info!("Loading configuration from {}", config_path.display());
    let config = RobotConfig::load_or_create(&config_path)
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))?;

    let target = build_robot(&config, cli.sim)?;

    let settings = SchedulerSettings {
        period: Duration::from_millis(config.scheduler.period_ms),
        simulation: cli.sim,
        stats_interval: Duration::from_secs(config.scheduler.stats_interval_s),
    };

    let (mode_tx, mode_rx) = watch::channel(RobotMode::Disabled);
    let scheduler = HostScheduler::create(target, settings, mode_rx)
        .initialize()
        .start();

    if !cli.disabled {
        info!("Enabling teleop");
        mode_tx
            .send(RobotMode::Teleop)
            .map_err(|e| eyre!("Failed to switch robot mode: {}", e))?;
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        signal_token.cancel();
    });

    let stats = scheduler.run_until_shutdown(shutdown).await;
    info!(
        "Robot stopped after {} ticks ({} overruns, {} faults)",
        stats.ticks, stats.overruns, stats.faults
    );
    Ok(())
}

fn build_robot(config: &RobotConfig, sim: bool) -> Result<Box<dyn PeriodicCallbackTarget>> {
    if !sim {
        let robot = Robot::<GamepadInput>::unconnected(config.clone())
            .map_err(|e| eyre!("Failed to open controller: {}", e))?;
        return Ok(Box::new(robot));
    }

    match Robot::<GamepadInput>::simulated(config.clone()) {
        Ok(robot) => Ok(Box::new(robot)),
        Err(e) => {
            warn!(
                "No gamepad backend ({}), simulating with a neutral controller",
                e
            );
            Ok(Box::new(Robot::<ScriptedInput>::simulated(config.clone())?))
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
