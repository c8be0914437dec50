use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use swerve_drivetrain::config::DriveTrainConfig;
use swerve_drivetrain::geometry::Rotation2d;
use swerve_drivetrain::messages::ModuleReport;
use swerve_drivetrain::swerve::SwerveKinematics;
use swerve_drivetrain::swerve::drivetrain::{command_speeds, module_setpoints};

/// Print the module setpoints a drive command would produce
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Drivetrain config (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Forward, -1 to 1
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    x: f64,

    /// Left, -1 to 1
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    y: f64,

    /// Counter-clockwise, -1 to 1
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    rot: f64,

    #[arg(long)]
    field_relative: bool,

    /// Raw gyro reading in degrees
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    heading: f64,
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = DriveTrainConfig::load(&args.config)?;
    let kinematics = SwerveKinematics::new(config.wheel_locations.translations())?;

    let heading = Rotation2d::from_degrees(config.corrected_heading(args.heading));
    let speeds = command_speeds(&config, heading, args.x, args.y, args.rot, args.field_relative);
    info!(
        "Chassis speeds: vx {:.3} m/s, vy {:.3} m/s, omega {:.3} rad/s",
        speeds.vx, speeds.vy, speeds.omega
    );

    let states = module_setpoints(&config, &kinematics, speeds);
    let reports = ModuleReport::from_states(&states);
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn main() {
    // Setup logging (set RUST_LOG=debug for more)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
