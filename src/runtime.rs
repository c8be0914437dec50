// 50 Hz drive loop with a command watchdog
//
// If commands stop arriving for longer than CMD_TIMEOUT the drivetrain is stopped until a fresh
// one shows up.

use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{CMD_TIMEOUT, LOOP_HZ, LOOP_PERIOD};
use crate::messages::{DriveCommand, RuntimeHealth};
use crate::swerve::{HeadingSensor, SwerveDrivetrain, SwerveError};

pub struct Runtime {
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            // Stale until the first command
            health: RuntimeHealth::CmdStale,
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn on_command(&mut self, cmd: DriveCommand) {
        debug!("Received command: {:?}", cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Command to apply this tick, or None when the watchdog says stop
    fn active_command(&mut self) -> Option<DriveCommand> {
        let cmd_age = self.cmd_received_at.elapsed();

        match self.latest_cmd {
            Some(cmd) if cmd_age <= CMD_TIMEOUT => {
                if self.health != RuntimeHealth::Ok {
                    info!("Commands resumed");
                }
                self.health = RuntimeHealth::Ok;
                Some(cmd)
            }
            Some(_) => {
                if self.health != RuntimeHealth::CmdStale {
                    warn!("Command stale ({:?} old), stopping drivetrain", cmd_age);
                }
                self.health = RuntimeHealth::CmdStale;
                None
            }
            None => {
                self.health = RuntimeHealth::CmdStale;
                None
            }
        }
    }

    /// One control tick: update odometry, then drive or stop
    pub fn tick<G: HeadingSensor>(
        &mut self,
        drivetrain: &mut SwerveDrivetrain<G>,
    ) -> Result<RuntimeHealth, SwerveError> {
        drivetrain.periodic();
        match self.active_command() {
            Some(cmd) => drivetrain.drive(cmd.x, cmd.y, cmd.rot, cmd.field_relative)?,
            None => drivetrain.stop()?,
        }
        Ok(self.health)
    }
}

/// Drive `drivetrain` from `commands` until every sender is gone, then stop it.
///
/// A failed tick also stops the drivetrain before the error is returned.
///
/// The drivetrain shares its motors through `Rc`, so this future must run on a single-threaded
/// runtime or a `LocalSet`.
pub async fn run<G: HeadingSensor>(
    drivetrain: &mut SwerveDrivetrain<G>,
    mut commands: mpsc::Receiver<DriveCommand>,
    health: watch::Sender<RuntimeHealth>,
) -> Result<(), SwerveError> {
    let mut runtime = Runtime::new();
    let mut ticker = interval(LOOP_PERIOD);

    info!(
        "Drive loop started: {}Hz, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );

    loop {
        ticker.tick().await;

        // Drain pending commands, keep the latest
        let mut disconnected = false;
        loop {
            match commands.try_recv() {
                Ok(cmd) => runtime.on_command(cmd),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        let status = match runtime.tick(drivetrain) {
            Ok(status) => status,
            Err(e) => {
                warn!("Drive tick failed ({}), stopping drivetrain", e);
                if let Err(stop_error) = drivetrain.stop() {
                    warn!("Failed to stop drivetrain: {}", stop_error);
                }
                return Err(e);
            }
        };
        health.send_replace(status);

        if disconnected {
            info!("Command channel closed, stopping drivetrain");
            drivetrain.stop()?;
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::motor::{ControlMode, MotorError};
    use crate::swerve::drivetrain::tests::{build, square_config};

    #[test]
    fn test_stale_before_first_command() {
        let mut rig = build(square_config());
        let mut runtime = Runtime::new();
        assert_eq!(runtime.tick(&mut rig.drivetrain).unwrap(), RuntimeHealth::CmdStale);
        assert!(rig.mocks.iter().all(|m| m.drive.borrow().stopped == 1));
    }

    #[test]
    fn test_fresh_command_drives() {
        let mut rig = build(square_config());
        let mut runtime = Runtime::new();
        runtime.on_command(DriveCommand::new(0.5, 0.0, 0.0, false));

        assert_eq!(runtime.tick(&mut rig.drivetrain).unwrap(), RuntimeHealth::Ok);
        for m in &rig.mocks {
            let (speed, mode) = m.drive.borrow().last_command().unwrap();
            assert_eq!(mode, ControlMode::Velocity);
            assert!((speed - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_watchdog_stops_stale_command() {
        let mut rig = build(square_config());
        let mut runtime = Runtime::new();
        runtime.on_command(DriveCommand::new(1.0, 0.0, 0.0, false));
        runtime.cmd_received_at = Instant::now() - CMD_TIMEOUT - Duration::from_millis(50);

        assert_eq!(runtime.tick(&mut rig.drivetrain).unwrap(), RuntimeHealth::CmdStale);
        assert!(rig.mocks.iter().all(|m| m.drive.borrow().commands.is_empty()));
        assert!(rig.mocks.iter().all(|m| m.drive.borrow().stopped == 1));

        // A new command brings it back
        runtime.on_command(DriveCommand::new(1.0, 0.0, 0.0, false));
        assert_eq!(runtime.tick(&mut rig.drivetrain).unwrap(), RuntimeHealth::Ok);
    }

    #[tokio::test]
    async fn test_run_applies_latest_and_stops_on_close() {
        let mut rig = build(square_config());
        let (tx, rx) = mpsc::channel(8);
        let (health_tx, health_rx) = watch::channel(RuntimeHealth::CmdStale);

        tx.send(DriveCommand::new(0.25, 0.0, 0.0, false)).await.unwrap();
        tx.send(DriveCommand::new(1.0, 0.0, 0.0, false)).await.unwrap();
        drop(tx);

        run(&mut rig.drivetrain, rx, health_tx).await.unwrap();

        assert_eq!(*health_rx.borrow(), RuntimeHealth::Ok);
        for m in &rig.mocks {
            let drive = m.drive.borrow();
            // Only the latest command reaches the motors
            assert_eq!(drive.commands.len(), 1);
            assert!((drive.commands[0].0 - 4.0).abs() < 1e-9);
            assert_eq!(drive.stopped, 1);
        }
    }

    #[tokio::test]
    async fn test_run_stops_everything_when_a_command_fails() {
        let mut rig = build(square_config());
        rig.mocks[2].drive.borrow_mut().reject_commands = true;
        let (tx, rx) = mpsc::channel(8);
        let (health_tx, _health_rx) = watch::channel(RuntimeHealth::CmdStale);

        tx.send(DriveCommand::new(1.0, 0.0, 0.0, false)).await.unwrap();

        let result = run(&mut rig.drivetrain, rx, health_tx).await;
        assert!(matches!(
            result,
            Err(SwerveError::Motor(MotorError::Device { .. }))
        ));

        // Modules that took the new setpoint are stopped along with the rest
        assert_eq!(rig.mocks[0].drive.borrow().commands.len(), 1);
        for m in &rig.mocks {
            assert_eq!(m.drive.borrow().stopped, 1);
            assert_eq!(m.steer.borrow().stopped, 1);
        }
        drop(tx);
    }
}
