//! # Controller runner
//!
//! Runs trajectory control in its own thread at a fixed period. On each cycle the runner takes the
//! newest local path from the path channel, handles any pending signals, applies the path, observes
//! the vehicle, computes the command and sends it to the vehicle.
//!
//! Signals are handled after the path is taken. A reset sent before a path was published is
//! therefore always applied before that path, never after it. A path taken before the channel was
//! cleared belongs to the previous plan and is dropped.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::TrajCtrl;
use crate::{
    iface::{CollabError, ControllerReset, VehicleInterface},
    path::Path,
    path_channel::PathReceiver,
};
use util::archive::Archived;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct CtrlRunner {
    ctrl: TrajCtrl,
    path_rx: PathReceiver,
    signal_rx: Receiver<CtrlSignal>,
    vehicle: Box<dyn VehicleInterface + Send>,
    period: Duration,

    /// Number of cycles executed
    pub num_cycles: u64,

    /// Number of cycles which took longer than the period
    pub num_overruns: u64,
}

/// Handle used by other threads to signal the runner.
#[derive(Clone)]
pub struct ResetHandle {
    tx: Sender<CtrlSignal>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CtrlSignal {
    /// Reset the controller's path, goal and warm start
    Reset,

    /// Stop the runner at the end of the current cycle
    Stop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CtrlRunner {
    /// Create a new runner and the handle used to signal it.
    pub fn new(
        ctrl: TrajCtrl,
        path_rx: PathReceiver,
        vehicle: Box<dyn VehicleInterface + Send>,
        period_s: f64,
    ) -> (Self, ResetHandle) {
        let (tx, signal_rx) = channel();

        (
            Self {
                ctrl,
                path_rx,
                signal_rx,
                vehicle,
                period: Duration::from_secs_f64(period_s),
                num_cycles: 0,
                num_overruns: 0,
            },
            ResetHandle { tx },
        )
    }

    /// Execute one control cycle.
    ///
    /// Returns false if the runner has been asked to stop, or if every handle has been dropped.
    pub fn step(&mut self) -> bool {
        let taken = self.path_rx.latest_with_epoch();

        if !self.handle_signals() {
            return false;
        }

        self.apply_path(taken);

        if let (Some(v), Some(o)) = (self.vehicle.velocity(), self.vehicle.odometry()) {
            self.ctrl.observe(&v, &o);
        }

        let cmd = self.ctrl.control();
        self.vehicle.send_command(&cmd);

        if let Err(e) = self.ctrl.write() {
            warn!("Could not write TrajCtrl archives: {}", e);
        }

        self.num_cycles += 1;

        true
    }

    /// Run cycles at the fixed period until stopped, returning the controller.
    pub fn run(mut self) -> TrajCtrl {
        info!("Trajectory control running at {:.1} Hz", 1.0 / self.period.as_secs_f64());

        loop {
            let cycle_start_instant = Instant::now();

            if !self.step() {
                break;
            }

            let cycle_dur = Instant::now() - cycle_start_instant;

            match self.period.checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => {
                    warn!(
                        "TrajCtrl cycle overran by {:.06} s",
                        cycle_dur.as_secs_f64() - self.period.as_secs_f64()
                    );
                    self.num_overruns += 1;
                }
            }
        }

        info!(
            "Trajectory control stopped after {} cycles ({} overruns)",
            self.num_cycles, self.num_overruns
        );

        self.ctrl
    }

    pub fn ctrl(&self) -> &TrajCtrl {
        &self.ctrl
    }

    /// Handle every pending signal, returning false if the runner should stop.
    fn handle_signals(&mut self) -> bool {
        loop {
            match self.signal_rx.try_recv() {
                Ok(CtrlSignal::Reset) => self.ctrl.reset(),
                Ok(CtrlSignal::Stop) | Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => return true,
            }
        }
    }

    /// Pass a taken path to the controller unless the channel has been cleared since.
    fn apply_path(&mut self, taken: Option<(Path, u64)>) {
        if let Some((path, epoch)) = taken {
            if epoch == self.path_rx.epoch() {
                self.ctrl.on_path_received(path);
            } else {
                debug!("Dropping a path published before the last plan change");
            }
        }
    }
}

impl ResetHandle {
    /// Ask the runner to stop.
    pub fn stop(&self) -> Result<(), CollabError> {
        self.tx
            .send(CtrlSignal::Stop)
            .map_err(|_| CollabError::ControllerUnreachable)
    }
}

impl ControllerReset for ResetHandle {
    fn reset(&self) -> Result<(), CollabError> {
        self.tx
            .send(CtrlSignal::Reset)
            .map_err(|_| CollabError::ControllerUnreachable)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{path_channel::path_channel, traj_ctrl::TrajCtrlMode};
    use comms_if::eqpt::vehicle::{ControlCommand, Odometry, VelocityReading};
    use nalgebra::Vector2;
    use std::sync::{Arc, Mutex};

    /// Vehicle which stays put and records the commands it receives.
    struct StillVehicle {
        cmds: Arc<Mutex<Vec<ControlCommand>>>,
    }

    impl VehicleInterface for StillVehicle {
        fn velocity(&mut self) -> Option<VelocityReading> {
            Some(VelocityReading::default())
        }

        fn odometry(&mut self) -> Option<Odometry> {
            Some(Odometry::default())
        }

        fn send_command(&mut self, cmd: &ControlCommand) {
            self.cmds.lock().unwrap().push(*cmd);
        }
    }

    fn runner() -> (CtrlRunner, ResetHandle, crate::path_channel::PathSender, Arc<Mutex<Vec<ControlCommand>>>) {
        let (tx, rx) = path_channel();
        let cmds = Arc::new(Mutex::new(Vec::new()));
        let (runner, handle) = CtrlRunner::new(
            TrajCtrl::default(),
            rx,
            Box::new(StillVehicle { cmds: cmds.clone() }),
            0.01,
        );

        (runner, handle, tx, cmds)
    }

    #[test]
    fn test_step_tracks_published_path() {
        let (mut runner, _handle, tx, cmds) = runner();

        tx.publish(Path::direct(Vector2::new(0.0, 0.0), Vector2::new(5.0, 0.0), 0.25));
        assert!(runner.step());

        assert_eq!(runner.ctrl().mode(), TrajCtrlMode::Tracking);
        assert_eq!(cmds.lock().unwrap().len(), 1);
        assert!(cmds.lock().unwrap()[0].accel_mss > 0.0);
    }

    #[test]
    fn test_reset_signal() {
        let (mut runner, handle, tx, cmds) = runner();

        tx.publish(Path::direct(Vector2::new(0.0, 0.0), Vector2::new(5.0, 0.0), 0.25));
        assert!(runner.step());

        handle.reset().unwrap();
        assert!(runner.step());

        assert_eq!(runner.ctrl().mode(), TrajCtrlMode::Idle);
        assert_eq!(*cmds.lock().unwrap().last().unwrap(), ControlCommand::neutral());
    }

    #[test]
    fn test_reset_before_new_path_is_not_reapplied() {
        let (mut runner, handle, tx, _cmds) = runner();

        tx.publish(Path::direct(Vector2::new(0.0, 0.0), Vector2::new(5.0, 0.0), 0.25));
        assert!(runner.step());

        // Plan change: clear, reset, then the first path of the new plan
        let new_path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(0.0, 3.0), 0.25);
        tx.clear();
        handle.reset().unwrap();
        tx.publish(new_path.clone());

        assert!(runner.step());
        assert_eq!(runner.ctrl().mode(), TrajCtrlMode::Tracking);

        // No stale reset left to wipe the new path
        assert!(runner.step());
        assert_eq!(runner.ctrl().mode(), TrajCtrlMode::Tracking);
        assert_eq!(runner.ctrl().goal().unwrap().position_m, Vector2::new(0.0, 3.0));
    }

    #[test]
    fn test_path_taken_before_clear_is_dropped() {
        let (mut runner, handle, tx, _cmds) = runner();

        tx.publish(Path::direct(Vector2::new(0.0, 0.0), Vector2::new(5.0, 0.0), 0.25));
        let taken = runner.path_rx.latest_with_epoch();

        // The plan changes while the cycle holds the old path
        tx.clear();
        handle.reset().unwrap();

        assert!(runner.handle_signals());
        runner.apply_path(taken);

        assert_eq!(runner.ctrl().mode(), TrajCtrlMode::Idle);
        assert!(runner.ctrl().goal().is_none());
    }

    #[test]
    fn test_stop() {
        let (runner, handle, _tx, cmds) = runner();

        let jh = thread::spawn(move || runner.run());
        thread::sleep(Duration::from_millis(50));
        handle.stop().unwrap();

        let ctrl = jh.join().unwrap();
        assert_eq!(ctrl.mode(), TrajCtrlMode::Uninitialised);
        assert!(!cmds.lock().unwrap().is_empty());

        // Runner has gone so resets can no longer be delivered
        assert!(handle.reset().is_err());
    }
}
