//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::vehicle::{ControlCommand, Odometry, VelocityReading};
use log::{debug, trace, warn};
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::{
    problem::MpcProblem,
    solver::{Solver, SolverError},
    Params,
};
use crate::{
    loc::{Pose2D, VehicleState},
    path::{Path, PathSegment},
};
use util::{
    archive::{archive_time_s, Archived, Archiver},
    maths::{get_ang_dist, rate_limit},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed below which the neutral command stops braking.
const STOPPED_SPEED_MS: f64 = 1e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct TrajCtrl {
    params: Params,

    solver: Solver,

    /// Executing mode
    mode: TrajCtrlMode,

    /// Latest state estimate, `None` until the first observation
    state: Option<VehicleState>,

    /// The command issued by the last call to `control`, folded into the state on the next
    /// observation
    last_cmd: ControlCommand,

    /// True once a path (or a reset) has been received
    path_received: bool,

    /// Number of points in the last received path, before resizing
    received_len: usize,

    /// The tracked reference, resized to the path capacity
    reference: Path,

    /// Non-degenerate segments of the reference
    segments: Vec<PathSegment>,

    goal: Option<Pose2D>,

    /// Previous solution shifted by one step
    warm_start: Option<Vec<f64>>,

    report: StatusReport,
    arch_report: Archiver,
}

/// Input data to trajectory control.
#[derive(Default)]
pub struct InputData {
    pub velocity: Option<VelocityReading>,

    pub odometry: Option<Odometry>,

    /// A new local path, or `None` if no path arrived this cycle
    pub path: Option<Path>,
}

/// The status report containing various error flags and monitoring quantities.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    pub mode: TrajCtrlMode,

    /// The lateral error to the nearest path segment
    pub lat_error_m: f64,

    /// The heading error to the nearest path segment
    pub head_error_rad: f64,

    /// Final cost of the solve
    pub cost: f64,

    /// Number of solver iterations
    pub iterations: usize,

    /// If true the solver failed and the neutral command was issued
    pub solver_failed: bool,

    pub steer_rate_limited: bool,
    pub accel_rate_limited: bool,
}

#[derive(Serialize)]
struct ArchRecord {
    time_s: f64,
    mode: TrajCtrlMode,
    steering_rad: f64,
    accel_mss: f64,
    lat_error_m: f64,
    head_error_rad: f64,
    cost: f64,
    iterations: usize,
    solver_failed: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(#[from] params::LoadError),

    #[error("Could not initialise the archives: {0}")]
    ArchiveInitError(String),
}

/// The possible modes of execution of TrajCtrl.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub enum TrajCtrlMode {
    /// Waiting for the first observation and the first path
    Uninitialised,

    /// Following a path of at least two points
    Tracking,

    /// No usable path, the neutral command is issued
    Idle,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrajCtrlMode {
    fn default() -> Self {
        TrajCtrlMode::Uninitialised
    }
}

impl Default for TrajCtrl {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl TrajCtrl {
    pub fn new(params: Params) -> Self {
        Self {
            solver: Solver::new(params.solver),
            params,
            mode: TrajCtrlMode::Uninitialised,
            state: None,
            last_cmd: ControlCommand::neutral(),
            path_received: false,
            received_len: 0,
            reference: Path::new_empty(),
            segments: Vec::new(),
            goal: None,
            warm_start: None,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
        }
    }

    /// Update the state estimate from the latest vehicle readings.
    pub fn observe(&mut self, velocity: &VelocityReading, odometry: &Odometry) {
        self.state = Some(VehicleState::from_readings(velocity, odometry, &self.last_cmd));
        self.refresh_mode();
    }

    /// Replace the tracked reference with a newly received path.
    pub fn on_path_received(&mut self, path: Path) {
        if path.get_num_points() != self.received_len {
            self.warm_start = None;
        }

        self.received_len = path.get_num_points();
        self.goal = path.terminal_pose();
        self.reference = path.resized(self.params.path_capacity);
        self.segments = (1..self.reference.get_num_points())
            .filter_map(|i| self.reference.get_segment_to_target(i))
            .filter(|s| s.length_m > 0.0)
            .collect();
        self.path_received = true;

        debug!(
            "TrajCtrl received a path of {} points ({} segments)",
            self.received_len,
            self.segments.len()
        );

        self.refresh_mode();
    }

    /// Compute the command for this cycle.
    pub fn control(&mut self) -> ControlCommand {
        self.report = StatusReport {
            mode: self.mode,
            ..Default::default()
        };

        let state = match (self.mode, self.state) {
            (TrajCtrlMode::Tracking, Some(s)) => s,
            _ => return self.neutral(),
        };

        let goal_m = match self.goal {
            Some(g) => g.position_m,
            None => return self.neutral(),
        };

        self.report_errors(&state);

        let u0 = self
            .warm_start
            .take()
            .unwrap_or_else(|| vec![0.0; 2 * self.params.horizon_len]);

        let result = {
            let mut problem = MpcProblem::new(&self.params, state, &self.segments, goal_m);
            self.solver.solve(&mut problem, u0)
        };

        let solution = match result {
            Ok(s) => s,
            Err(e) => return self.solver_failed(e),
        };

        self.report.cost = solution.cost;
        self.report.iterations = solution.iterations;

        let (steer_dem, accel_dem) = match (solution.u.get(0), solution.u.get(1)) {
            (Some(&d), Some(&a)) => (d, a),
            _ => return self.neutral(),
        };

        // Rate limit the executed action against the last issued command
        let max_steer_delta = self.params.max_steer_rate_rads * self.params.ctrl_period_s;
        let max_accel_delta = self.params.max_jerk_msss * self.params.ctrl_period_s;
        let cmd = ControlCommand {
            steering_rad: rate_limit(self.last_cmd.steering_rad, steer_dem, max_steer_delta),
            accel_mss: rate_limit(self.last_cmd.accel_mss, accel_dem, max_accel_delta),
        };
        self.report.steer_rate_limited = cmd.steering_rad != steer_dem;
        self.report.accel_rate_limited = cmd.accel_mss != accel_dem;

        if !cmd.is_finite() {
            return self.solver_failed(SolverError::NonFinite(solution.iterations));
        }

        trace!(
            "TrajCtrl output: steer {:.4} rad, accel {:.4} m/s^2 after {} iterations",
            cmd.steering_rad,
            cmd.accel_mss,
            solution.iterations
        );

        self.warm_start = Some(shift(solution.u));
        self.last_cmd = cmd;

        cmd
    }

    /// Clear the path, goal and warm start, the controller idles until a new path arrives.
    pub fn reset(&mut self) {
        self.reference = Path::new_empty();
        self.segments.clear();
        self.received_len = 0;
        self.goal = None;
        self.warm_start = None;
        self.path_received = true;
        self.mode = TrajCtrlMode::Idle;

        debug!("TrajCtrl reset");
    }

    pub fn mode(&self) -> TrajCtrlMode {
        self.mode
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn state(&self) -> Option<&VehicleState> {
        self.state.as_ref()
    }

    pub fn goal(&self) -> Option<&Pose2D> {
        self.goal.as_ref()
    }

    pub fn reference(&self) -> &Path {
        &self.reference
    }

    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    pub fn has_warm_start(&self) -> bool {
        self.warm_start.is_some()
    }

    fn refresh_mode(&mut self) {
        let new_mode = if self.state.is_none() || !self.path_received {
            TrajCtrlMode::Uninitialised
        } else if self.segments.is_empty() {
            TrajCtrlMode::Idle
        } else {
            TrajCtrlMode::Tracking
        };

        if new_mode != self.mode {
            debug!("TrajCtrl mode {:?} -> {:?}", self.mode, new_mode);
            self.mode = new_mode;
        }
    }

    /// Issue the neutral command: straight wheels, braking while moving forwards.
    fn neutral(&mut self) -> ControlCommand {
        self.warm_start = None;

        let moving = self
            .state
            .map(|s| s.linear_vel_ms > STOPPED_SPEED_MS)
            .unwrap_or(false);

        let cmd = if moving {
            ControlCommand::braking(self.params.neutral_decel_mss)
        } else {
            ControlCommand::neutral()
        };

        self.last_cmd = cmd;
        cmd
    }

    fn solver_failed(&mut self, e: SolverError) -> ControlCommand {
        warn!("TrajCtrl solver failed, issuing neutral command: {}", e);
        self.report.solver_failed = true;
        self.neutral()
    }

    fn report_errors(&mut self, state: &VehicleState) {
        let position_m: Vector2<f64> = state.position_m();
        let seg = &self.segments[MpcProblem::nearest_segment(&self.segments, &position_m)];

        self.report.lat_error_m = seg.lateral_error_m(&position_m);
        self.report.head_error_rad = get_ang_dist(seg.heading_rad, state.heading_rad);
    }
}

impl State for TrajCtrl {
    type InitData = &'static str;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = ControlCommand;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        *self = Self::new(params::load(init_data)?);

        self.arch_report = Archiver::from_path(session, "traj_ctrl/status_report.csv")
            .map_err(|e| TrajCtrlError::ArchiveInitError(e.to_string()))?;

        Ok(())
    }

    /// Perform cyclic processing of trajectory control: take any new path, observe the vehicle
    /// and compute the command.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        if let Some(ref path) = input_data.path {
            self.on_path_received(path.clone());
        }

        if let (Some(v), Some(o)) = (input_data.velocity, input_data.odometry) {
            self.observe(&v, &o);
        }

        let cmd = self.control();

        Ok((cmd, self.report))
    }
}

impl Archived for TrajCtrl {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_report.serialise(ArchRecord {
            time_s: archive_time_s(),
            mode: self.report.mode,
            steering_rad: self.last_cmd.steering_rad,
            accel_mss: self.last_cmd.accel_mss,
            lat_error_m: self.report.lat_error_m,
            head_error_rad: self.report.head_error_rad,
            cost: self.report.cost,
            iterations: self.report.iterations,
            solver_failed: self.report.solver_failed,
        })
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Shift an interleaved control sequence forward by one step, repeating the final step.
fn shift(mut u: Vec<f64>) -> Vec<f64> {
    if u.len() >= 4 {
        u.drain(..2);
        let n = u.len();
        let (d, a) = (u[n - 2], u[n - 1]);
        u.push(d);
        u.push(a);
    }

    u
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> Params {
        let mut p = Params::default();
        p.solver.max_iterations = 1000;
        p
    }

    fn straight_path() -> Path {
        Path::direct(Vector2::new(0.0, 0.0), Vector2::new(5.0, 0.0), 0.25)
    }

    fn odom(x: f64, y: f64, heading_rad: f64) -> Odometry {
        Odometry {
            position_m: [x, y],
            heading_rad,
            ..Default::default()
        }
    }

    fn vel(linear_ms: f64) -> VelocityReading {
        VelocityReading {
            linear_ms,
            angular_rads: 0.0,
        }
    }

    fn is_neutral(cmd: &ControlCommand) -> bool {
        cmd.steering_rad == 0.0 && cmd.accel_mss <= 0.0
    }

    #[test]
    fn test_modes() {
        let mut ctrl = TrajCtrl::new(params());
        assert_eq!(ctrl.mode(), TrajCtrlMode::Uninitialised);

        ctrl.observe(&vel(0.0), &odom(0.0, 0.0, 0.0));
        assert_eq!(ctrl.mode(), TrajCtrlMode::Uninitialised);
        assert!(is_neutral(&ctrl.control()));

        ctrl.on_path_received(straight_path());
        assert_eq!(ctrl.mode(), TrajCtrlMode::Tracking);

        ctrl.on_path_received(Path::new_empty());
        assert_eq!(ctrl.mode(), TrajCtrlMode::Idle);

        ctrl.on_path_received(straight_path());
        ctrl.reset();
        assert_eq!(ctrl.mode(), TrajCtrlMode::Idle);
    }

    #[test]
    fn test_path_before_observation() {
        let mut ctrl = TrajCtrl::new(params());

        ctrl.on_path_received(straight_path());
        assert_eq!(ctrl.mode(), TrajCtrlMode::Uninitialised);
        assert!(is_neutral(&ctrl.control()));

        ctrl.observe(&vel(0.0), &odom(0.0, 0.0, 0.0));
        assert_eq!(ctrl.mode(), TrajCtrlMode::Tracking);
    }

    #[test]
    fn test_neutral_on_short_path() {
        let mut ctrl = TrajCtrl::new(params());
        ctrl.observe(&vel(0.5), &odom(0.0, 0.0, 0.0));

        ctrl.on_path_received(Path::new_empty());
        let cmd = ctrl.control();
        assert!(is_neutral(&cmd));
        // Moving forwards so the neutral command brakes
        assert!(cmd.accel_mss < 0.0);

        ctrl.on_path_received(Path::from_points(vec![Pose2D::new(1.0, 0.0, 0.0)]));
        assert!(is_neutral(&ctrl.control()));
        assert_eq!(ctrl.mode(), TrajCtrlMode::Idle);
    }

    #[test]
    fn test_reset_then_control_is_neutral() {
        let mut ctrl = TrajCtrl::new(params());
        ctrl.observe(&vel(0.0), &odom(0.0, 0.0, 0.0));
        ctrl.on_path_received(straight_path());
        ctrl.control();
        assert!(ctrl.has_warm_start());

        ctrl.reset();

        assert!(is_neutral(&ctrl.control()));
        assert!(!ctrl.has_warm_start());
        assert!(ctrl.goal().is_none());
        assert!(ctrl.reference().is_empty());
    }

    #[test]
    fn test_straight_path_from_rest() {
        let mut ctrl = TrajCtrl::new(params());
        ctrl.observe(&vel(0.0), &odom(0.0, 0.0, 0.0));
        ctrl.on_path_received(straight_path());

        let cmd = ctrl.control();

        assert!(!ctrl.report().solver_failed);
        assert!(cmd.steering_rad.abs() < 1e-6);
        assert!(cmd.accel_mss > 0.0);
    }

    #[test]
    fn test_lateral_offset_steers_towards_path() {
        let mut ctrl = TrajCtrl::new(params());
        ctrl.observe(&vel(1.0), &odom(0.0, -0.5, 0.0));
        ctrl.on_path_received(straight_path());

        let cmd = ctrl.control();

        assert!(!ctrl.report().solver_failed);
        assert!(cmd.steering_rad > 0.0);
        assert!((ctrl.report().lat_error_m + 0.5).abs() < 1e-9);

        // Mirror image steers the other way
        let mut ctrl = TrajCtrl::new(params());
        ctrl.observe(&vel(1.0), &odom(0.0, 0.5, 0.0));
        ctrl.on_path_received(straight_path());

        assert!(ctrl.control().steering_rad < 0.0);
    }

    #[test]
    fn test_non_convergence_gives_neutral() {
        let mut p = params();
        p.solver.max_iterations = 1;

        let mut ctrl = TrajCtrl::new(p);
        ctrl.observe(&vel(0.8), &odom(0.0, -0.5, 0.0));
        ctrl.on_path_received(straight_path());

        let cmd = ctrl.control();

        assert_eq!(cmd.steering_rad, 0.0);
        assert!(cmd.accel_mss < 0.0);
        assert!(ctrl.report().solver_failed);
        assert!(!ctrl.has_warm_start());
        assert_eq!(ctrl.mode(), TrajCtrlMode::Tracking);
    }

    #[test]
    fn test_rate_limited_first_action() {
        let p = params();
        let max_steer_delta = p.max_steer_rate_rads * p.ctrl_period_s;
        let max_accel_delta = p.max_jerk_msss * p.ctrl_period_s;

        let mut ctrl = TrajCtrl::new(p);
        ctrl.observe(&vel(1.0), &odom(0.0, -1.5, 0.0));
        ctrl.on_path_received(straight_path());

        let cmd = ctrl.control();

        // Last command was neutral (zero)
        assert!(cmd.steering_rad.abs() <= max_steer_delta + 1e-12);
        assert!(cmd.accel_mss.abs() <= max_accel_delta + 1e-12);
    }

    #[test]
    fn test_last_command_folded_into_state() {
        let mut ctrl = TrajCtrl::new(params());
        ctrl.observe(&vel(0.0), &odom(0.0, 0.0, 0.0));
        ctrl.on_path_received(straight_path());

        let cmd = ctrl.control();
        assert_eq!(ctrl.state().unwrap().last_accel_mss, 0.0);

        ctrl.observe(&vel(0.1), &odom(0.0, 0.0, 0.0));
        assert_eq!(ctrl.state().unwrap().last_accel_mss, cmd.accel_mss);
        assert_eq!(ctrl.state().unwrap().last_steering_rad, cmd.steering_rad);
    }

    #[test]
    fn test_warm_start_dropped_on_shape_change() {
        let mut ctrl = TrajCtrl::new(params());
        ctrl.observe(&vel(0.0), &odom(0.0, 0.0, 0.0));
        ctrl.on_path_received(straight_path());
        ctrl.control();
        assert!(ctrl.has_warm_start());

        // Same number of points keeps it
        ctrl.on_path_received(straight_path());
        assert!(ctrl.has_warm_start());

        ctrl.on_path_received(Path::direct(Vector2::new(0.0, 0.0), Vector2::new(5.0, 0.0), 1.0));
        assert!(!ctrl.has_warm_start());
    }

    #[test]
    fn test_reference_resized() {
        let mut p = params();
        p.path_capacity = 8;
        let mut ctrl = TrajCtrl::new(p);

        ctrl.on_path_received(Path::direct(Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), 0.5));
        assert_eq!(ctrl.reference().get_num_points(), 8);

        ctrl.on_path_received(straight_path());
        assert_eq!(ctrl.reference().get_num_points(), 8);

        // The goal comes from the received path, not the truncated reference
        assert_eq!(ctrl.goal().unwrap().position_m, Vector2::new(5.0, 0.0));
    }

    #[test]
    fn test_proc() {
        let mut ctrl = TrajCtrl::new(params());

        let (cmd, report) = ctrl
            .proc(&InputData {
                velocity: Some(vel(0.0)),
                odometry: Some(odom(0.0, 0.0, 0.0)),
                path: Some(straight_path()),
            })
            .unwrap();

        assert_eq!(report.mode, TrajCtrlMode::Tracking);
        assert!(cmd.accel_mss > 0.0);
    }

    #[test]
    fn test_shift() {
        assert_eq!(
            shift(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            vec![3.0, 4.0, 5.0, 6.0, 5.0, 6.0]
        );
        assert_eq!(shift(vec![1.0, 2.0]), vec![1.0, 2.0]);
    }
}
