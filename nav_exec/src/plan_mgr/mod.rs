//! # Plan manager module
//!
//! The plan manager owns the global plan and the accepted local path. Each time the host asks
//! for a command it:
//!
//!  1. Gets the vehicle pose and publishes the oriented footprint.
//!  2. Transforms the global plan into the planning frame.
//!  3. Prunes traversed waypoints from the front of the plan.
//!  4. Derives the goal from the last two waypoints and checks for arrival.
//!  5. Checks the vehicle is not in collision.
//!  6. Requests a local path from the path provider and gates it: a candidate with more than
//!     one point replaces the local path, otherwise the previous local path is kept if usable.
//!  7. Publishes the local path to trajectory control through the path channel.
//!
//! The command returned is always the zero command, motion comes from trajectory control.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::vehicle::ControlCommand;
use log::{debug, info, warn};
use nalgebra::Vector2;

// Internal
pub use params::Params;

use crate::{
    iface::{
        CollabError, ControllerReset, PathProvider, PathProviderFactory, PoseSource,
        ProviderConfig, TelemetrySink, TransformService,
    },
    loc::Pose2D,
    path::{GlobalPlan, GoalTarget, Path, PRUNE_KEEP_TAIL},
    path_channel::PathSender,
};
use util::maths::get_ang_dist;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The plan manager. Constructed uninitialised, see `PlanMgr::init`.
#[derive(Default)]
pub struct PlanMgr {
    inner: Option<Initialised>,
}

/// The collaborators the plan manager is wired to.
pub struct Collaborators {
    pub pose_source: Box<dyn PoseSource>,
    pub transform: Box<dyn TransformService>,
    pub reset: Box<dyn ControllerReset>,
    pub telemetry: Box<dyn TelemetrySink>,
    pub path_tx: PathSender,
}

/// State of an initialised plan manager.
struct Initialised {
    params: Params,
    collab: Collaborators,
    provider: Box<dyn PathProvider>,

    /// Footprint polygon in the body frame
    footprint_m: Vec<Vector2<f64>>,

    global_plan: GlobalPlan,
    local_path: Path,

    /// Valid if the local path was accepted from the provider for the current plan
    local_path_valid: bool,

    /// Set on arrival, cleared by `set_plan`
    goal_reached: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlanMgrError {
    #[error("The plan manager has not been initialised")]
    NotInitialised,

    #[error("No model_file was provided in the parameters")]
    NoModelFile,

    #[error("Could not initialise the path provider: {0}")]
    ProviderInit(CollabError),

    #[error("Could not load parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("The vehicle pose is unavailable")]
    PoseUnavailable,

    #[error("Could not transform the global plan: {0}")]
    TransformFailure(CollabError),

    #[error("The global plan is empty")]
    EmptyPlan,

    #[error("The vehicle is in collision")]
    CollisionDetected,

    #[error("No path found and no previous local path to fall back on")]
    NoPathFound,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PlanMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the parameters from the given file under the parameters directory.
    pub fn load_params(params_path: &str) -> Result<Params, PlanMgrError> {
        Ok(util::params::load(params_path)?)
    }

    /// Initialise the manager, building the path provider with the given factory.
    ///
    /// Initialising an already initialised manager does nothing.
    pub fn init(
        &mut self,
        params: Params,
        collab: Collaborators,
        factory: &dyn PathProviderFactory,
    ) -> Result<(), PlanMgrError> {
        if self.inner.is_some() {
            warn!("PlanMgr is already initialised, ignoring init");
            return Ok(());
        }

        let model_file = params.model_file.clone().ok_or(PlanMgrError::NoModelFile)?;

        let footprint_m: Vec<Vector2<f64>> = params
            .footprint
            .iter()
            .map(|v| Vector2::new(v[0], v[1]))
            .collect();

        let provider = factory
            .build(&ProviderConfig {
                model_file,
                xy_tolerance_m: params.xy_goal_tolerance / 2.0,
                yaw_tolerance_rad: params.yaw_goal_tolerance,
                num_samples: params.num_samples,
                num_paths: params.num_paths,
                footprint_m: footprint_m.clone(),
            })
            .map_err(PlanMgrError::ProviderInit)?;

        info!(
            "PlanMgr initialised, planning in frame {:?} with goal tolerance {} m",
            params.global_frame, params.xy_goal_tolerance
        );

        self.inner = Some(Initialised {
            params,
            collab,
            provider,
            footprint_m,
            global_plan: GlobalPlan::default(),
            local_path: Path::new_empty(),
            local_path_valid: false,
            goal_reached: false,
        });

        Ok(())
    }

    pub fn is_initialised(&self) -> bool {
        self.inner.is_some()
    }

    /// Replace the global plan, clearing the local path and resetting trajectory control.
    pub fn set_plan(&mut self, plan: GlobalPlan) -> Result<(), PlanMgrError> {
        let inner = self.inner.as_mut().ok_or(PlanMgrError::NotInitialised)?;

        inner.local_path = Path::new_empty();
        inner.collab.path_tx.clear();

        if let Err(e) = inner.collab.reset.reset() {
            warn!("Could not reset trajectory control: {}", e);
        }

        info!(
            "New global plan of {} waypoints in frame {:?}",
            plan.path.get_num_points(),
            plan.frame_id
        );

        inner.global_plan = plan;
        inner.goal_reached = false;
        inner.local_path_valid = false;

        Ok(())
    }

    /// Run one planning cycle, see the module documentation.
    pub fn compute_command(&mut self) -> Result<ControlCommand, PlanMgrError> {
        let inner = self.inner.as_mut().ok_or(PlanMgrError::NotInitialised)?;

        if inner.goal_reached {
            return Ok(ControlCommand::neutral());
        }

        let pose = inner
            .collab
            .pose_source
            .pose()
            .ok_or(PlanMgrError::PoseUnavailable)?;
        inner.publish_footprint(&pose);

        // Transform and prune the plan
        let mut plan = match inner
            .collab
            .transform
            .transform_plan(&inner.global_plan, &inner.params.global_frame)
        {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not transform the global plan: {}", e);
                return Err(PlanMgrError::TransformFailure(e));
            }
        };

        let num_pruned = plan.path.prune(&pose.position_m, PRUNE_KEEP_TAIL);
        inner.global_plan.path.remove_front(num_pruned);

        let goal = match plan.path.terminal_pose() {
            Some(g) => GoalTarget {
                pose: g,
                xy_tolerance_m: inner.params.xy_goal_tolerance,
                yaw_tolerance_rad: inner.params.yaw_goal_tolerance,
            },
            None => return Err(PlanMgrError::EmptyPlan),
        };

        let goal_dist_m = (goal.pose.position_m - pose.position_m).norm();
        debug!(
            "Goal distance {:.3} m, yaw error {:.3} rad",
            goal_dist_m,
            get_ang_dist(pose.heading_rad, goal.pose.heading_rad)
        );

        if goal_dist_m <= goal.xy_tolerance_m {
            info!("Goal reached ({:.3} m from goal)", goal_dist_m);
            inner.goal_reached = true;
            inner.local_path_valid = false;
            inner.local_path = Path::new_empty();
            inner.collab.path_tx.publish(Path::new_empty());
            return Ok(ControlCommand::neutral());
        }

        if !inner.provider.is_state_valid(&pose) {
            warn!("Vehicle is in collision at {:?}", pose.position_m);
            inner.local_path = Path::new_empty();
            inner.local_path_valid = false;
            inner.collab.path_tx.publish(Path::new_empty());
            return Err(PlanMgrError::CollisionDetected);
        }

        let candidate = match inner.provider.request_path(
            &pose,
            &goal.pose,
            &inner.params.search_bound,
        ) {
            Ok(c) => c,
            Err(e) => {
                warn!("Path request failed: {}", e);
                Vec::new()
            }
        };

        if candidate.len() > 1 {
            let mut local_path = Path::from_points(candidate);
            local_path.fill_headings();
            local_path.prune(&pose.position_m, PRUNE_KEEP_TAIL);

            debug!("Accepted local path of {} points", local_path.get_num_points());

            inner.local_path = local_path;
            inner.local_path_valid = true;
        } else if inner.local_path.get_num_points() <= 1 {
            return Err(PlanMgrError::NoPathFound);
        } else {
            debug!(
                "Candidate of {} points rejected, keeping the previous local path",
                candidate.len()
            );
        }

        inner.collab.path_tx.publish(inner.local_path.clone());
        inner.collab.telemetry.publish_global_plan(&plan);
        inner.collab.telemetry.publish_local_path(&inner.local_path);

        Ok(ControlCommand::neutral())
    }

    /// Returns true once the vehicle has arrived at the goal of the current plan.
    pub fn is_goal_reached(&self) -> Result<bool, PlanMgrError> {
        self.inner
            .as_ref()
            .map(|i| i.goal_reached)
            .ok_or(PlanMgrError::NotInitialised)
    }

    /// The currently held local path, `None` if uninitialised.
    pub fn local_path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|i| &i.local_path)
    }

    /// Returns true if the local path was accepted from the provider for the current plan.
    pub fn is_local_path_valid(&self) -> bool {
        self.inner
            .as_ref()
            .map(|i| i.local_path_valid)
            .unwrap_or(false)
    }

    /// The stored global plan, in its original frame, `None` if uninitialised.
    pub fn global_plan(&self) -> Option<&GlobalPlan> {
        self.inner.as_ref().map(|i| &i.global_plan)
    }
}

impl Initialised {
    fn publish_footprint(&mut self, pose: &Pose2D) {
        let iso = pose.to_isometry();
        let oriented: Vec<Vector2<f64>> = self
            .footprint_m
            .iter()
            .map(|v| iso.transform_vector(v) + pose.position_m)
            .collect();

        self.collab.telemetry.publish_footprint(&oriented);
    }
}
