//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The executable wires the navigation core to the simulated collaborators and runs two loops:
//!
//!     - Trajectory control, in its own thread at the fixed control period:
//!         - Take the latest local path
//!         - Observe the vehicle
//!         - Solve for and send the command
//!     - Path management, in the main thread at the planning period:
//!         - Transform and prune the global plan
//!         - Check for arrival at the goal
//!         - Request, gate and publish the local path
//!
//! Execution ends when the goal is reached or the maximum duration has elapsed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use nav_lib::{
    params::{NavExecParams, PlanFile},
    path::GlobalPlan,
    path_channel::path_channel,
    plan_mgr::{Collaborators, PlanMgr, PlanMgrError},
    sim::{SampledProviderFactory, SimPoseSource, SimVehicle, SimVehicleIface, StaticTransform},
    tm::SessionTm,
    traj_ctrl::{CtrlRunner, TrajCtrl},
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line arguments
#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec", about = "Local path management and trajectory control")]
struct Args {
    /// Plan file to follow, relative to the parameters directory
    #[structopt(long, default_value = "plan.toml")]
    plan: String,

    /// Override the maximum duration of the run in seconds
    #[structopt(long)]
    max_duration_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let args = Args::from_args();

    // Initialise session
    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Navigation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: NavExecParams =
        util::params::load("nav_exec.toml").wrap_err("Could not load exec params")?;
    let plan_mgr_params =
        PlanMgr::load_params("plan_mgr.toml").wrap_err("Could not load PlanMgr params")?;
    let plan: GlobalPlan = util::params::load::<PlanFile>(&args.plan)
        .wrap_err_with(|| format!("Could not load the plan from {:?}", args.plan))?
        .into();

    let max_duration_s = args.max_duration_s.unwrap_or(exec_params.max_duration_s);

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut traj_ctrl = TrajCtrl::default();
    traj_ctrl
        .init("traj_ctrl.toml", &session)
        .wrap_err("Failed to initialise TrajCtrl")?;
    let ctrl_params = traj_ctrl.params().clone();
    info!("TrajCtrl init complete");

    let sim = SimVehicle::new(
        exec_params.start_pose(),
        ctrl_params.wheelbase_m,
        exec_params.sim_max_speed_ms,
        ctrl_params.max_steer_rad,
    )
    .shared();

    let (path_tx, path_rx) = path_channel();

    let (runner, ctrl_handle) = CtrlRunner::new(
        traj_ctrl,
        path_rx,
        Box::new(SimVehicleIface::new(sim.clone(), ctrl_params.ctrl_period_s)),
        ctrl_params.ctrl_period_s,
    );

    let mut plan_mgr = PlanMgr::new();
    plan_mgr
        .init(
            plan_mgr_params,
            Collaborators {
                pose_source: Box::new(SimPoseSource(sim.clone())),
                transform: Box::new(StaticTransform::from_defs(&exec_params.frames)),
                reset: Box::new(ctrl_handle.clone()),
                telemetry: Box::new(SessionTm::new(exec_params.tm_decimation)),
                path_tx,
            },
            &SampledProviderFactory,
        )
        .wrap_err("Failed to initialise PlanMgr")?;
    info!("PlanMgr init complete");

    info!("Module initialisation complete\n");

    // ---- START CONTROL ----

    let ctrl_jh = thread::Builder::new()
        .name("traj_ctrl".into())
        .spawn(move || runner.run())
        .wrap_err("Failed to start the TrajCtrl thread")?;

    plan_mgr.set_plan(plan).wrap_err("Failed to set the plan")?;

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let plan_period = Duration::from_secs_f64(exec_params.plan_period_s);
    let start_instant = Instant::now();
    let mut num_cycles: u64 = 0;

    loop {
        let cycle_start_instant = Instant::now();

        match plan_mgr.compute_command() {
            Ok(_) => (),
            Err(PlanMgrError::NoPathFound) => warn!("No local path available"),
            Err(PlanMgrError::CollisionDetected) => warn!("Vehicle in collision, holding"),
            Err(e) => warn!("PlanMgr error: {}", e),
        }

        if plan_mgr.is_goal_reached().wrap_err("PlanMgr lost its initialisation")? {
            info!("Goal reached after {:.02} s", start_instant.elapsed().as_secs_f64());
            break;
        }

        if start_instant.elapsed().as_secs_f64() > max_duration_s {
            warn!("Maximum duration of {:.01} s reached, stopping", max_duration_s);
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match plan_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Planning cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - plan_period.as_secs_f64()
            ),
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    if let Err(e) = ctrl_handle.stop() {
        warn!("Could not stop TrajCtrl: {}", e);
    }
    match ctrl_jh.join() {
        Ok(ctrl) => info!("TrajCtrl final mode: {:?}", ctrl.mode()),
        Err(_) => warn!("TrajCtrl thread panicked"),
    }

    info!("End of execution after {} planning cycles", num_cycles);

    session.exit();

    Ok(())
}
