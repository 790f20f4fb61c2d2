//! # Sampled path provider
//!
//! A simple path provider over a world of disc obstacles. Candidate paths are the straight line
//! to the target plus detours through via points offset either side of it. The shortest of the
//! first collision-free candidates is returned.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, trace};
use nalgebra::Vector2;
use serde::Deserialize;

use crate::{
    iface::{CollabError, PathProvider, PathProviderFactory, ProviderConfig, SearchBound},
    loc::Pose2D,
    path::Path,
};
use util::maths::get_ang_dist;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The world the provider plans in, loaded from the provider's model file.
#[derive(Debug, Clone, Deserialize)]
pub struct World {
    /// Radius of the disc bounding the vehicle. If absent the footprint is used.
    #[serde(default)]
    pub robot_radius_m: Option<f64>,

    /// Separation of the points along a candidate path
    #[serde(default = "default_point_sep_m")]
    pub point_sep_m: f64,

    /// Lateral offset between successive detour via points
    #[serde(default = "default_detour_step_m")]
    pub detour_step_m: f64,

    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
}

/// A disc shaped obstacle.
#[derive(Debug, Clone, Deserialize)]
pub struct Obstacle {
    pub centre_m: [f64; 2],
    pub radius_m: f64,
}

pub struct SampledPathProvider {
    world: World,
    config: ProviderConfig,
    robot_radius_m: f64,
}

/// Builds `SampledPathProvider`s by loading the world from the model file.
pub struct SampledProviderFactory;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SampledPathProvider {
    pub fn new(world: World, config: ProviderConfig) -> Self {
        let robot_radius_m = world.robot_radius_m.unwrap_or_else(|| {
            config
                .footprint_m
                .iter()
                .map(|v| v.norm())
                .fold(0.0, f64::max)
        });

        Self {
            world,
            config,
            robot_radius_m,
        }
    }

    /// Returns true if the vehicle's bounding disc at this position touches no obstacle.
    pub fn is_position_free(&self, position_m: &Vector2<f64>) -> bool {
        self.world.obstacles.iter().all(|o| {
            let centre_m = Vector2::new(o.centre_m[0], o.centre_m[1]);
            (position_m - centre_m).norm() > o.radius_m + self.robot_radius_m
        })
    }

    /// Build the candidate passing through the given via points.
    fn candidate(&self, start_m: Vector2<f64>, vias_m: &[Vector2<f64>]) -> Path {
        let mut points: Vec<Pose2D> = vec![];
        let mut from_m = start_m;

        for to_m in vias_m {
            let leg = Path::direct(from_m, *to_m, self.world.point_sep_m);

            // Legs share their end points
            let skip = if points.is_empty() { 0 } else { 1 };
            points.extend(leg.points.into_iter().skip(skip));

            from_m = *to_m;
        }

        Path::from_points(points)
    }
}

impl PathProvider for SampledPathProvider {
    fn request_path(
        &mut self,
        start: &Pose2D,
        goal: &Pose2D,
        bound: &SearchBound,
    ) -> Result<Vec<Pose2D>, CollabError> {
        let start_m = start.position_m;
        let target_m = clip_to_bound(&start_m, &goal.position_m, bound);
        let diff_m = target_m - start_m;

        if diff_m.norm() <= self.config.xy_tolerance_m {
            trace!("Start already within tolerance of the target");
            return Ok(Vec::new());
        }

        // Via points sit at the midpoint, alternating left and right with growing offsets
        let normal = Vector2::new(-diff_m[1], diff_m[0]).normalize();
        let mid_m = start_m + diff_m * 0.5;

        let mut via_sets = vec![vec![target_m]];
        for i in 1..=self.config.num_samples {
            let side = if i % 2 == 1 { 1.0 } else { -1.0 };
            let offset_m = ((i + 1) / 2) as f64 * self.world.detour_step_m * side;
            let via_m = mid_m + normal * offset_m;

            if bound.contains(&start_m, &via_m) {
                via_sets.push(vec![via_m, target_m]);
            }
        }

        let mut free: Vec<Path> = Vec::new();
        for vias in via_sets.iter() {
            if free.len() >= self.config.num_paths.max(1) {
                break;
            }

            let cand = self.candidate(start_m, vias);

            let initial_heading_rad = match cand.get_segment_to_target(1) {
                Some(seg) => seg.heading_rad,
                None => continue,
            };
            if get_ang_dist(start.heading_rad, initial_heading_rad).abs()
                > 0.5 * bound.heading_range_rad
            {
                continue;
            }

            if cand.points.iter().all(|p| self.is_position_free(&p.position_m)) {
                free.push(cand);
            }
        }

        let best = free.into_iter().min_by(|a, b| {
            let la = a.get_length().unwrap_or(std::f64::INFINITY);
            let lb = b.get_length().unwrap_or(std::f64::INFINITY);
            la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal)
        });

        match best {
            Some(p) => {
                debug!("Provider found a path of {} points", p.get_num_points());
                Ok(p.points)
            }
            None => {
                debug!("Provider found no collision-free path");
                Ok(Vec::new())
            }
        }
    }

    fn is_state_valid(&self, pose: &Pose2D) -> bool {
        self.is_position_free(&pose.position_m)
    }
}

impl PathProviderFactory for SampledProviderFactory {
    fn build(&self, config: &ProviderConfig) -> Result<Box<dyn PathProvider>, CollabError> {
        let world: World = util::params::load(&config.model_file)
            .map_err(|e| CollabError::ModelLoad(config.model_file.clone(), e.to_string()))?;

        debug!(
            "Loaded world {:?} with {} obstacles",
            config.model_file,
            world.obstacles.len()
        );

        Ok(Box::new(SampledPathProvider::new(world, config.clone())))
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_point_sep_m() -> f64 {
    0.1
}

fn default_detour_step_m() -> f64 {
    0.5
}

/// Pull `target_m` back along the line from `centre_m` until it lies inside the bound.
fn clip_to_bound(centre_m: &Vector2<f64>, target_m: &Vector2<f64>, bound: &SearchBound) -> Vector2<f64> {
    let diff_m = target_m - centre_m;

    let mut scale: f64 = 1.0;
    if diff_m[0].abs() > 0.5 * bound.width_m {
        scale = scale.min(0.5 * bound.width_m / diff_m[0].abs());
    }
    if diff_m[1].abs() > 0.5 * bound.height_m {
        scale = scale.min(0.5 * bound.height_m / diff_m[1].abs());
    }

    centre_m + diff_m * scale
}
