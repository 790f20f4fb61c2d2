//! Static planar frame transforms.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use nalgebra::{Isometry2, Point2};
use serde::Deserialize;

use crate::{
    iface::{CollabError, TransformService},
    loc::Pose2D,
    path::{GlobalPlan, Path},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Definition of a frame by its pose in the common root frame.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameDef {
    pub id: String,

    /// `[x_m, y_m, heading_rad]` of the frame in the root frame
    pub pose: [f64; 3],
}

/// A transform service over a fixed set of frames.
#[derive(Debug, Clone, Default)]
pub struct StaticTransform {
    /// Pose of each frame in the root frame
    frames: HashMap<String, Isometry2<f64>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StaticTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_defs(defs: &[FrameDef]) -> Self {
        let mut t = Self::new();
        for def in defs {
            t.add_frame(&def.id, Pose2D::new(def.pose[0], def.pose[1], def.pose[2]));
        }
        t
    }

    /// Add or replace a frame, given its pose in the root frame.
    pub fn add_frame(&mut self, id: &str, pose: Pose2D) {
        self.frames.insert(id.to_string(), pose.to_isometry());
    }

    /// The isometry taking coordinates in `from` into coordinates in `to`.
    pub fn lookup(&self, from: &str, to: &str) -> Option<Isometry2<f64>> {
        if from == to {
            return Some(Isometry2::identity());
        }

        let from_iso = self.frames.get(from)?;
        let to_iso = self.frames.get(to)?;

        Some(to_iso.inverse() * from_iso)
    }
}

impl TransformService for StaticTransform {
    fn transform_plan(
        &self,
        plan: &GlobalPlan,
        target_frame: &str,
    ) -> Result<GlobalPlan, CollabError> {
        let iso = self.lookup(&plan.frame_id, target_frame).ok_or_else(|| {
            CollabError::UnknownTransform(plan.frame_id.clone(), target_frame.to_string())
        })?;

        let points = plan
            .path
            .points
            .iter()
            .map(|p| {
                let pos = iso * Point2::from(p.position_m);
                Pose2D {
                    position_m: pos.coords,
                    heading_rad: p.heading_rad + iso.rotation.angle(),
                }
            })
            .collect();

        Ok(GlobalPlan::new(target_frame, Path::from_points(points)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector2;
    use std::f64::consts::FRAC_PI_2;

    fn transform() -> StaticTransform {
        StaticTransform::from_defs(&[
            FrameDef {
                id: "odom".into(),
                pose: [0.0, 0.0, 0.0],
            },
            FrameDef {
                id: "map".into(),
                pose: [1.0, 2.0, FRAC_PI_2],
            },
        ])
    }

    #[test]
    fn test_map_to_odom() {
        let plan = GlobalPlan::new(
            "map",
            Path::from_points(vec![Pose2D::new(1.0, 0.0, 0.0)]),
        );

        let out = transform().transform_plan(&plan, "odom").unwrap();

        assert_eq!(out.frame_id, "odom");
        let p = out.path.points[0];
        assert!((p.position_m - Vector2::new(1.0, 3.0)).norm() < 1e-12);
        assert!((p.heading_rad - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_and_identity() {
        let t = transform();
        let plan = GlobalPlan::new(
            "odom",
            Path::from_points(vec![Pose2D::new(0.5, -0.5, 0.3)]),
        );

        assert_eq!(t.transform_plan(&plan, "odom").unwrap(), plan);

        let back = t
            .transform_plan(&t.transform_plan(&plan, "map").unwrap(), "odom")
            .unwrap();
        assert!((back.path.points[0].position_m - plan.path.points[0].position_m).norm() < 1e-12);
    }

    #[test]
    fn test_unknown_frame() {
        let plan = GlobalPlan::new("base_link", Path::new_empty());

        assert!(matches!(
            transform().transform_plan(&plan, "odom"),
            Err(CollabError::UnknownTransform(_, _))
        ));
    }
}
