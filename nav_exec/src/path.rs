//! # Path
//!
//! This module defines the paths used by the navigation system: the global plan handed to the
//! plan manager, the local paths tracked by trajectory control and the goal derived from them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use crate::loc::Pose2D;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Squared distance below which a waypoint counts as traversed.
pub const PRUNE_DIST_SQ_M2: f64 = 0.25;

/// Number of waypoints at the end of a path which pruning never removes.
///
/// Two points are needed to derive the goal heading.
pub const PRUNE_KEEP_TAIL: usize = 2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A waypoint of a path. Its traversal index is its position in the path.
pub type Waypoint = Pose2D;

/// An ordered sequence of waypoints.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Path {
    pub points: Vec<Waypoint>,
}

/// The global plan, in front-to-goal order.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct GlobalPlan {
    /// Name of the frame the waypoints are expressed in
    pub frame_id: String,

    pub path: Path,
}

/// A segment between two path points
#[derive(Default, Serialize, Deserialize, Debug, Clone, Copy)]
pub struct PathSegment {
    /// The target of the segment
    pub target_m: Vector2<f64>,

    /// The start point of the segment
    pub start_m: Vector2<f64>,

    /// The length of the segment
    pub length_m: f64,

    /// The heading (angle to the +ve x axis) of the segment
    pub heading_rad: f64,

    /// Unit vector pointing in the direction of the segment
    pub direction: Vector2<f64>,
}

/// The target the vehicle shall reach, derived from the end of a path.
#[derive(Debug, Copy, Clone, Serialize, Default, PartialEq)]
pub struct GoalTarget {
    pub pose: Pose2D,
    pub xy_tolerance_m: f64,
    pub yaw_tolerance_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new empty path
    pub fn new_empty() -> Self {
        Path { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Waypoint>) -> Self {
        Path { points }
    }

    /// Produces a direct path between the two positions, with each point in the path having
    /// at most the given separation. Every point has the heading of the line joining them.
    pub fn direct(from: Vector2<f64>, to: Vector2<f64>, point_sep_m: f64) -> Self {
        let diff_vec = to - from;
        let dist = diff_vec.norm();
        let heading_rad = diff_vec[1].atan2(diff_vec[0]);

        // Number of segments needed so that no segment is longer than the separation
        let num_segs = if point_sep_m > 0.0 {
            ((dist / point_sep_m).ceil() as usize).max(1)
        } else {
            1
        };

        let points = (0..=num_segs)
            .map(|i| Pose2D {
                position_m: from + diff_vec * (i as f64 / num_segs as f64),
                heading_rad,
            })
            .collect();

        Path { points }
    }

    /// Returns the path segment connecting the target point and the previous
    /// point.
    ///
    /// If no segment exists (the target is the first point in the sequence or
    /// is beyond the end of the sequence) then `None` will be returned
    pub fn get_segment_to_target(&self, target_index: usize) -> Option<PathSegment> {
        if self.points.len() < 2 {
            return None;
        }

        if target_index == 0 || target_index >= self.points.len() {
            return None;
        }

        Some(PathSegment::new(
            self.points[target_index - 1].position_m,
            self.points[target_index].position_m,
        ))
    }

    /// Return the length of the path in meters.
    ///
    /// If the path is empty (not enough points) then `None` is returned.
    pub fn get_length(&self) -> Option<f64> {
        if self.points.len() < 2 {
            return None;
        }

        Some(
            self.points
                .windows(2)
                .map(|w| (w[1].position_m - w[0].position_m).norm())
                .sum(),
        )
    }

    /// Get the number of points in the path
    pub fn get_num_points(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Remove traversed waypoints from the front of the path.
    ///
    /// Waypoints are removed while their squared distance to `position_m` is strictly below
    /// `PRUNE_DIST_SQ_M2`, stopping at the first one which is not. The last `keep_tail` points
    /// are never removed. Returns the number of removed points.
    pub fn prune(&mut self, position_m: &Vector2<f64>, keep_tail: usize) -> usize {
        let max_removable = self.points.len().saturating_sub(keep_tail);

        let num_removed = self
            .points
            .iter()
            .take(max_removable)
            .take_while(|p| p.dist_sq_to(position_m) < PRUNE_DIST_SQ_M2)
            .count();

        self.remove_front(num_removed);

        num_removed
    }

    /// Remove the first `num` points of the path (or all of them if there are fewer).
    pub fn remove_front(&mut self, num: usize) {
        let num = num.min(self.points.len());
        self.points.drain(..num);
    }

    /// The pose at the end of the path.
    ///
    /// The heading points from the second-to-last point to the last one. A single point path
    /// uses the point's own heading.
    pub fn terminal_pose(&self) -> Option<Pose2D> {
        let last = self.points.last()?;

        let heading_rad = match self.get_segment_to_target(self.points.len() - 1) {
            Some(seg) => seg.heading_rad,
            None => last.heading_rad,
        };

        Some(Pose2D {
            position_m: last.position_m,
            heading_rad,
        })
    }

    /// Replace any non-finite headings with the direction of travel at that point.
    ///
    /// The direction of travel is towards the next point, or from the previous point for the
    /// last one.
    pub fn fill_headings(&mut self) {
        let num_points = self.points.len();

        for i in 0..num_points {
            if self.points[i].heading_rad.is_finite() {
                continue;
            }

            let seg = if i + 1 < num_points {
                self.get_segment_to_target(i + 1)
            } else {
                self.get_segment_to_target(i)
            };

            self.points[i].heading_rad = match seg {
                Some(s) if s.length_m > 0.0 => s.heading_rad,
                _ => {
                    debug!("Cannot derive a heading for waypoint {}, using zero", i);
                    0.0
                }
            };
        }
    }

    /// Return a copy of the path truncated, or padded by repeating the last point, to exactly
    /// `capacity` points. An empty path stays empty.
    pub fn resized(&self, capacity: usize) -> Self {
        let mut points: Vec<Waypoint> = self.points.iter().take(capacity).cloned().collect();

        if let Some(last) = points.last().cloned() {
            points.resize(capacity, last);
        }

        Path { points }
    }
}

impl PathSegment {
    pub fn new(start_m: Vector2<f64>, target_m: Vector2<f64>) -> Self {
        let diff = target_m - start_m;
        let length_m = diff.norm();

        let direction = if length_m > 0.0 {
            diff / length_m
        } else {
            Vector2::zeros()
        };

        Self {
            target_m,
            start_m,
            length_m,
            heading_rad: diff[1].atan2(diff[0]),
            direction,
        }
    }

    /// Signed lateral distance of the point from the infinite line through the segment.
    ///
    /// Positive values are to the left of the direction of travel.
    pub fn lateral_error_m(&self, point_m: &Vector2<f64>) -> f64 {
        let rel = point_m - self.start_m;
        self.direction[0] * rel[1] - self.direction[1] * rel[0]
    }

    /// Distance from the point to the closest point on the segment.
    pub fn dist_to_m(&self, point_m: &Vector2<f64>) -> f64 {
        let rel = point_m - self.start_m;

        let along_m = if self.length_m > 0.0 {
            rel.dot(&self.direction).max(0.0).min(self.length_m)
        } else {
            0.0
        };

        (rel - self.direction * along_m).norm()
    }
}

impl GlobalPlan {
    pub fn new(frame_id: &str, path: Path) -> Self {
        Self {
            frame_id: frame_id.to_string(),
            path,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn path_xy(points: &[(f64, f64)]) -> Path {
        Path::from_points(points.iter().map(|&(x, y)| Pose2D::new(x, y, 0.0)).collect())
    }

    #[test]
    fn test_direct() {
        let path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), 0.3);

        // 4 segments of 0.25 m
        assert_eq!(path.get_num_points(), 5);
        assert_eq!(path.points.last().unwrap().position_m, Vector2::new(1.0, 0.0));
        assert!((path.get_length().unwrap() - 1.0).abs() < 1e-12);
        assert!(path.points.iter().all(|p| p.heading_rad == 0.0));
    }

    #[test]
    fn test_prune_stops_at_first_far_point() {
        let mut path = path_xy(&[(0.0, 0.0), (1.0, 0.0), (0.1, 0.0), (2.0, 0.0), (3.0, 0.0)]);

        let removed = path.prune(&Vector2::new(0.0, 0.0), PRUNE_KEEP_TAIL);

        // (0.1, 0) is close but comes after the far point at (1, 0) so stays
        assert_eq!(removed, 1);
        assert_eq!(path.points[0].position_m, Vector2::new(1.0, 0.0));
        assert_eq!(path.get_num_points(), 4);
    }

    #[test]
    fn test_prune_boundary_kept() {
        // Exactly 0.5 m away gives a squared distance of exactly 0.25
        let mut path = path_xy(&[(0.5, 0.0), (1.0, 0.0), (2.0, 0.0)]);

        assert_eq!(path.prune(&Vector2::new(0.0, 0.0), PRUNE_KEEP_TAIL), 0);
        assert_eq!(path.get_num_points(), 3);
    }

    #[test]
    fn test_prune_keeps_tail() {
        let mut path = path_xy(&[(0.0, 0.0), (0.2, 0.0), (0.4, 0.0)]);

        assert_eq!(path.prune(&Vector2::new(0.05, 0.0), PRUNE_KEEP_TAIL), 1);
        assert_eq!(path.points[0].position_m, Vector2::new(0.2, 0.0));

        // Without tail protection everything close goes
        let mut path = path_xy(&[(0.0, 0.0), (0.2, 0.0), (0.4, 0.0)]);
        assert_eq!(path.prune(&Vector2::new(0.05, 0.0), 0), 3);
        assert!(path.is_empty());
    }

    #[test]
    fn test_terminal_pose() {
        let path = path_xy(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let goal = path.terminal_pose().unwrap();

        assert_eq!(goal.position_m, Vector2::new(1.0, 1.0));
        assert!((goal.heading_rad - FRAC_PI_2).abs() < 1e-12);

        let single = Path::from_points(vec![Pose2D::new(2.0, 3.0, PI)]);
        assert_eq!(single.terminal_pose().unwrap().heading_rad, PI);

        assert!(Path::new_empty().terminal_pose().is_none());
    }

    #[test]
    fn test_fill_headings() {
        let mut path = Path::from_points(vec![
            Pose2D::new(0.0, 0.0, std::f64::NAN),
            Pose2D::new(0.0, 1.0, 0.3),
            Pose2D::new(-1.0, 1.0, std::f64::NAN),
        ]);

        path.fill_headings();

        assert!((path.points[0].heading_rad - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(path.points[1].heading_rad, 0.3);
        assert!((path.points[2].heading_rad - PI).abs() < 1e-12);
    }

    #[test]
    fn test_resized() {
        let path = path_xy(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);

        let padded = path.resized(5);
        assert_eq!(padded.get_num_points(), 5);
        assert_eq!(padded.points[4].position_m, Vector2::new(2.0, 0.0));

        let truncated = path.resized(2);
        assert_eq!(truncated.points, path.points[..2].to_vec());

        assert!(Path::new_empty().resized(4).is_empty());
    }

    #[test]
    fn test_segment_errors() {
        let seg = PathSegment::new(Vector2::new(0.0, 0.0), Vector2::new(2.0, 0.0));

        assert!((seg.lateral_error_m(&Vector2::new(1.0, 0.5)) - 0.5).abs() < 1e-12);
        assert!((seg.lateral_error_m(&Vector2::new(1.0, -0.5)) + 0.5).abs() < 1e-12);
        assert!((seg.dist_to_m(&Vector2::new(3.0, 0.0)) - 1.0).abs() < 1e-12);
        assert!((seg.dist_to_m(&Vector2::new(1.0, -0.5)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_path_json() {
        let path = path_xy(&[(0.0, 0.0), (1.0, 0.0)]);
        let json = serde_json::to_string(&path).unwrap();
        let back: Path = serde_json::from_str(&json).unwrap();

        assert_eq!(back, path);
    }
}
