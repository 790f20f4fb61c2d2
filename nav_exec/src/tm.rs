//! # Session telemetry
//!
//! Telemetry sink which saves snapshots of the published data as JSON files in the session
//! directory. Saving happens on the session's background thread, and only every
//! `decimation`-th publication of each kind is saved.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::Utc;
use nalgebra::Vector2;
use serde::Serialize;

use crate::{
    iface::TelemetrySink,
    path::{GlobalPlan, Path},
};
use util::session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct SessionTm {
    decimation: u64,
    num_footprints: u64,
    num_plans: u64,
    num_paths: u64,
}

#[derive(Serialize)]
struct Stamped<T: Serialize> {
    /// UTC timestamp in milliseconds
    timestamp_ms: i64,

    /// Seconds since the session started
    elapsed_s: f64,

    data: T,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SessionTm {
    /// Create a new sink which saves one in every `decimation` publications.
    pub fn new(decimation: u64) -> Self {
        Self {
            decimation: decimation.max(1),
            num_footprints: 0,
            num_plans: 0,
            num_paths: 0,
        }
    }
}

impl TelemetrySink for SessionTm {
    fn publish_footprint(&mut self, footprint_m: &[Vector2<f64>]) {
        if tick(&mut self.num_footprints, self.decimation) {
            save("tm/footprint.json", footprint_m.to_vec());
        }
    }

    fn publish_global_plan(&mut self, plan: &GlobalPlan) {
        if tick(&mut self.num_plans, self.decimation) {
            save("tm/global_plan.json", plan.clone());
        }
    }

    fn publish_local_path(&mut self, path: &Path) {
        if tick(&mut self.num_paths, self.decimation) {
            save("tm/local_path.json", path.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Count a publication, returning true if this one should be saved.
fn tick(count: &mut u64, decimation: u64) -> bool {
    let save = *count % decimation == 0;
    *count += 1;
    save
}

fn save<T: Serialize + Send + 'static>(path: &str, data: T) {
    session::save_with_timestamp(
        path,
        Stamped {
            timestamp_ms: Utc::now().timestamp_millis(),
            elapsed_s: session::get_elapsed_seconds(),
            data,
        },
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decimation() {
        let mut count = 0;
        let saved: Vec<bool> = (0..7).map(|_| tick(&mut count, 3)).collect();

        assert_eq!(saved, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_publish_without_session() {
        // No session exists in unit tests, publishing must not panic
        let mut tm = SessionTm::new(0);
        tm.publish_local_path(&Path::new_empty());
        tm.publish_global_plan(&GlobalPlan::default());
        tm.publish_footprint(&[Vector2::new(0.3, 0.2)]);
    }
}
