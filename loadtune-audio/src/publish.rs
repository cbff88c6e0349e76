//! Snapshot publishing and rotation-marker consumption.
//!
//! The state file and the marker file are the only channel between the
//! engine and the visualizer. The snapshot is written to a sibling temp
//! file and renamed into place so a reader never sees a torn write. Both
//! sides tolerate the other being absent.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use loadtune_types::RenderSnapshot;

pub struct StatePublisher {
    state_path: PathBuf,
    tmp_path: PathBuf,
    marker_path: PathBuf,
}

impl StatePublisher {
    pub fn new(state_path: &Path, marker_path: &Path) -> Self {
        let mut tmp = state_path.as_os_str().to_os_string();
        tmp.push(".tmp");
        Self {
            state_path: state_path.to_path_buf(),
            tmp_path: PathBuf::from(tmp),
            marker_path: marker_path.to_path_buf(),
        }
    }

    /// Publish one snapshot. Failures are logged and swallowed; a missed
    /// frame only costs the visualizer one update.
    pub fn publish(&self, snapshot: &RenderSnapshot) {
        if let Err(e) = self.try_publish(snapshot) {
            warn!("failed to publish state to {}: {e}", self.state_path.display());
        }
    }

    fn try_publish(&self, snapshot: &RenderSnapshot) -> std::io::Result<()> {
        let json = serde_json::to_string(snapshot)?;
        fs::write(&self.tmp_path, json)?;
        fs::rename(&self.tmp_path, &self.state_path)
    }

    /// Check for a rotation request from the visualizer. The marker is
    /// deleted immediately so a single request rotates exactly once, even
    /// if the rotation itself waits for the next bar boundary.
    pub fn consume_rotation_marker(&self) -> bool {
        if !self.marker_path.exists() {
            return false;
        }
        // The reader side never deletes; a failed remove means a retry
        // next block, which is harmless.
        if let Err(e) = fs::remove_file(&self.marker_path) {
            warn!("failed to remove rotation marker: {e}");
        }
        true
    }
}
