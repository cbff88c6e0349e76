//! Telemetry readings and the published render snapshot.
//!
//! `RenderSnapshot` field names (`ts`, `next_in`, `audio_backend`, ...) are
//! the wire contract with external visualizers and must not change. A reader
//! must treat missing or malformed fields as stale data, never as an error.

use serde::{Deserialize, Serialize};

/// One sampling of system load, all values in percent, clamped to [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub cpu: f32,
    pub ram: f32,
    pub gpu: f32,
    pub vram: f32,
}

impl TelemetrySnapshot {
    pub fn new(cpu: f32, ram: f32, gpu: f32, vram: f32) -> Self {
        Self {
            cpu: cpu.clamp(0.0, 100.0),
            ram: ram.clamp(0.0, 100.0),
            gpu: gpu.clamp(0.0, 100.0),
            vram: vram.clamp(0.0, 100.0),
        }
    }
}

/// Normalized per-metric gain modulators, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentLevels {
    pub cpu_drive: f32,
    pub ram_warmth: f32,
    pub gpu_motion: f32,
    pub vram_spark: f32,
}

impl From<TelemetrySnapshot> for ComponentLevels {
    fn from(t: TelemetrySnapshot) -> Self {
        Self {
            cpu_drive: (t.cpu / 100.0).clamp(0.0, 1.0),
            ram_warmth: (t.ram / 100.0).clamp(0.0, 1.0),
            gpu_motion: (t.gpu / 100.0).clamp(0.0, 1.0),
            vram_spark: (t.vram / 100.0).clamp(0.0, 1.0),
        }
    }
}

/// State published once per block for external consumers. Overwritten
/// wholesale each iteration; the latest snapshot replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    /// Seconds on a monotonic clock at publish time.
    pub ts: f64,
    pub tempo: f32,
    pub cpu: f32,
    pub ram: f32,
    pub gpu: f32,
    pub vram: f32,
    pub preset: String,
    pub preset_index: usize,
    pub audio_backend: String,
    /// Seconds until the next scheduled preset rotation.
    pub next_in: f64,
    /// Eight normalized visualization levels, each in [0, 1].
    pub levels: [f32; 8],
    pub components: ComponentLevels,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_is_clamped() {
        let t = TelemetrySnapshot::new(-3.0, 140.0, 55.5, 100.0);
        assert_eq!(t.cpu, 0.0);
        assert_eq!(t.ram, 100.0);
        assert_eq!(t.gpu, 55.5);
        assert_eq!(t.vram, 100.0);
    }

    #[test]
    fn component_levels_normalize() {
        let c = ComponentLevels::from(TelemetrySnapshot::new(50.0, 100.0, 0.0, 25.0));
        assert!((c.cpu_drive - 0.5).abs() < 1e-6);
        assert_eq!(c.ram_warmth, 1.0);
        assert_eq!(c.gpu_motion, 0.0);
        assert!((c.vram_spark - 0.25).abs() < 1e-6);
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let snapshot = RenderSnapshot {
            ts: 123.456,
            tempo: 84.2,
            cpu: 31.0,
            ram: 62.5,
            gpu: 10.0,
            vram: 4.0,
            preset: "Neon Drift".to_string(),
            preset_index: 8,
            audio_backend: "pw-play".to_string(),
            next_in: 280.0,
            levels: [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8],
            components: ComponentLevels {
                cpu_drive: 0.31,
                ram_warmth: 0.625,
                gpu_motion: 0.1,
                vram_spark: 0.04,
            },
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: RenderSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn snapshot_uses_original_field_names() {
        let snapshot = RenderSnapshot {
            ts: 0.0,
            tempo: 96.0,
            cpu: 0.0,
            ram: 0.0,
            gpu: 0.0,
            vram: 0.0,
            preset: "Night Tape".to_string(),
            preset_index: 0,
            audio_backend: "aplay".to_string(),
            next_in: 0.0,
            levels: [0.0; 8],
            components: ComponentLevels::default(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        for field in ["\"ts\"", "\"next_in\"", "\"audio_backend\"", "\"preset_index\"", "\"components\"", "\"levels\""] {
            assert!(json.contains(field), "missing field {field} in {json}");
        }
    }
}
