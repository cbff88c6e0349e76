//! # loadtune-types
//!
//! Shared type definitions for the loadtune engine: the preset catalog,
//! telemetry readings, and the render snapshot published for external
//! visualizers.

pub mod music;
pub mod preset;
pub mod snapshot;

pub use music::midi_to_hz;
pub use preset::{Preset, PresetBank, DEFAULT_PRESET_INDEX, PRESETS};
pub use snapshot::{ComponentLevels, RenderSnapshot, TelemetrySnapshot};

/// Fixed output sample rate in Hz. The PCM stream and every playback
/// backend invocation assume this rate.
pub const SAMPLE_RATE: u32 = 44_100;
