//! # loadtune-audio
//!
//! The loadtune engine: samples system telemetry, folds it into musical
//! parameters, synthesizes one rhythmic block of lo-fi audio at a time, and
//! streams the result as raw PCM to an external playback process while
//! publishing a render snapshot for visualizers.
//!
//! The whole engine is single-threaded and cooperative. One iteration of
//! [`engine::Engine::run`] produces exactly one sixteenth-note block; the
//! blocking write into the playback process is the flow control.

pub mod engine;
pub mod mix;
pub mod publish;
pub mod rng;
pub mod sampler;
pub mod sink;
pub mod tempo;
pub mod voice;

pub use engine::{BlockReport, Engine, EngineConfig};
pub use sink::{PcmSink, ProcessSink, SinkError};
