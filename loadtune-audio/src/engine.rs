//! The render loop.
//!
//! One iteration handles one sixteenth-note block: fold telemetry into
//! the tempo, plan and render the voices, publish the snapshot, then
//! stream the PCM. The blocking PCM write is the only pacing mechanism;
//! the engine holds no buffer beyond the current block, so a full pipe
//! stalls synthesis until the player drains.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{info, warn};

use loadtune_types::{ComponentLevels, PresetBank, RenderSnapshot, TelemetrySnapshot};

use crate::mix::quantize_block;
use crate::publish::StatePublisher;
use crate::sampler::TelemetrySampler;
use crate::sink::PcmSink;
use crate::tempo::TempoController;
use crate::voice::{StepPlan, VoiceBank};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub state_path: PathBuf,
    pub marker_path: PathBuf,
    /// Elapsed time after which the engine rotates presets on its own.
    pub rotate_window: Duration,
    pub initial_preset: usize,
    pub rng_seed: u64,
}

impl EngineConfig {
    /// Conventional paths and the five-minute rotation window.
    pub fn with_defaults() -> Self {
        Self {
            state_path: PathBuf::from("/tmp/loadtune-state.json"),
            marker_path: PathBuf::from("/tmp/loadtune-next-track.flag"),
            rotate_window: Duration::from_secs(300),
            initial_preset: loadtune_types::DEFAULT_PRESET_INDEX,
            rng_seed: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x4d595df4d0f33173),
        }
    }
}

/// What one block did; returned so callers (and tests) can observe the
/// engine without reading the state file.
#[derive(Debug, Clone)]
pub struct BlockReport {
    pub tempo: f32,
    pub block_samples: usize,
    pub preset_index: usize,
    pub rotated: bool,
    pub levels: [f32; 8],
}

pub struct Engine<S: PcmSink> {
    sink: S,
    sampler: TelemetrySampler,
    publisher: StatePublisher,
    bank: PresetBank,
    tempo: TempoController,
    voices: VoiceBank,
    rotate_window: Duration,
    rng_state: u64,
    step: u64,
    pending_rotation: bool,
    last_rotation: Instant,
    started: Instant,
    mix_buf: Vec<f32>,
    pcm_buf: Vec<u8>,
}

impl<S: PcmSink> Engine<S> {
    pub fn new(sink: S, config: EngineConfig) -> Self {
        let bank = PresetBank::new(config.initial_preset);
        let tempo = TempoController::new(bank.current().base_tempo);
        Self {
            sink,
            sampler: TelemetrySampler::new(),
            publisher: StatePublisher::new(&config.state_path, &config.marker_path),
            bank,
            tempo,
            voices: VoiceBank::new(),
            rotate_window: config.rotate_window,
            rng_state: config.rng_seed,
            step: 0,
            pending_rotation: false,
            last_rotation: Instant::now(),
            started: Instant::now(),
            mix_buf: Vec::new(),
            pcm_buf: Vec::new(),
        }
    }

    pub fn preset_index(&self) -> usize {
        self.bank.index()
    }

    /// Run until the cancellation flag is raised or the sink dies. The
    /// flag is checked once per block; an in-flight block always finishes.
    pub fn run(&mut self, cancel: &AtomicBool) {
        info!(
            "engine started on '{}' with backend {}",
            self.bank.current().name,
            self.sink.backend_name()
        );
        while !cancel.load(Ordering::Relaxed) {
            let telemetry = self.sampler.sample();
            if let Err(e) = self.advance_block(telemetry) {
                // A dead player is unrecoverable; there is no failover.
                warn!("playback stream closed ({e}), stopping");
                break;
            }
        }
        info!("engine stopped after {} blocks", self.step);
    }

    /// Render, publish, and stream one block for the given telemetry.
    pub fn advance_block(&mut self, telemetry: TelemetrySnapshot) -> io::Result<BlockReport> {
        if self.publisher.consume_rotation_marker()
            || self.last_rotation.elapsed() >= self.rotate_window
        {
            self.pending_rotation = true;
        }
        let mut rotated = false;
        if self.pending_rotation && self.step % 16 == 0 {
            let index = self.bank.rotate();
            info!("rotated to preset {} '{}'", index, self.bank.current().name);
            self.last_rotation = Instant::now();
            self.pending_rotation = false;
            rotated = true;
        }

        let preset = self.bank.current();
        let update = self.tempo.update(telemetry, preset.base_tempo);
        let components = ComponentLevels::from(telemetry);

        let plan = StepPlan::for_step(preset, self.step, components, &mut self.rng_state);
        self.voices.render(&plan, update.block_samples, &mut self.mix_buf);
        quantize_block(&self.mix_buf, &mut self.pcm_buf);

        let since_rotation = self.last_rotation.elapsed();
        let snapshot = RenderSnapshot {
            ts: self.started.elapsed().as_secs_f64(),
            tempo: update.tempo,
            cpu: telemetry.cpu,
            ram: telemetry.ram,
            gpu: telemetry.gpu,
            vram: telemetry.vram,
            preset: preset.name.to_string(),
            preset_index: self.bank.index(),
            audio_backend: self.sink.backend_name().to_string(),
            next_in: (self.rotate_window.as_secs_f64() - since_rotation.as_secs_f64()).max(0.0),
            levels: plan.levels(),
            components,
        };
        self.publisher.publish(&snapshot);

        self.step += 1;
        self.sink.write_block(&self.pcm_buf)?;

        Ok(BlockReport {
            tempo: update.tempo,
            block_samples: update.block_samples,
            preset_index: snapshot.preset_index,
            rotated,
            levels: snapshot.levels,
        })
    }
}
