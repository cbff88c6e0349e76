//! Tempo control: folds telemetry into a smoothed load scalar and a live
//! tempo, and derives the length of the next rhythmic block.
//!
//! The coefficients here are contract values shared with the visualizer and
//! the original tuning of the instrument; they are not tunables.

use loadtune_types::{TelemetrySnapshot, SAMPLE_RATE};

/// Hard tempo bounds in BPM. `update` never returns a tempo outside these.
pub const TEMPO_FLOOR: f32 = 58.0;
pub const TEMPO_CEIL: f32 = 128.0;

/// Smallest block the synthesizer will render, in samples.
pub const MIN_BLOCK_SAMPLES: usize = 256;

/// Result of folding one telemetry sample into the tempo state.
#[derive(Debug, Clone, Copy)]
pub struct TempoUpdate {
    /// Live tempo in BPM, clamped to [`TEMPO_FLOOR`, `TEMPO_CEIL`].
    pub tempo: f32,
    /// Sixteenth-note duration at the live tempo, in seconds.
    pub step_secs: f32,
    /// Samples in the next block: `max(256, round(rate * step_secs))`.
    pub block_samples: usize,
}

#[derive(Debug, Clone)]
pub struct TempoController {
    smooth_load: f32,
    live_tempo: f32,
}

impl TempoController {
    /// Start at the preset's anchor tempo with no accumulated load.
    pub fn new(base_tempo: f32) -> Self {
        Self {
            smooth_load: 0.0,
            live_tempo: base_tempo,
        }
    }

    pub fn live_tempo(&self) -> f32 {
        self.live_tempo
    }

    pub fn smooth_load(&self) -> f32 {
        self.smooth_load
    }

    /// Fold one telemetry sample into the smoothed load and live tempo.
    pub fn update(&mut self, telemetry: TelemetrySnapshot, base_tempo: f32) -> TempoUpdate {
        let weighted = telemetry.cpu * 0.34
            + telemetry.ram * 0.20
            + telemetry.gpu * 0.27
            + telemetry.vram * 0.19;
        let load = (weighted / 100.0).clamp(0.0, 1.0);

        // Spike detector: either compute device pinned above 85% pushes the
        // tempo harder than the weighted average alone.
        let peak = telemetry.cpu.max(telemetry.gpu);
        let rush = ((peak - 85.0) / 15.0).clamp(0.0, 1.0);

        self.smooth_load += 0.14 * (load - self.smooth_load);
        let target = base_tempo + 22.0 * self.smooth_load + 12.0 * rush - 6.0;
        self.live_tempo += 0.12 * (target - self.live_tempo);
        self.live_tempo = self.live_tempo.clamp(TEMPO_FLOOR, TEMPO_CEIL);

        let step_secs = 60.0 / self.live_tempo / 4.0;
        let block_samples = ((SAMPLE_RATE as f32 * step_secs).round() as usize).max(MIN_BLOCK_SAMPLES);

        TempoUpdate {
            tempo: self.live_tempo,
            step_secs,
            block_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(pct: f32) -> TelemetrySnapshot {
        TelemetrySnapshot::new(pct, pct, pct, pct)
    }

    #[test]
    fn tempo_stays_bounded_for_any_input() {
        let mut ctl = TempoController::new(96.0);
        let inputs = [
            flat(0.0),
            flat(100.0),
            TelemetrySnapshot::new(100.0, 0.0, 100.0, 0.0),
            TelemetrySnapshot::new(0.0, 100.0, 0.0, 100.0),
        ];
        for telemetry in inputs.iter().cycle().take(2000).copied() {
            let update = ctl.update(telemetry, 96.0);
            assert!(update.tempo >= TEMPO_FLOOR && update.tempo <= TEMPO_CEIL);
        }
    }

    #[test]
    fn idle_machine_settles_at_base_minus_six() {
        // All-zero telemetry: target = base - 6, above the floor for base 72.
        let mut ctl = TempoController::new(72.0);
        let mut tempo = 72.0;
        for _ in 0..600 {
            tempo = ctl.update(flat(0.0), 72.0).tempo;
        }
        assert!((tempo - 66.0).abs() < 0.1, "tempo {tempo}");
    }

    #[test]
    fn idle_machine_floor_clamps_low_base() {
        // base 60 would target 54; the floor holds at 58.
        let mut ctl = TempoController::new(60.0);
        let mut tempo = 60.0;
        for _ in 0..600 {
            tempo = ctl.update(flat(0.0), 60.0).tempo;
        }
        assert!((tempo - TEMPO_FLOOR).abs() < 1e-3, "tempo {tempo}");
    }

    #[test]
    fn saturated_machine_targets_base_plus_twenty_eight() {
        // All-100 telemetry: smooth_load -> 1, rush = 1, target = base + 28.
        let mut ctl = TempoController::new(72.0);
        let mut tempo = 72.0;
        for _ in 0..600 {
            tempo = ctl.update(flat(100.0), 72.0).tempo;
        }
        assert!((tempo - 100.0).abs() < 0.1, "tempo {tempo}");
    }

    #[test]
    fn saturated_machine_ceiling_clamps_high_base() {
        let mut ctl = TempoController::new(108.0);
        let mut tempo = 108.0;
        for _ in 0..600 {
            tempo = ctl.update(flat(100.0), 108.0).tempo;
        }
        assert!((tempo - TEMPO_CEIL).abs() < 1e-3, "tempo {tempo}");
    }

    #[test]
    fn constant_telemetry_converges() {
        let mut ctl = TempoController::new(72.0);
        let telemetry = flat(50.0);
        for _ in 0..400 {
            ctl.update(telemetry, 72.0);
        }
        let settled = ctl.update(telemetry, 72.0).tempo;
        let next = ctl.update(telemetry, 72.0).tempo;
        assert!((settled - next).abs() < 1e-3);
        // target = 72 + 22*0.5 - 6 = 77 (rush = 0 at 50%).
        assert!((settled - 77.0).abs() < 0.1, "tempo {settled}");
    }

    #[test]
    fn block_length_has_floor() {
        let mut ctl = TempoController::new(96.0);
        let update = ctl.update(flat(0.0), 96.0);
        assert!(update.block_samples >= MIN_BLOCK_SAMPLES);
        // A sixteenth at ~90 BPM is ~0.166s = ~7300 samples at 44.1 kHz.
        assert!(update.block_samples > 5000);
    }

    #[test]
    fn faster_tempo_means_shorter_blocks() {
        let mut slow = TempoController::new(60.0);
        let mut fast = TempoController::new(120.0);
        let a = slow.update(flat(0.0), 60.0);
        let b = fast.update(flat(0.0), 120.0);
        assert!(b.block_samples < a.block_samples);
    }
}
