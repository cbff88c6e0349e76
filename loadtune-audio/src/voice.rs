//! Per-block voice synthesis.
//!
//! A [`StepPlan`] is computed once at the top of each sixteenth-note block:
//! note choices, pattern hits, and telemetry-driven gains are all frozen for
//! the block's duration. A [`VoiceBank`] then renders the block sample by
//! sample, accumulating oscillator phase that persists across blocks so that
//! preset and tempo changes never produce a click.

use std::f64::consts::TAU;

use loadtune_types::{midi_to_hz, ComponentLevels, Preset, SAMPLE_RATE};

use crate::rng::next_random;

/// Everything frozen for one sixteenth-note block.
#[derive(Debug, Clone)]
pub struct StepPlan {
    bass_hz: f64,
    sub_hz: f64,
    lead_hz: Option<f64>,
    pad_hz: [f64; 3],
    /// Pad decay exponent; warmer RAM means a flatter, rounder tail.
    pad_shape: f64,
    bass_gain: f64,
    sub_gain: f64,
    pad_gain: f64,
    lead_gain: f64,
    kick_amp: f64,
    snare_amp: f64,
    hat_amp: f64,
}

impl StepPlan {
    /// Plan one step of the given preset. Probabilistic embellishments are
    /// rolled here exactly once; the block renders whatever was decided.
    pub fn for_step(
        preset: &Preset,
        step: u64,
        components: ComponentLevels,
        rng_state: &mut u64,
    ) -> Self {
        let bar = step / 16;
        let step16 = (step % 16) as usize;

        let cpu_drive = components.cpu_drive as f64;
        let ram_warmth = components.ram_warmth as f64;
        let gpu_motion = components.gpu_motion as f64;
        let vram_spark = components.vram_spark as f64;

        let chord_root = preset.chord_root(bar);
        let chord = [chord_root, chord_root + 3, chord_root + 7];

        // Walking fifth on the back half of the bar, sometimes.
        let mut bass_note = chord_root - 12;
        if (step16 == 8 || step16 == 9) && next_random(rng_state) < 0.35 {
            bass_note += 7;
        }

        let mut lead_note = preset.motif[step16].map(|offset| chord_root + offset);
        if let Some(note) = lead_note {
            // A busy GPU occasionally lifts the motif an octave.
            if gpu_motion > 0.65
                && (next_random(rng_state) as f64) < (gpu_motion - 0.55) * 0.25
            {
                lead_note = Some(note + 12);
            }
        }

        let bass_hz = midi_to_hz(bass_note) as f64;

        Self {
            bass_hz,
            sub_hz: bass_hz * 0.5,
            lead_hz: lead_note.map(|n| midi_to_hz(n) as f64),
            pad_hz: chord.map(|n| midi_to_hz(n) as f64),
            pad_shape: 0.28 + 0.35 * (1.0 - ram_warmth),
            bass_gain: (0.12 + 0.14 * cpu_drive).clamp(0.0, 1.0),
            sub_gain: (0.08 + 0.12 * cpu_drive).clamp(0.0, 1.0),
            pad_gain: (0.05 + 0.12 * ram_warmth).clamp(0.0, 1.0),
            lead_gain: (0.07 + 0.15 * gpu_motion).clamp(0.0, 1.0),
            kick_amp: if preset.kick_hit(step16) {
                (0.72 + 0.33 * cpu_drive).clamp(0.0, 1.0)
            } else {
                0.0
            },
            snare_amp: if preset.snare_hit(step16) {
                (0.20 + 0.22 * vram_spark).clamp(0.0, 1.0)
            } else {
                0.0
            },
            hat_amp: if preset.hat_hit(step16) {
                (0.10 + 0.30 * vram_spark).clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    #[cfg(test)]
    fn without_drums(mut self) -> Self {
        self.kick_amp = 0.0;
        self.snare_amp = 0.0;
        self.hat_amp = 0.0;
        self
    }

    pub fn has_drums(&self) -> bool {
        self.kick_amp > 0.0 || self.snare_amp > 0.0 || self.hat_amp > 0.0
    }

    /// Eight normalized visualization levels for this block, each clamped
    /// to [0, 1]: kick, the four sustained voices, snare, hat, and an
    /// overall energy aggregate.
    pub fn levels(&self) -> [f32; 8] {
        let aggregate = (self.kick_amp
            + self.bass_gain
            + self.pad_gain
            + self.lead_gain
            + self.snare_amp
            + self.hat_amp)
            / 2.4;
        [
            self.kick_amp.clamp(0.0, 1.0) as f32,
            (self.bass_gain * 1.8).clamp(0.0, 1.0) as f32,
            (self.sub_gain * 1.8).clamp(0.0, 1.0) as f32,
            (self.pad_gain * 1.8).clamp(0.0, 1.0) as f32,
            (self.lead_gain * 1.8).clamp(0.0, 1.0) as f32,
            (self.snare_amp * 2.2).clamp(0.0, 1.0) as f32,
            (self.hat_amp * 2.2).clamp(0.0, 1.0) as f32,
            aggregate.clamp(0.0, 1.0) as f32,
        ]
    }
}

/// The oscillator bank. Phases accumulate forever and are never reset;
/// the drum voices instead key off absolute time within the block.
pub struct VoiceBank {
    bass_phase: f64,
    sub_phase: f64,
    pad_phase: [f64; 3],
    lead_phase: f64,
}

impl Default for VoiceBank {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceBank {
    pub fn new() -> Self {
        Self {
            bass_phase: 0.0,
            sub_phase: 0.0,
            pad_phase: [0.0; 3],
            lead_phase: 0.0,
        }
    }

    /// Render `n` raw mix samples for the plan into `out` (cleared first).
    /// The output is the unlimited voice sum; the mixer stage soft-clips
    /// and quantizes it.
    pub fn render(&mut self, plan: &StepPlan, n: usize, out: &mut Vec<f32>) {
        out.clear();
        out.reserve(n);

        let rate = f64::from(SAMPLE_RATE);
        let len = n as f64;

        for i in 0..n {
            let g = i as f64 / len;
            let t = i as f64 / rate;
            let fade = 1.0 - g;

            self.bass_phase += TAU * plan.bass_hz / rate;
            self.sub_phase += TAU * plan.sub_hz / rate;
            let bass_env = fade.powf(1.08);
            let bass = self.bass_phase.sin() * plan.bass_gain * bass_env;
            let sub = self.sub_phase.sin() * plan.sub_gain * bass_env;

            let pad_env = fade.powf(plan.pad_shape);
            let mut pad = 0.0;
            for (phase, hz) in self.pad_phase.iter_mut().zip(plan.pad_hz) {
                *phase += TAU * hz / rate;
                pad += phase.sin();
            }
            pad = pad / 3.0 * plan.pad_gain * pad_env;

            let mut lead = 0.0;
            if let Some(hz) = plan.lead_hz {
                self.lead_phase += TAU * hz / rate;
                let lead_env = fade.powf(1.9);
                lead = (self.lead_phase.sin() + 0.45 * (self.lead_phase * 2.0).sin())
                    * plan.lead_gain
                    * lead_env;
            }

            let mut kick = 0.0;
            if plan.kick_amp > 0.0 {
                let env = (-13.0 * g).exp();
                let sweep_hz = 145.0 - 95.0 * g;
                kick = (TAU * sweep_hz * t).sin() * plan.kick_amp * env;
            }

            let mut snare = 0.0;
            if plan.snare_amp > 0.0 {
                let env = (-22.0 * g).exp();
                let body = (TAU * 180.0 * t).sin();
                let ring = (TAU * 330.0 * t).sin();
                snare = (0.7 * body + 0.3 * ring) * plan.snare_amp * env;
            }

            let mut hat = 0.0;
            if plan.hat_amp > 0.0 {
                let env = (-56.0 * g).exp();
                let lo = (TAU * 5200.0 * t).sin();
                let hi = (TAU * 7200.0 * t).sin();
                hat = (0.65 * lo + 0.35 * hi) * plan.hat_amp * env;
            }

            out.push((bass + sub + pad + lead + kick + snare + hat) as f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadtune_types::PRESETS;

    fn quiet_components() -> ComponentLevels {
        ComponentLevels {
            cpu_drive: 0.0,
            ram_warmth: 0.0,
            gpu_motion: 0.0,
            vram_spark: 0.0,
        }
    }

    fn plan(step: u64) -> StepPlan {
        let mut rng = 1;
        StepPlan::for_step(&PRESETS[0], step, quiet_components(), &mut rng)
    }

    #[test]
    fn downbeat_plan_has_drums() {
        // Night Tape opens every bar with a kick.
        assert!(plan(0).has_drums());
    }

    #[test]
    fn rest_step_has_no_lead() {
        // Night Tape's motif rests on step 1.
        assert!(plan(1).lead_hz.is_none());
        assert!(plan(0).lead_hz.is_some());
    }

    #[test]
    fn gains_scale_with_drive() {
        let mut rng = 1;
        let hot = ComponentLevels {
            cpu_drive: 1.0,
            ram_warmth: 1.0,
            gpu_motion: 0.0,
            vram_spark: 1.0,
        };
        let quiet = plan(0);
        let loud = StepPlan::for_step(&PRESETS[0], 0, hot, &mut rng);
        assert!(loud.bass_gain > quiet.bass_gain);
        assert!(loud.pad_gain > quiet.pad_gain);
        assert!(loud.kick_amp > quiet.kick_amp);
        assert!(loud.kick_amp <= 1.0);
    }

    #[test]
    fn levels_are_normalized() {
        let mut rng = 1;
        let hot = ComponentLevels {
            cpu_drive: 1.0,
            ram_warmth: 1.0,
            gpu_motion: 1.0,
            vram_spark: 1.0,
        };
        for step in 0..16 {
            let plan = StepPlan::for_step(&PRESETS[0], step, hot, &mut rng);
            for level in plan.levels() {
                assert!((0.0..=1.0).contains(&level));
            }
        }
    }

    #[test]
    fn phases_persist_across_blocks() {
        let mut bank = VoiceBank::new();
        let plan = plan(2);
        let mut first = Vec::new();
        let mut second = Vec::new();
        bank.render(&plan, 512, &mut first);
        bank.render(&plan, 512, &mut second);
        // A fresh bank replays the first block exactly; the continuing bank
        // must not, because its phases carried over.
        let mut fresh = VoiceBank::new();
        let mut replay = Vec::new();
        fresh.render(&plan, 512, &mut replay);
        assert_eq!(first, replay);
        assert_ne!(first, second);
    }

    #[test]
    fn drum_free_step_is_all_sustained_voices() {
        // Night Tape step 2 has no kick, snare, or hat bit set; zeroing the
        // drum amplitudes must not change a single sample.
        let clear = plan(2);
        assert!(!clear.has_drums());
        let mut bank_a = VoiceBank::new();
        let mut bank_b = VoiceBank::new();
        let (mut with, mut without) = (Vec::new(), Vec::new());
        bank_a.render(&clear, 800, &mut with);
        bank_b.render(&clear.clone().without_drums(), 800, &mut without);
        assert_eq!(with, without);

        // On a downbeat the drums do change the waveform.
        let busy = plan(0);
        let mut bank_c = VoiceBank::new();
        let mut bank_d = VoiceBank::new();
        let (mut loud, mut muted) = (Vec::new(), Vec::new());
        bank_c.render(&busy, 800, &mut loud);
        bank_d.render(&busy.clone().without_drums(), 800, &mut muted);
        assert_ne!(loud, muted);
    }

    #[test]
    fn silent_components_still_produce_audio() {
        // Base gains are nonzero even with all drives at zero.
        let mut bank = VoiceBank::new();
        let mut out = Vec::new();
        bank.render(&plan(0), 1024, &mut out);
        assert_eq!(out.len(), 1024);
        assert!(out.iter().any(|&s| s.abs() > 1e-4));
    }

    #[test]
    fn same_seed_renders_identical_blocks() {
        let components = quiet_components();
        let mut rng_a = 42;
        let mut rng_b = 42;
        let plan_a = StepPlan::for_step(&PRESETS[4], 8, components, &mut rng_a);
        let plan_b = StepPlan::for_step(&PRESETS[4], 8, components, &mut rng_b);
        let mut bank_a = VoiceBank::new();
        let mut bank_b = VoiceBank::new();
        let (mut out_a, mut out_b) = (Vec::new(), Vec::new());
        bank_a.render(&plan_a, 700, &mut out_a);
        bank_b.render(&plan_b, 700, &mut out_b);
        assert_eq!(out_a, out_b);
    }
}
