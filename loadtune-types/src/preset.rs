//! Musical preset catalog.
//!
//! A preset fixes everything compositional: tempo anchor, root pitch, scale,
//! chord progression, lead motif, and the three drum patterns. Telemetry only
//! modulates around a preset; it never edits one. The catalog is immutable
//! data handed to the engine at startup.

/// One musical configuration.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    /// Anchor tempo in beats per minute; the live tempo drifts around this.
    pub base_tempo: f32,
    /// MIDI note of the scale root.
    pub root_midi: i32,
    /// Semitone offsets from the root, ascending.
    pub scale: &'static [i32],
    /// Scale-degree indices, one per bar, cycled. Must have length 8.
    pub progression: &'static [usize],
    /// 16-step lead melody; `None` is a rest. Must have length 16.
    pub motif: &'static [Option<i32>],
    /// 16-step drum patterns, 1 = hit. Must have length 16.
    pub kick: &'static [u8],
    pub snare: &'static [u8],
    pub hat: &'static [u8],
}

impl Preset {
    pub fn kick_hit(&self, step_in_bar: usize) -> bool {
        self.kick[step_in_bar] == 1
    }

    pub fn snare_hit(&self, step_in_bar: usize) -> bool {
        self.snare[step_in_bar] == 1
    }

    pub fn hat_hit(&self, step_in_bar: usize) -> bool {
        self.hat[step_in_bar] == 1
    }

    /// Chord root for a bar: root pitch plus the scale offset selected by the
    /// progression (both indices wrap).
    pub fn chord_root(&self, bar: u64) -> i32 {
        let degree = self.progression[(bar as usize) % self.progression.len()];
        self.root_midi + self.scale[degree % self.scale.len()]
    }

    fn validate(&self) -> Result<(), String> {
        if self.scale.len() < 5 {
            return Err(format!("preset '{}': scale has {} offsets, need at least 5", self.name, self.scale.len()));
        }
        if self.progression.len() != 8 {
            return Err(format!("preset '{}': progression has {} degrees, need 8", self.name, self.progression.len()));
        }
        if self.motif.len() != 16 {
            return Err(format!("preset '{}': motif has {} steps, need 16", self.name, self.motif.len()));
        }
        for (label, pattern) in [("kick", self.kick), ("snare", self.snare), ("hat", self.hat)] {
            if pattern.len() != 16 {
                return Err(format!("preset '{}': {} pattern has {} steps, need 16", self.name, label, pattern.len()));
            }
        }
        Ok(())
    }
}

/// The built-in catalog plus the rotation index.
#[derive(Debug, Clone)]
pub struct PresetBank {
    presets: &'static [Preset],
    index: usize,
}

/// Index of "Neon Drift", the default startup preset.
pub const DEFAULT_PRESET_INDEX: usize = 8;

impl PresetBank {
    pub fn new(initial_index: usize) -> Self {
        Self {
            presets: PRESETS,
            index: initial_index % PRESETS.len(),
        }
    }

    /// Check the length contracts of every preset. A violation is a
    /// configuration error and should abort startup.
    pub fn validate(&self) -> Result<(), String> {
        for preset in self.presets {
            preset.validate()?;
        }
        Ok(())
    }

    pub fn current(&self) -> &Preset {
        &self.presets[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Advance to the next preset, wrapping at the end of the catalog.
    pub fn rotate(&mut self) -> usize {
        self.index = (self.index + 1) % self.presets.len();
        self.index
    }
}

impl Default for PresetBank {
    fn default() -> Self {
        Self::new(DEFAULT_PRESET_INDEX)
    }
}

const MINOR7: &[i32] = &[0, 2, 3, 5, 7, 8, 10];
const DORIAN7: &[i32] = &[0, 2, 3, 5, 7, 9, 10];
const PENTA5: &[i32] = &[0, 3, 5, 7, 10];

const FOUR_FLOOR: &[u8] = &[1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0];
const BACKBEAT: &[u8] = &[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0];
const OFFBEAT_HAT: &[u8] = &[0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1];

pub static PRESETS: &[Preset] = &[
    Preset {
        name: "Night Tape",
        base_tempo: 72.0,
        root_midi: 50,
        scale: MINOR7,
        progression: &[0, 5, 3, 4, 0, 6, 5, 0],
        motif: &[
            Some(0), None, Some(7), None, Some(3), None, Some(5), None,
            Some(7), None, Some(10), None, Some(7), Some(5), Some(3), None,
        ],
        kick: FOUR_FLOOR,
        snare: BACKBEAT,
        hat: OFFBEAT_HAT,
    },
    Preset {
        name: "Rain Window",
        base_tempo: 68.0,
        root_midi: 53,
        scale: MINOR7,
        progression: &[0, 3, 5, 4, 0, 5, 3, 0],
        motif: &[
            Some(0), None, Some(3), None, Some(5), None, Some(7), None,
            Some(5), None, Some(3), None, Some(2), None, Some(0), None,
        ],
        kick: FOUR_FLOOR,
        snare: BACKBEAT,
        hat: &[0, 1, 0, 1, 0, 1, 1, 0, 0, 1, 0, 1, 0, 1, 0, 1],
    },
    Preset {
        name: "Dusk Walk",
        base_tempo: 76.0,
        root_midi: 57,
        scale: DORIAN7,
        progression: &[0, 4, 5, 3, 0, 2, 5, 0],
        motif: &[
            Some(0), None, Some(7), None, Some(9), None, Some(5), None,
            Some(3), None, Some(2), None, Some(5), Some(7), Some(9), None,
        ],
        kick: &[1, 0, 0, 1, 1, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0, 0],
        snare: &[0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0],
        hat: &[0, 1, 1, 1, 0, 1, 0, 1, 0, 1, 1, 1, 0, 1, 0, 1],
    },
    Preset {
        name: "Cozy Corner",
        base_tempo: 64.0,
        root_midi: 48,
        scale: PENTA5,
        progression: &[0, 2, 3, 2, 0, 3, 2, 0],
        motif: &[
            Some(0), None, Some(5), None, Some(7), None, Some(10), None,
            Some(7), None, Some(5), None, Some(3), None, Some(0), None,
        ],
        kick: FOUR_FLOOR,
        snare: BACKBEAT,
        hat: &[0, 1, 0, 1, 0, 0, 1, 0, 0, 1, 0, 1, 0, 0, 1, 0],
    },
    Preset {
        name: "Dusty Grooves",
        base_tempo: 82.0,
        root_midi: 55,
        scale: MINOR7,
        progression: &[0, 5, 6, 4, 0, 5, 3, 0],
        motif: &[
            Some(0), None, Some(7), Some(5), Some(3), None, Some(5), None,
            Some(7), None, Some(10), Some(7), Some(5), None, Some(3), None,
        ],
        kick: &[1, 0, 1, 0, 1, 0, 0, 0, 1, 0, 1, 0, 1, 0, 0, 0],
        snare: &[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0],
        hat: &[0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1],
    },
    Preset {
        name: "Subway Lights",
        base_tempo: 88.0,
        root_midi: 52,
        scale: MINOR7,
        progression: &[0, 4, 5, 3, 0, 2, 4, 0],
        motif: &[
            Some(0), Some(3), None, Some(7), None, Some(5), None, Some(10),
            Some(7), None, Some(5), None, Some(3), None, Some(2), None,
        ],
        kick: &[1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 0, 1, 0, 0, 0],
        snare: &[0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0],
        hat: &[0, 1, 1, 0, 0, 1, 1, 1, 0, 1, 1, 0, 0, 1, 1, 1],
    },
    Preset {
        name: "Cafe Late",
        base_tempo: 74.0,
        root_midi: 59,
        scale: DORIAN7,
        progression: &[0, 4, 2, 5, 0, 3, 4, 0],
        motif: &[
            Some(0), None, Some(3), None, Some(5), None, Some(7), None,
            Some(9), None, Some(7), None, Some(5), Some(3), Some(2), None,
        ],
        kick: &[1, 0, 0, 0, 1, 0, 1, 0, 1, 0, 0, 0, 1, 0, 0, 0],
        snare: BACKBEAT,
        hat: &[0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0],
    },
    Preset {
        name: "Moon Study",
        base_tempo: 60.0,
        root_midi: 54,
        scale: PENTA5,
        progression: &[0, 2, 3, 2, 0, 2, 3, 0],
        motif: &[
            Some(0), None, Some(5), None, Some(7), None, Some(10), None,
            Some(7), None, Some(5), None, Some(3), None, Some(0), None,
        ],
        kick: FOUR_FLOOR,
        snare: BACKBEAT,
        hat: &[0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0],
    },
    Preset {
        name: "Neon Drift",
        base_tempo: 96.0,
        root_midi: 49,
        scale: MINOR7,
        progression: &[0, 5, 3, 4, 0, 6, 5, 0],
        motif: &[
            Some(0), None, Some(7), None, Some(3), None, Some(5), None,
            Some(7), None, Some(10), None, Some(7), Some(5), Some(3), None,
        ],
        kick: FOUR_FLOOR,
        snare: BACKBEAT,
        hat: &[0, 1, 0, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 1, 0, 1],
    },
    Preset {
        name: "Morning Transit",
        base_tempo: 108.0,
        root_midi: 56,
        scale: DORIAN7,
        progression: &[0, 4, 5, 6, 0, 2, 4, 0],
        motif: &[
            Some(0), Some(2), None, Some(5), Some(7), None, Some(9), None,
            Some(10), None, Some(7), None, Some(5), Some(3), None, Some(2),
        ],
        kick: &[1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 0, 1, 1, 0, 0, 0],
        snare: &[0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 1, 0],
        hat: &[0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_passes_validation() {
        assert!(PresetBank::default().validate().is_ok());
    }

    #[test]
    fn catalog_has_ten_presets() {
        assert_eq!(PresetBank::default().len(), 10);
    }

    #[test]
    fn default_preset_is_neon_drift() {
        assert_eq!(PresetBank::default().current().name, "Neon Drift");
    }

    #[test]
    fn rotate_wraps_around() {
        let mut bank = PresetBank::new(0);
        for expected in 1..bank.len() {
            assert_eq!(bank.rotate(), expected);
        }
        assert_eq!(bank.rotate(), 0);
    }

    #[test]
    fn chord_root_wraps_progression_and_scale() {
        let bank = PresetBank::new(0);
        let preset = bank.current();
        // Bar 0 uses degree 0: root itself.
        assert_eq!(preset.chord_root(0), preset.root_midi);
        // Bar 8 wraps back to degree 0.
        assert_eq!(preset.chord_root(8), preset.chord_root(0));
    }

    #[test]
    fn invalid_progression_is_rejected() {
        let bad = Preset {
            progression: &[0, 1, 2],
            ..*PresetBank::new(0).current()
        };
        let err = bad.validate().unwrap_err();
        assert!(err.contains("progression"));
    }
}
