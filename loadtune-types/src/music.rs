//! Pitch math shared by the synthesis voices.

/// Convert a MIDI note number to frequency in Hz (A4 = 440 at note 69).
pub fn midi_to_hz(midi: i32) -> f32 {
    440.0 * 2.0_f32.powf((midi as f32 - 69.0) / 12.0)
}
