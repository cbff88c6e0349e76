//! Mix-bus limiting and PCM quantization.

/// Soft-limit one raw mix sample. The tanh stage absorbs voice pileups
/// without hard clipping; the 0.72 makeup keeps headroom for the backend.
pub fn soft_limit(sample: f32) -> f32 {
    (f64::from(sample) * 1.35).tanh() as f32 * 0.72
}

/// Limit and quantize a block of raw mix samples into little-endian
/// signed 16-bit PCM, appended to `pcm` (cleared first).
pub fn quantize_block(mix: &[f32], pcm: &mut Vec<u8>) {
    pcm.clear();
    pcm.reserve(mix.len() * 2);
    for &sample in mix {
        let limited = soft_limit(sample).clamp(-1.0, 1.0);
        let quantized = (limited * 32767.0).round() as i16;
        pcm.extend_from_slice(&quantized.to_le_bytes());
    }
}
