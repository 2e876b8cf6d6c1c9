//! Normalized mono audio buffers passed between pipeline stages.

use std::sync::Arc;

/// Scale used when converting normalized samples to 16-bit PCM.
pub(crate) const I16_SCALE_OUT: f32 = 32767.0;

/// Scale used when converting 16-bit PCM to normalized samples.
pub(crate) const I16_SCALE_IN: f32 = 32768.0;

/// Immutable buffer of normalized (-1.0..1.0) mono samples at a fixed rate.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Builds a frame from 16-bit PCM, normalizing by 1/32768.
    pub fn from_i16(pcm: &[i16], sample_rate: u32) -> Self {
        let samples: Vec<f32> = pcm.iter().map(|&s| s as f32 / I16_SCALE_IN).collect();
        Self::new(samples, sample_rate)
    }

    /// A frame of `len` zero samples.
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0f32; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the buffer in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Clamps to [-1.0, 1.0] and scales to signed 16-bit.
pub fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * I16_SCALE_OUT) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_i16_normalizes() {
        let frame = AudioFrame::from_i16(&[0, 16384, -32768], 16000);
        assert_eq!(frame.samples(), &[0.0, 0.5, -1.0]);
        assert_eq!(frame.sample_rate(), 16000);
    }

    #[test]
    fn test_silence_and_duration() {
        let frame = AudioFrame::silence(16000, 16000);
        assert_eq!(frame.len(), 16000);
        assert_eq!(frame.duration_ms(), 1000);
        assert!(frame.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_empty_frame() {
        let frame = AudioFrame::new(Vec::<f32>::new(), 16000);
        assert!(frame.is_empty());
        assert_eq!(frame.duration_ms(), 0);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let frame = AudioFrame::silence(320, 16000);
        let copy = frame.clone();
        assert_eq!(frame.samples().as_ptr(), copy.samples().as_ptr());
    }

    #[test]
    fn test_to_i16_clamps() {
        assert_eq!(to_i16(2.0), 32767);
        assert_eq!(to_i16(-2.0), -32767);
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(0.5), 16383);
    }
}
