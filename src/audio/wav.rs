//! WAV file input and output.
//!
//! Input is downmixed to mono, resampled to the requested rate and normalized
//! so it can be fed to a session frame by frame.

use crate::audio::frame::{AudioFrame, to_i16};
use crate::defaults;
use crate::error::{Result, VoxnexusError};
use std::io::Read;
use std::path::Path;

/// A fully loaded, normalized mono clip.
#[derive(Debug, Clone)]
pub struct WavClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl WavClip {
    /// Reads WAV data and converts it to mono at `target_rate`.
    pub fn from_reader<R: Read>(reader: R, target_rate: u32) -> Result<Self> {
        let wav_reader = hound::WavReader::new(reader).map_err(|e| VoxnexusError::Wav {
            message: format!("Failed to parse WAV data: {}", e),
        })?;

        let spec = wav_reader.spec();
        let interleaved = read_normalized(wav_reader, spec)?;
        let mono = downmix_f32(&interleaved, spec.channels);
        let samples = resample(&mono, spec.sample_rate, target_rate);

        Ok(Self {
            samples,
            sample_rate: target_rate,
        })
    }

    /// Opens a WAV file and converts it to mono at `target_rate`.
    pub fn open(path: &Path, target_rate: u32) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), target_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Splits the clip into consecutive frames of `chunk_ms` (last one may be short).
    pub fn frames(&self, chunk_ms: u32) -> impl Iterator<Item = AudioFrame> + '_ {
        let chunk = ((self.sample_rate as u64 * chunk_ms as u64) / 1000).max(1) as usize;
        self.samples
            .chunks(chunk)
            .map(move |c| AudioFrame::new(c.to_vec(), self.sample_rate))
    }

    /// Frames of the default 100ms size.
    pub fn default_frames(&self) -> impl Iterator<Item = AudioFrame> + '_ {
        self.frames(defaults::WAV_CHUNK_MS)
    }
}

/// Writes normalized mono samples as a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| VoxnexusError::Wav {
        message: format!("Failed to write {}: {}", path.display(), e),
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for &s in samples {
        writer.write_sample(to_i16(s)).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}

fn read_normalized<R: Read>(reader: hound::WavReader<R>, spec: hound::WavSpec) -> Result<Vec<f32>> {
    let read_err = |e: hound::Error| VoxnexusError::Wav {
        message: format!("Failed to read WAV samples: {}", e),
    };
    match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_err),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_err)
        }
    }
}

fn downmix_f32(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|group| group.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[source_idx.min(samples.len() - 1)]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn from_reader_16khz_mono_normalizes() {
        let wav_data = make_wav_data(16000, 1, &[0, 16384, -16384, -32768]);
        let clip = WavClip::from_reader(Cursor::new(wav_data), 16000).unwrap();

        assert_eq!(clip.samples(), &[0.0, 0.5, -0.5, -1.0]);
        assert_eq!(clip.sample_rate(), 16000);
    }

    #[test]
    fn from_reader_stereo_downmixes_to_mono() {
        // Stereo pairs: (8192, 24576), (-16384, 16384)
        let wav_data = make_wav_data(16000, 2, &[8192, 24576, -16384, 16384]);
        let clip = WavClip::from_reader(Cursor::new(wav_data), 16000).unwrap();

        assert_eq!(clip.samples(), &[0.5, 0.0]);
    }

    #[test]
    fn from_reader_48khz_resamples_to_16khz() {
        let wav_data = make_wav_data(48000, 1, &vec![0i16; 48000]);
        let clip = WavClip::from_reader(Cursor::new(wav_data), 16000).unwrap();

        assert!(clip.samples().len() >= 15900 && clip.samples().len() <= 16100);
    }

    #[test]
    fn from_reader_44100hz_keeps_levels() {
        let wav_data = make_wav_data(44100, 1, &vec![16384i16; 44100]);
        let clip = WavClip::from_reader(Cursor::new(wav_data), 16000).unwrap();

        assert!(clip.samples().len() >= 15900 && clip.samples().len() <= 16100);
        assert!(clip.samples().iter().all(|&s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn from_reader_rejects_garbage() {
        let result = WavClip::from_reader(Cursor::new(b"not a wav file".to_vec()), 16000);
        match result {
            Err(VoxnexusError::Wav { message }) => assert!(message.contains("parse")),
            other => panic!("Expected Wav error, got {:?}", other),
        }
    }

    #[test]
    fn frames_split_into_100ms_chunks() {
        let wav_data = make_wav_data(16000, 1, &vec![1i16; 5000]);
        let clip = WavClip::from_reader(Cursor::new(wav_data), 16000).unwrap();

        let sizes: Vec<usize> = clip.default_frames().map(|f| f.len()).collect();
        assert_eq!(sizes, vec![1600, 1600, 1600, 200]);
    }

    #[test]
    fn write_then_read_preserves_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let samples = [0.0f32, 0.25, -0.25, 0.5];

        write_wav(&path, &samples, 24000).unwrap();
        let clip = WavClip::open(&path, 24000).unwrap();

        assert_eq!(clip.sample_rate(), 24000);
        for (a, b) in samples.iter().zip(clip.samples()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let result = WavClip::open(Path::new("/tmp/nonexistent_voxnexus_clip.wav"), 16000);
        assert!(matches!(result, Err(VoxnexusError::Io(_))));
    }
}
