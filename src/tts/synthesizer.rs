use crate::audio::AudioFrame;
use crate::defaults;
use crate::error::Result;
use std::f32::consts::PI;

/// Synthesized audio for one call. Always finite.
pub type AudioStream<'a> = Box<dyn Iterator<Item = Result<AudioFrame>> + 'a>;

/// Text-to-speech.
///
/// Each call is independent and yields zero or more frames. An `Err` item is
/// fatal to the session run. Implementations must not block indefinitely.
pub trait SpeechSynthesizer: Send {
    fn synthesize<'a>(&'a mut self, text: &'a str) -> AudioStream<'a>;

    /// Name for logging/debugging.
    fn name(&self) -> &str {
        "synthesizer"
    }
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Box<T> {
    fn synthesize<'a>(&'a mut self, text: &'a str) -> AudioStream<'a> {
        (**self).synthesize(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Reference synthesizer: one sine tone per whitespace-separated token.
///
/// Tone frequency rises by `step_hz` with every token ever synthesized, so
/// consecutive outputs are audibly distinct.
#[derive(Debug, Clone)]
pub struct SineWaveSynthesizer {
    sample_rate: u32,
    seconds_per_token: f64,
    start_hz: f32,
    step_hz: f32,
    amplitude: f32,
    token_index: u64,
}

impl Default for SineWaveSynthesizer {
    fn default() -> Self {
        Self::new(defaults::TTS_SAMPLE_RATE)
    }
}

impl SineWaveSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            seconds_per_token: defaults::SECONDS_PER_TOKEN,
            start_hz: defaults::TONE_START_HZ,
            step_hz: defaults::TONE_STEP_HZ,
            amplitude: defaults::TONE_AMPLITUDE,
            token_index: 0,
        }
    }

    pub fn with_seconds_per_token(mut self, seconds: f64) -> Self {
        self.seconds_per_token = seconds;
        self
    }

    pub fn with_tone(mut self, start_hz: f32, step_hz: f32, amplitude: f32) -> Self {
        self.start_hz = start_hz;
        self.step_hz = step_hz;
        self.amplitude = amplitude;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples in one token's tone.
    pub fn samples_per_token(&self) -> usize {
        (self.sample_rate as f64 * self.seconds_per_token) as usize
    }

    fn next_tone(&mut self) -> AudioFrame {
        let freq = self.start_hz + self.step_hz * self.token_index as f32;
        self.token_index += 1;

        let rate = self.sample_rate as f32;
        let samples: Vec<f32> = (0..self.samples_per_token())
            .map(|n| (2.0 * PI * freq * n as f32 / rate).sin() * self.amplitude)
            .collect();
        AudioFrame::new(samples, self.sample_rate)
    }
}

impl SpeechSynthesizer for SineWaveSynthesizer {
    fn synthesize<'a>(&'a mut self, text: &'a str) -> AudioStream<'a> {
        Box::new(text.split_whitespace().map(move |_token| Ok(self.next_tone())))
    }

    fn name(&self) -> &str {
        "sine-wave"
    }
}
