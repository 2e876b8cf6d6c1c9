use crate::audio::AudioFrame;
use crate::defaults;
use crate::error::{Result, VoxnexusError};

/// Frames handed to an inferencer. Ends when the session stops.
pub type FrameStream<'a> = Box<dyn Iterator<Item = AudioFrame> + 'a>;

/// Incremental transcripts. Each item is the full text recognized so far.
pub type TranscriptStream<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Streaming speech recognition.
///
/// Implementations may buffer any number of frames before yielding, but must
/// end their stream once `frames` is exhausted so the session worker can exit.
/// An `Err` item is fatal to the session run.
pub trait SpeechInferencer: Send {
    /// Consumes `frames` lazily and yields transcripts as they become available.
    fn transcripts<'a>(&'a mut self, frames: FrameStream<'a>) -> TranscriptStream<'a>;

    /// Name for logging/debugging.
    fn name(&self) -> &str {
        "inferencer"
    }
}

impl<T: SpeechInferencer + ?Sized> SpeechInferencer for Box<T> {
    fn transcripts<'a>(&'a mut self, frames: FrameStream<'a>) -> TranscriptStream<'a> {
        (**self).transcripts(frames)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Reference inferencer that "recognizes" one digit per fixed span of audio.
///
/// Every `sample_rate * seconds_per_digit` samples appends the next digit
/// (`1, 2, ... 9, 0, 1, ...`) and yields all digits so far, space separated.
/// Digits accumulate for the lifetime of the instance, across session restarts.
#[derive(Debug, Clone)]
pub struct DigitCounterInferencer {
    sample_rate: u32,
    seconds_per_digit: f64,
    digits: Vec<String>,
    counter: u64,
}

impl Default for DigitCounterInferencer {
    fn default() -> Self {
        Self::new(defaults::SAMPLE_RATE, defaults::SECONDS_PER_DIGIT)
    }
}

impl DigitCounterInferencer {
    pub fn new(sample_rate: u32, seconds_per_digit: f64) -> Self {
        Self {
            sample_rate,
            seconds_per_digit,
            digits: Vec::new(),
            counter: 1,
        }
    }

    /// Samples consumed per recognized digit (at least one).
    pub fn samples_per_digit(&self) -> usize {
        ((self.sample_rate as f64 * self.seconds_per_digit) as usize).max(1)
    }

    fn next_transcript(&mut self) -> String {
        self.digits.push((self.counter % 10).to_string());
        self.counter += 1;
        self.digits.join(" ")
    }
}

impl SpeechInferencer for DigitCounterInferencer {
    fn transcripts<'a>(&'a mut self, frames: FrameStream<'a>) -> TranscriptStream<'a> {
        let needed = self.samples_per_digit();
        Box::new(DigitStream {
            inferencer: self,
            frames,
            buffered: 0,
            needed,
        })
    }

    fn name(&self) -> &str {
        "digit-counter"
    }
}

struct DigitStream<'a> {
    inferencer: &'a mut DigitCounterInferencer,
    frames: FrameStream<'a>,
    buffered: usize,
    needed: usize,
}

impl Iterator for DigitStream<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.buffered >= self.needed {
                self.buffered -= self.needed;
                return Some(Ok(self.inferencer.next_transcript()));
            }
            let frame = self.frames.next()?;
            self.buffered += frame.len();
        }
    }
}

/// Inferencer that replays a fixed list of transcripts, one per input frame.
///
/// Frames beyond the script are consumed silently. Optionally fails after a
/// number of transcripts, which makes it handy for exercising fault paths.
#[derive(Debug, Clone)]
pub struct ScriptedInferencer {
    script: Vec<String>,
    fail_after: Option<usize>,
}

impl ScriptedInferencer {
    pub fn new<S: Into<String>>(script: impl IntoIterator<Item = S>) -> Self {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            fail_after: None,
        }
    }

    /// Yields an inference error once `count` transcripts have been produced.
    pub fn with_failure_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl SpeechInferencer for ScriptedInferencer {
    fn transcripts<'a>(&'a mut self, frames: FrameStream<'a>) -> TranscriptStream<'a> {
        let script = &self.script;
        let fail_after = self.fail_after;
        Box::new(frames.enumerate().filter_map(move |(i, _frame)| {
            if fail_after.is_some_and(|n| i >= n) {
                return Some(Err(VoxnexusError::Inference {
                    message: format!("scripted failure after {} transcripts", i),
                }));
            }
            script.get(i).cloned().map(Ok)
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
