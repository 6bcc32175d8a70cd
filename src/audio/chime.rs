use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;
const TONE_SECS: f32 = 0.22;
const DECAY_PER_SEC: f32 = 9.0;
const AMPLITUDE: f32 = 0.25;

/// Two rising tones with an exponential decay, played when a focus session ends.
pub struct CompletionChime {
    tones: [f32; 2],
    sample_rate: u32,
    samples_per_tone: usize,
    num_sample: usize,
}

impl CompletionChime {
    pub fn new() -> Self {
        Self::with_tones(880.0, 1318.5)
    }

    pub fn with_tones(first_hz: f32, second_hz: f32) -> Self {
        Self {
            tones: [first_hz, second_hz],
            sample_rate: SAMPLE_RATE,
            samples_per_tone: (SAMPLE_RATE as f32 * TONE_SECS) as usize,
            num_sample: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn total_samples(&self) -> usize {
        self.samples_per_tone * self.tones.len()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(self.total_samples() as f32 / self.sample_rate as f32)
    }
}

impl Default for CompletionChime {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for CompletionChime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples() {
            return None;
        }

        let tone = self.num_sample / self.samples_per_tone;
        let offset = self.num_sample % self.samples_per_tone;
        self.num_sample += 1;

        let t = offset as f32 / self.sample_rate as f32;
        let envelope = (-DECAY_PER_SEC * t).exp();
        Some((2.0 * PI * self.tones[tone] * t).sin() * envelope * AMPLITUDE)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total_samples().saturating_sub(self.num_sample);
        (left, Some(left))
    }
}

#[cfg(target_os = "macos")]
impl rodio::Source for CompletionChime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples().saturating_sub(self.num_sample))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration())
    }
}
