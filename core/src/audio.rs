use crate::FormatError;
use std::time::Duration;

/// Interleaved, normalized samples together with their layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    channel_count: u16,
    sample_rate_hz: u32,
}

impl DecodedAudio {
    pub fn new(
        samples: Vec<f32>,
        channel_count: u16,
        sample_rate_hz: u32,
    ) -> Result<Self, FormatError> {
        if channel_count < 1 {
            return Err(FormatError::UnsupportedChannelCount);
        }

        if samples.len() % usize::from(channel_count) != 0 {
            return Err(FormatError::MisalignedSampleData);
        }

        Ok(DecodedAudio {
            samples,
            channel_count,
            sample_rate_hz,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channel_count)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate_hz == 0 {
            return Duration::ZERO;
        }

        Duration::from_secs_f64(
            self.frame_count() as f64 / f64::from(self.sample_rate_hz),
        )
    }

    /// De-interleaved copy of a single channel.
    pub fn channel(&self, index: usize) -> Option<Vec<f32>> {
        let channels = usize::from(self.channel_count);

        if index >= channels {
            return None;
        }

        Some(
            self.samples
                .iter()
                .skip(index)
                .step_by(channels)
                .copied()
                .collect(),
        )
    }

    pub fn channels(&self) -> Vec<Vec<f32>> {
        (0..usize::from(self.channel_count))
            .flat_map(|ch| self.channel(ch))
            .collect()
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0f32, |peak, s| peak.max(s.abs()))
    }
}
