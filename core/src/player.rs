use crate::{DecodedAudio, Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SampleRate, SupportedStreamConfig};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

const CD_SAMPLE_RATE: u32 = 44100;
const DVD_SAMPLE_RATE: u32 = 48000;
const DVD_DIVISOR: u32 = 8000;
const NO_OUTPUT: &str = "No output device found";

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub audio: DecodedAudio,
    /// Linear gain in `0.0..=1.0`
    pub volume: f32,
    /// Frame to jump back to when looping
    pub loop_start: Option<usize>,
    /// Frame at which playback ends (exclusive)
    pub end: Option<usize>,
}

#[derive(Debug)]
pub struct Player {
    /// Interleaved, resampled, volume-scaled samples
    samples: Arc<Vec<f32>>,
    channels: usize,
    playback_rate: u32,
    loop_start: usize,
    end: usize,
    state: PlayerState,
    /// Current frame at the playback rate
    playhead: Arc<AtomicUsize>,
    input_rate: u32,
}

impl Player {
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let audio = &config.audio;
        let frames = audio.frame_count();
        let loop_start = config.loop_start.unwrap_or(0);
        let end = config.end.unwrap_or(frames);

        if audio.sample_rate_hz() == 0 {
            return Err(playback_msg("Sample rate must be non-zero"));
        }

        if !config.volume.is_finite() || !(0.0..=1.0).contains(&config.volume)
        {
            return Err(Error::Playback(format!(
                "Volume {} outside 0.0..=1.0",
                config.volume
            )));
        }

        if loop_start >= frames {
            return Err(playback_msg("Loop start beyond input buffer"));
        }

        if end > frames {
            return Err(playback_msg("End beyond input buffer"));
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| playback_msg(NO_OUTPUT))?;

        let stream_config =
            stream_config(&device, audio.sample_rate_hz(), audio.channel_count())?;
        let playback_rate = stream_config.sample_rate().0;

        tracing::info!(
            "Preparing {} frame(s) x {} channel(s), {}Hz -> {}Hz",
            frames,
            audio.channel_count(),
            audio.sample_rate_hz(),
            playback_rate,
        );

        let resampled =
            resample(audio.sample_rate_hz(), playback_rate, &audio.channels())?;
        let playback_frames = resampled.first().map_or(0, Vec::len);

        let end = scale_index(audio.sample_rate_hz(), playback_rate, end)
            .ok_or_else(|| playback_msg("Scaled end too large"))?
            .min(playback_frames);

        let loop_start =
            scale_index(audio.sample_rate_hz(), playback_rate, loop_start)
                .ok_or("Scaled loop start too large")
                .and_then(|start| {
                    if start < end {
                        Ok(start)
                    } else {
                        Err("Loop start is AT or AFTER end")
                    }
                })
                .map_err(playback_msg)?;

        let samples = interleave(&resampled, end, config.volume);

        Ok(Player {
            samples: Arc::new(samples),
            channels: usize::from(audio.channel_count()),
            playback_rate,
            loop_start,
            end,
            state: PlayerState::Stopped,
            playhead: Arc::new(AtomicUsize::new(0)),
            input_rate: audio.sample_rate_hz(),
        })
    }

    /// Start playback at `play_from`, a frame index at the clip's own rate.
    pub fn play(&mut self, play_from: usize, looped: bool) -> Result<()> {
        let play_from =
            scale_index(self.input_rate, self.playback_rate, play_from)
                .ok_or_else(|| playback_msg("Bad playhead position"))?;

        self.play_from_playback_position(play_from, looped)
    }

    fn play_from_playback_position(
        &mut self,
        play_from: usize,
        looped: bool,
    ) -> Result<()> {
        if let PlayerState::Playing(_) = self.state {
            self.stop();
        }

        self.playhead.store(play_from, Ordering::Relaxed);

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| playback_msg(NO_OUTPUT))?;

        // Looked up again rather than cached alongside the device
        let clip_channels = u16::try_from(self.channels)
            .map_err(|_| playback_msg("Too many channels"))?;
        let stream_config =
            stream_config(&device, self.playback_rate, clip_channels)?;

        if stream_config.sample_rate().0 != self.playback_rate {
            return Err(Error::Playback(format!(
                "Failed to acquire stream config @ {}Hz",
                self.playback_rate
            )));
        }

        let loop_start = if looped { Some(self.loop_start) } else { None };
        let out_channels = stream_config.channels();

        let stream = Box::new(
            device
                .build_output_stream(
                    &stream_config.into(),
                    stream_callback(
                        Arc::clone(&self.samples),
                        Arc::clone(&self.playhead),
                        loop_start,
                        self.end,
                        self.channels,
                        out_channels,
                    ),
                    move |e| tracing::warn!("Output stream error: {}", e),
                    None,
                )
                .map_err(playback_error)?,
        );

        stream.play().map_err(playback_error)?;

        tracing::info!(
            "Playing from frame {} ({})",
            play_from,
            if looped { "looped" } else { "once" }
        );

        self.state = PlayerState::Playing(stream);

        Ok(())
    }

    pub fn stop(&mut self) {
        // Stream gets dropped if state was previously Playing
        self.state = PlayerState::Stopped;

        self.playhead.store(0, Ordering::Relaxed);
    }

    /// Frames left before the end marker, at the clip's own sample rate.
    pub fn frames_remaining(&self) -> usize {
        let playback_position = self.playhead.load(Ordering::Relaxed);
        let playback_frames = self.end.saturating_sub(playback_position);
        scale_index(self.playback_rate, self.input_rate, playback_frames)
            .unwrap_or(0)
    }
}

fn playback_error(e: impl ToString) -> Error {
    Error::Playback(e.to_string())
}

fn playback_msg(msg: &str) -> Error {
    Error::Playback(String::from(msg))
}

fn scale_index(inrate: u32, outrate: u32, index: usize) -> Option<usize> {
    if inrate == 0 {
        return None;
    }

    u64::try_from(index)
        .ok()
        .and_then(|idx| idx.checked_mul(outrate.into()))
        .and_then(|idx| (idx / u64::from(inrate)).try_into().ok())
}

/// Resample each channel from `inrate` to `outrate`.
fn resample(
    inrate: u32,
    outrate: u32,
    channels: &[Vec<f32>],
) -> Result<Vec<Vec<f32>>> {
    if inrate == outrate {
        return Ok(channels.to_vec());
    }

    let frames = channels.first().map_or(0, Vec::len);
    let sinc_len = 256usize;
    let f_cutoff = 1f32 + 1f32 / sinc_len as f32;

    let config = SincInterpolationParameters {
        sinc_len,
        f_cutoff,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Cubic,
        window: WindowFunction::Blackman,
    };

    let mut interpolator = SincFixedIn::<f32>::new(
        f64::from(outrate) / f64::from(inrate),
        1.0,
        config,
        frames,
        channels.len(),
    )
    .map_err(playback_error)?;

    interpolator.process(channels, None).map_err(playback_error)
}

/// Interleave the first `end` frames of each channel, scaled by `volume`.
fn interleave(channels: &[Vec<f32>], end: usize, volume: f32) -> Vec<f32> {
    let mut samples = Vec::with_capacity(end * channels.len());

    for frame in 0..end {
        for channel in channels {
            let s = channel.get(frame).copied().unwrap_or(f32::EQUILIBRIUM);
            samples.push(s * volume);
        }
    }

    samples
}

/// Source sample to play on output channel `out_ch`.
#[inline]
fn map_channel(frame: &[f32], out_ch: usize) -> f32 {
    if frame.len() == 1 {
        frame[0]
    } else {
        frame.get(out_ch).copied().unwrap_or(f32::EQUILIBRIUM)
    }
}

fn stream_config(
    device: &cpal::Device,
    inrate: u32,
    clip_channels: u16,
) -> Result<SupportedStreamConfig> {
    let preferred_rate = if inrate % DVD_DIVISOR == 0 {
        DVD_SAMPLE_RATE
    } else {
        CD_SAMPLE_RATE
    };

    let configs = device
        .supported_output_configs()
        .map_err(playback_error)?
        .filter(|cfg| cfg.sample_format() == SampleFormat::F32)
        .collect::<Vec<_>>();

    let with_channels = |channels: u16| {
        configs
            .iter()
            .filter(|cfg| cfg.channels() == channels)
            .copied()
            .collect::<Vec<_>>()
    };

    // Exact channel match first, then stereo, then mono, then anything
    let candidates = [clip_channels, 2, 1]
        .into_iter()
        .map(with_channels)
        .find(|cfgs| !cfgs.is_empty())
        .unwrap_or_else(|| configs.clone());

    let config = candidates
        .iter()
        .flat_map(|range| {
            let mut cfg =
                range.try_with_sample_rate(SampleRate(preferred_rate));

            if cfg.is_none() {
                if preferred_rate == DVD_SAMPLE_RATE {
                    cfg =
                        range.try_with_sample_rate(SampleRate(CD_SAMPLE_RATE));
                } else {
                    cfg =
                        range.try_with_sample_rate(SampleRate(DVD_SAMPLE_RATE));
                }
            }

            cfg
        })
        .next()
        .ok_or_else(|| {
            playback_msg("Could not find appropriate stream configuration")
        })?;

    tracing::debug!(
        "Stream config: {} channel(s) @ {}Hz",
        config.channels(),
        config.sample_rate().0
    );

    Ok(config)
}

fn stream_callback<T>(
    samples: Arc<Vec<f32>>,
    playhead: Arc<AtomicUsize>,
    loop_start: Option<usize>,
    in_end: usize,
    in_channels: usize,
    out_channels: u16,
) -> impl FnMut(&mut [f32], &'_ T) {
    let mut offset = playhead.load(Ordering::Relaxed);
    let out_channels = usize::from(out_channels).max(1);
    let total_frames = samples.len() / in_channels.max(1);
    let in_end = in_end.min(total_frames);

    move |buf: &mut [f32], _: &'_ _| {
        for out_frame in buf.chunks_mut(out_channels) {
            if offset >= in_end {
                match loop_start {
                    Some(start) if start < in_end => offset = start,
                    _ => {
                        out_frame.fill(f32::EQUILIBRIUM);
                        continue;
                    }
                }
            }

            let frame_start = offset * in_channels;
            let in_frame = &samples[frame_start..frame_start + in_channels];

            for (ch, out) in out_frame.iter_mut().enumerate() {
                *out = map_channel(in_frame, ch);
            }

            offset += 1;
        }

        playhead.store(offset.min(in_end), Ordering::Relaxed);
    }
}

enum PlayerState {
    Stopped,

    // Held so the stream lives until the state changes
    #[allow(unused)]
    Playing(Box<dyn StreamTrait>),
}

impl std::fmt::Debug for PlayerState {
    fn fmt(
        &self,
        formatter: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            PlayerState::Stopped => write!(formatter, "PlayerState::Stopped"),
            PlayerState::Playing(_) => {
                write!(formatter, "PlayerState::Playing(<stream>)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_callback(
        samples: Vec<f32>,
        loop_start: Option<usize>,
        in_channels: usize,
        out_channels: u16,
        out_len: usize,
    ) -> (Vec<f32>, usize) {
        let frames = samples.len() / in_channels;
        let playhead = Arc::new(AtomicUsize::new(0));
        let mut callback = stream_callback::<()>(
            Arc::new(samples),
            Arc::clone(&playhead),
            loop_start,
            frames,
            in_channels,
            out_channels,
        );

        let mut buf = vec![9.0; out_len];
        callback(&mut buf, &());

        (buf, playhead.load(Ordering::Relaxed))
    }

    fn config(samples: Vec<f32>, rate: u32) -> PlayerConfig {
        PlayerConfig {
            audio: DecodedAudio::new(samples, 1, rate).unwrap(),
            volume: 1.0,
            loop_start: None,
            end: None,
        }
    }

    fn rejection(config: &PlayerConfig) -> String {
        match Player::new(config) {
            Err(Error::Playback(msg)) => msg,
            other => panic!("expected playback error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert_eq!(
            rejection(&config(vec![0.0; 4], 0)),
            "Sample rate must be non-zero"
        );
    }

    #[test]
    fn rejects_volume_outside_unit_range() {
        for volume in [1.5, -0.1, f32::NAN, f32::INFINITY] {
            let cfg = PlayerConfig {
                volume,
                ..config(vec![0.0; 4], 8000)
            };
            assert!(rejection(&cfg).starts_with("Volume"));
        }
    }

    #[test]
    fn rejects_markers_beyond_clip() {
        let cfg = PlayerConfig {
            loop_start: Some(4),
            ..config(vec![0.0; 4], 8000)
        };
        assert_eq!(rejection(&cfg), "Loop start beyond input buffer");

        let cfg = PlayerConfig {
            end: Some(5),
            ..config(vec![0.0; 4], 8000)
        };
        assert_eq!(rejection(&cfg), "End beyond input buffer");

        assert_eq!(
            rejection(&config(Vec::new(), 8000)),
            "Loop start beyond input buffer"
        );
    }

    #[test]
    fn scales_indices_between_rates() {
        assert_eq!(scale_index(22050, 44100, 10), Some(20));
        assert_eq!(scale_index(48000, 44100, 48000), Some(44100));
        assert_eq!(scale_index(0, 44100, 1), None);
    }

    #[test]
    fn same_rate_skips_resampling() {
        let channels = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        assert_eq!(resample(44100, 44100, &channels).unwrap(), channels);
    }

    #[test]
    fn resampling_keeps_channel_count() {
        let channels = vec![vec![0.0; 2048], vec![0.0; 2048]];
        let out = resample(22050, 44100, &channels).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), out[1].len());
        assert!(out[0].len() > 2048);
    }

    #[test]
    fn interleaves_with_volume() {
        let channels = vec![vec![1.0, 0.5, 0.25], vec![-1.0, -0.5, -0.25]];

        assert_eq!(
            interleave(&channels, 2, 0.5),
            vec![0.5, -0.5, 0.25, -0.25]
        );
    }

    #[test]
    fn mono_duplicates_to_all_outputs() {
        let (buf, playhead) = run_callback(vec![0.1, 0.2], None, 1, 2, 6);

        assert_eq!(buf, vec![0.1, 0.1, 0.2, 0.2, 0.0, 0.0]);
        assert_eq!(playhead, 2);
    }

    #[test]
    fn stereo_to_mono_keeps_first_channel() {
        let (buf, _) = run_callback(vec![0.1, 0.9, 0.2, 0.8], None, 2, 1, 2);

        assert_eq!(buf, vec![0.1, 0.2]);
    }

    #[test]
    fn missing_channels_are_silent() {
        let (buf, _) = run_callback(vec![0.1, 0.9], None, 2, 3, 3);

        assert_eq!(buf, vec![0.1, 0.9, 0.0]);
    }

    #[test]
    fn looping_wraps_to_loop_start() {
        let (buf, playhead) =
            run_callback(vec![0.1, 0.2, 0.3], Some(1), 1, 1, 7);

        assert_eq!(buf, vec![0.1, 0.2, 0.3, 0.2, 0.3, 0.2, 0.3]);
        assert_eq!(playhead, 3);
    }
}
