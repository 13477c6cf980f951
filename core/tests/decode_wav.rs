use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use wavclip_core::{decode, load_wave, read_wave, read_wave_info, FormatError};

fn spec(channels: u16, bits: u16, sample_format: SampleFormat) -> WavSpec {
    WavSpec {
        channels,
        sample_rate: 44100,
        bits_per_sample: bits,
        sample_format,
    }
}

fn write_wav<S: hound::Sample + Copy>(spec: WavSpec, samples: &[S]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());

    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    cursor.into_inner()
}

fn sweep_i16() -> Vec<i16> {
    let mut samples: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).collect();
    samples.extend([i16::MIN, -1, 0, 1, i16::MAX]);
    samples
}

#[test]
fn sixteen_bit_matches_hound() {
    let written = sweep_i16();
    let bytes = write_wav(spec(1, 16, SampleFormat::Int), &written);

    let audio = decode(&bytes).unwrap();
    let expected: Vec<f32> = WavReader::new(Cursor::new(&bytes))
        .unwrap()
        .samples::<i16>()
        .map(|s| f32::from(s.unwrap()) / 32768.0)
        .collect();

    assert_eq!(audio.samples(), &expected[..]);
    assert!(audio.samples().iter().all(|s| (-1.0..=1.0).contains(s)));
}

#[test]
fn eight_bit_covers_full_range() {
    let written: Vec<i8> = (i8::MIN..=i8::MAX).collect();
    let bytes = write_wav(spec(1, 8, SampleFormat::Int), &written);

    let audio = decode(&bytes).unwrap();

    assert_eq!(audio.samples().len(), 256);
    assert_eq!(audio.samples()[0], -1.0);
    assert_eq!(audio.samples()[255], 0.9921875);
    assert!(audio
        .samples()
        .iter()
        .all(|s| (-1.0..=0.9921875).contains(s)));

    for (&w, &s) in written.iter().zip(audio.samples()) {
        assert_eq!(s, f32::from(w) / 128.0);
    }
}

#[test]
fn stereo_frames_stay_aligned() {
    let written: Vec<i16> = (0..64).map(|i| i * 100 - 3200).collect();
    let bytes = write_wav(spec(2, 16, SampleFormat::Int), &written);

    let audio = decode(&bytes).unwrap();

    assert_eq!(audio.channel_count(), 2);
    assert_eq!(audio.sample_rate_hz(), 44100);
    assert_eq!(audio.samples().len() % 2, 0);
    assert_eq!(audio.frame_count(), 32);
    assert_eq!(audio.channel(0).unwrap()[1], f32::from(written[2]) / 32768.0);
    assert_eq!(audio.channel(1).unwrap()[1], f32::from(written[3]) / 32768.0);
}

#[test]
fn float_samples_pass_through() {
    let written = [0.0f32, 0.25, -0.5, 1.0, -1.0, 1.5];
    let bytes = write_wav(spec(1, 32, SampleFormat::Float), &written);

    let audio = decode(&bytes).unwrap();

    assert_eq!(audio.samples(), &written[..]);
}

#[test]
fn decoding_is_deterministic() {
    let bytes = write_wav(spec(2, 16, SampleFormat::Int), &sweep_i16()[..676]);

    let first = decode(&bytes).unwrap();
    let second = decode(&bytes).unwrap();

    let bits = |s: &[f32]| s.iter().map(|f| f.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(first.samples()), bits(second.samples()));
}

#[test]
fn truncating_a_valid_file_never_panics() {
    let bytes = write_wav(spec(2, 16, SampleFormat::Int), &[1i16, -1, 2, -2]);

    for len in 0..bytes.len() {
        let result = decode(&bytes[..len]);

        if len < 44 {
            assert_eq!(result, Err(FormatError::TruncatedHeader));
        } else {
            assert!(result.is_err(), "decoded {} byte prefix", len);
        }
    }
}

#[test]
fn header_info_exposed() {
    let bytes = write_wav(spec(1, 8, SampleFormat::Int), &[0i8, 1, 2, 3]);

    let info = read_wave_info(Cursor::new(bytes)).unwrap();

    assert_eq!(info.header.audio_format, 1);
    assert_eq!(info.header.bit_depth, 8);
    assert_eq!(info.header.subchunk1_size, 16);
    assert_eq!(info.audio.frame_count(), 4);
}

#[test]
fn reads_from_stream_and_file() {
    let written = [0i16, 16384, -16384];
    let bytes = write_wav(spec(1, 16, SampleFormat::Int), &written);

    let from_stream = read_wave(Cursor::new(bytes.clone())).unwrap();
    assert_eq!(from_stream.samples(), &[0.0, 0.5, -0.5]);

    let path = std::env::temp_dir()
        .join(format!("wavclip-core-test-{}.wav", std::process::id()));
    std::fs::write(&path, &bytes).unwrap();
    let from_file = load_wave(&path);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(from_file.unwrap(), from_stream);
}
