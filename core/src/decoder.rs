use crate::header::read_i32_le;
use crate::{DecodedAudio, FormatError, WaveHeader};
use std::ops::Range;

const DATA_TAG: &[u8; 4] = b"data";

// Unsigned 8-bit and signed 16-bit PCM to float divisors
const U8_SCALE: f32 = 128.0;
const I16_SCALE: f32 = 32768.0;

/// Decode a complete in-memory WAV file into interleaved float samples.
///
/// 8-bit samples are mapped with `(b - 128) / 128`, 16-bit samples with
/// `v / 32768`, and 32-bit samples are read as IEEE floats and passed
/// through unscaled.
///
/// The bit depth is always read from offset 34, i.e. a 16-byte format
/// subchunk is assumed. The `data` chunk is located by scanning forward
/// byte-by-byte from the end of the format subchunk.
pub fn decode(buffer: &[u8]) -> Result<DecodedAudio, FormatError> {
    let header = WaveHeader::parse(buffer)?;

    tracing::debug!(
        "WAV header: format={} channels={} rate={}Hz bits={} fmt size={}",
        header.audio_format,
        header.channel_count,
        header.sample_rate_hz,
        header.bit_depth,
        header.subchunk1_size,
    );

    let data = locate_data(buffer, &header)?;

    tracing::debug!("data chunk at {}..{}", data.start, data.end);

    let bytes_per_sample = header.bytes_per_sample()?;

    if data.len() % bytes_per_sample != 0 {
        return Err(FormatError::MisalignedSampleData);
    }

    let raw = &buffer[data];
    let samples: Vec<f32> = match header.bit_depth {
        8 => raw.iter().map(|&b| decode_u8(b)).collect(),
        16 => raw
            .chunks_exact(2)
            .map(|c| decode_i16([c[0], c[1]]))
            .collect(),
        32 => raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        _ => return Err(FormatError::UnsupportedBitDepth),
    };

    DecodedAudio::new(samples, header.channel_count, header.sample_rate_hz)
}

/// Byte range of the sample data, validated against the buffer.
fn locate_data(
    buffer: &[u8],
    header: &WaveHeader,
) -> Result<Range<usize>, FormatError> {
    let tag_pos = header
        .data_scan_start()
        .and_then(|start| find_tag(buffer, start, DATA_TAG))
        .ok_or(FormatError::DataChunkNotFound)?;

    let size_pos = tag_pos + DATA_TAG.len();
    let data_size =
        read_i32_le(buffer, size_pos).ok_or(FormatError::DataSizeExceedsBuffer)?;

    let data_start = size_pos + 4;
    let data_size = usize::try_from(data_size)
        .ok()
        .filter(|&size| size > 0)
        .ok_or(FormatError::DataSizeExceedsBuffer)?;

    let data_end = data_start
        .checked_add(data_size)
        .filter(|&end| end <= buffer.len())
        .ok_or(FormatError::DataSizeExceedsBuffer)?;

    Ok(data_start..data_end)
}

/// First position at or after `start` where `tag` begins.
fn find_tag(buffer: &[u8], start: usize, tag: &[u8; 4]) -> Option<usize> {
    buffer
        .get(start..)?
        .windows(tag.len())
        .position(|window| window == tag)
        .map(|pos| pos + start)
}

#[inline]
fn decode_u8(b: u8) -> f32 {
    (i16::from(b) - 128) as f32 / U8_SCALE
}

#[inline]
fn decode_i16(bytes: [u8; 2]) -> f32 {
    f32::from(i16::from_le_bytes(bytes)) / I16_SCALE
}
