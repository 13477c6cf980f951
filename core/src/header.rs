use crate::FormatError;

/// Size of the canonical header: RIFF descriptor, 16-byte `fmt ` chunk and
/// the `data` chunk id/size pair.
pub const CANONICAL_HEADER_LEN: usize = 44;

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_PREAMBLE_LEN: usize = 8;

const SUBCHUNK1_SIZE_OFFSET: usize = 16;
const AUDIO_FORMAT_OFFSET: usize = 20;
const CHANNELS_OFFSET: usize = 22;
const SAMPLE_RATE_OFFSET: usize = 24;
// Assumes a 16-byte format subchunk
const BIT_DEPTH_OFFSET: usize = 34;

/// Format description read from fixed offsets of a WAV buffer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct WaveHeader {
    pub audio_format: u16,
    pub channel_count: u16,
    pub sample_rate_hz: u32,
    pub bit_depth: u16,
    pub subchunk1_size: i32,
}

impl WaveHeader {
    pub fn parse(buffer: &[u8]) -> Result<Self, FormatError> {
        if buffer.len() < CANONICAL_HEADER_LEN {
            return Err(FormatError::TruncatedHeader);
        }

        let subchunk1_size = read_i32_le(buffer, SUBCHUNK1_SIZE_OFFSET)
            .ok_or(FormatError::TruncatedHeader)?;
        let audio_format = read_u16_le(buffer, AUDIO_FORMAT_OFFSET)
            .ok_or(FormatError::TruncatedHeader)?;
        let channel_count = read_u16_le(buffer, CHANNELS_OFFSET)
            .ok_or(FormatError::TruncatedHeader)?;
        let sample_rate_hz = read_u32_le(buffer, SAMPLE_RATE_OFFSET)
            .ok_or(FormatError::TruncatedHeader)?;
        let bit_depth = read_u16_le(buffer, BIT_DEPTH_OFFSET)
            .ok_or(FormatError::TruncatedHeader)?;

        // Signed on disk; anything past i16::MAX would read as negative
        if channel_count < 1 || channel_count > i16::MAX as u16 {
            return Err(FormatError::UnsupportedChannelCount);
        }

        Ok(WaveHeader {
            audio_format,
            channel_count,
            sample_rate_hz,
            bit_depth,
            subchunk1_size,
        })
    }

    /// Offset at which the scan for the `data` tag begins.
    ///
    /// `None` when the declared format subchunk size is negative, which
    /// places the start outside any buffer.
    pub fn data_scan_start(&self) -> Option<usize> {
        usize::try_from(self.subchunk1_size)
            .ok()
            .and_then(|size| size.checked_add(RIFF_HEADER_LEN + CHUNK_PREAMBLE_LEN))
    }

    pub fn bytes_per_sample(&self) -> Result<usize, FormatError> {
        match self.bit_depth {
            8 => Ok(1),
            16 => Ok(2),
            32 => Ok(4),
            _ => Err(FormatError::UnsupportedBitDepth),
        }
    }
}

pub(crate) fn read_array<const N: usize>(
    buffer: &[u8],
    offset: usize,
) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buffer.get(offset..end)?.try_into().ok()
}

pub(crate) fn read_u16_le(buffer: &[u8], offset: usize) -> Option<u16> {
    read_array(buffer, offset).map(u16::from_le_bytes)
}

pub(crate) fn read_u32_le(buffer: &[u8], offset: usize) -> Option<u32> {
    read_array(buffer, offset).map(u32::from_le_bytes)
}

pub(crate) fn read_i32_le(buffer: &[u8], offset: usize) -> Option<i32> {
    read_array(buffer, offset).map(i32::from_le_bytes)
}
