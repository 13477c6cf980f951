use crate::{decode, DecodedAudio, Result, WaveHeader};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Header fields plus the decoded clip, as shown by `wavclip info`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveInfo {
    pub header: WaveHeader,
    pub audio: DecodedAudio,
}

/// Read a whole WAV stream into memory and decode it.
pub fn read_wave<R: Read>(reader: R) -> Result<DecodedAudio> {
    let bytes = read_all(reader)?;
    Ok(decode(&bytes)?)
}

pub fn load_wave(path: impl AsRef<Path>) -> Result<DecodedAudio> {
    read_wave(open(path.as_ref())?)
}

pub fn read_wave_info<R: Read>(reader: R) -> Result<WaveInfo> {
    let bytes = read_all(reader)?;
    let header = WaveHeader::parse(&bytes)?;
    let audio = decode(&bytes)?;

    Ok(WaveInfo { header, audio })
}

pub fn load_wave_info(path: impl AsRef<Path>) -> Result<WaveInfo> {
    read_wave_info(open(path.as_ref())?)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    tracing::debug!("Opening {}", path.display());
    Ok(BufReader::new(File::open(path)?))
}

fn read_all<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    tracing::debug!("Read {} bytes of WAV data", bytes.len());
    Ok(bytes)
}
