mod audio;
pub use audio::*;

mod decoder;
pub use decoder::*;

mod error;
pub use error::*;

mod header;
pub use header::{WaveHeader, CANONICAL_HEADER_LEN};

mod player;
pub use player::*;

mod reader;
pub use reader::*;

/// Build a player for a decoded clip at the given volume, playing it once
/// from start to finish.
pub fn setup_player(audio: DecodedAudio, volume: f32) -> Result<Player> {
    let player_config = PlayerConfig {
        audio,
        volume,
        loop_start: None,
        end: None,
    };

    Player::new(&player_config)
}
