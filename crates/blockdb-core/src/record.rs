use crate::config::IndexField;
use crate::types::{Key, RecordId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const GAME_DATE_LEN: usize = 10;

/// Encoded size of a [`GameRecord`].
pub const RECORD_SIZE: usize = 37;

/// One home-team game line. Encodes to exactly [`RECORD_SIZE`] bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub record_id: RecordId,
    /// ASCII date, NUL padded.
    pub game_date: [u8; GAME_DATE_LEN],
    pub team_id_home: u32,
    pub pts_home: u16,
    pub fg_pct_home: f32,
    pub ft_pct_home: f32,
    pub fg3_pct_home: f32,
    pub ast_home: u16,
    pub reb_home: u16,
    pub home_team_wins: bool,
}

impl GameRecord {
    pub fn game_date(&self) -> &str {
        let end = self
            .game_date
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(GAME_DATE_LEN);
        std::str::from_utf8(&self.game_date[..end]).unwrap_or("")
    }

    pub fn set_game_date(&mut self, date: &str) -> Result<()> {
        if date.len() > GAME_DATE_LEN || !date.is_ascii() {
            return Err(Error::InvalidArgument(format!(
                "game date {:?} is not ASCII of at most {} bytes",
                date, GAME_DATE_LEN
            )));
        }
        self.game_date = [0; GAME_DATE_LEN];
        self.game_date[..date.len()].copy_from_slice(date.as_bytes());
        Ok(())
    }

    /// Value of the indexed field.
    pub fn key(&self, field: IndexField) -> Key {
        match field {
            IndexField::PtsHome => self.pts_home as Key,
            IndexField::FgPctHome => self.fg_pct_home,
            IndexField::FtPctHome => self.ft_pct_home,
            IndexField::Fg3PctHome => self.fg3_pct_home,
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < RECORD_SIZE {
            return Err(Error::Serialization(format!(
                "record needs {} bytes, buffer has {}",
                RECORD_SIZE,
                buf.len()
            )));
        }
        bincode::serialize_into(&mut buf[..RECORD_SIZE], self)?;
        Ok(())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
