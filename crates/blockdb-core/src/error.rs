use std::io;

use crate::types::Key;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Record {0} not found")]
    RecordNotFound(u32),

    #[error("Storage full")]
    StorageFull,

    #[error("Duplicate key {key} shifted to {shifted}, which is already taken")]
    KeyCollision { key: Key, shifted: Key },

    #[error("Key {key} is reserved for duplicates of {owner}")]
    KeyReserved { key: Key, owner: Key },

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::StorageFull.to_string(), "Storage full");
        assert_eq!(Error::RecordNotFound(7).to_string(), "Record 7 not found");
        let err = Error::Parse { line: 3, message: "bad float".to_string() };
        assert_eq!(err.to_string(), "Parse error on line 3: bad float");
    }

    #[test]
    fn test_io_source() {
        use std::error::Error as _;

        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(err.source().is_some());
    }
}
