use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compression applied to the plaintext before it is chunked and encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// gzip-compatible deflate stream
    #[default]
    Gzip,
    /// Plaintext is stored verbatim
    None,
}

impl Compression {
    /// Wire spelling, also used verbatim in the associated data.
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::None => "none",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gzip" => Ok(Compression::Gzip),
            "none" => Ok(Compression::None),
            other => Err(format!("unknown compression mode: {other}")),
        }
    }
}

/// Tunables for a single encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptOptions {
    pub compression: Compression,
    /// Plaintext bytes per chunk (the final chunk may be shorter)
    pub chunk_bytes: usize,
    /// PBKDF2 work factor
    pub iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_wire_names() {
        assert_eq!(serde_json::to_string(&Compression::Gzip).unwrap(), "\"gzip\"");
        assert_eq!(serde_json::to_string(&Compression::None).unwrap(), "\"none\"");
        let parsed: Compression = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, Compression::None);
        assert!(serde_json::from_str::<Compression>("\"zstd\"").is_err());
    }

    #[test]
    fn compression_from_str() {
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip);
        assert!("GZIP".parse::<Compression>().is_err());
    }
}
