//! Text armor: header line, one base64url line of container JSON, footer line

use eitxt_core::{EitxtResult, EnvelopeError};
use serde_json::Value;

use crate::container::Container;
use crate::encoding;
use crate::{FORMAT_VERSION, MAGIC};

pub const HEADER: &str = "-----BEGIN EITXT-----";
pub const FOOTER: &str = "-----END EITXT-----";

/// Render `container` as armored text.
pub fn serialize(container: &Container) -> EitxtResult<String> {
    let json = serde_json::to_vec(container)
        .map_err(|e| anyhow::anyhow!("container serialization: {e}"))?;
    Ok(format!("{HEADER}\n{}\n{FOOTER}", encoding::encode(&json)))
}

/// Parse armored text back into a container.
///
/// Only the header/footer, magic and version checks report specific
/// messages; every other decoding failure is the generic
/// `wrong key or corrupted data`. Magic and version are checked before the
/// rest of the structure is interpreted.
pub fn parse(text: &str) -> EitxtResult<Container> {
    let body = text
        .trim()
        .strip_prefix(HEADER)
        .and_then(|rest| rest.strip_suffix(FOOTER))
        .ok_or(EnvelopeError::MissingArmor)?;

    // Tolerate bodies that were line-wrapped in transit.
    let body: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let json = encoding::decode(&body).map_err(|_| EnvelopeError::Undecodable)?;
    let value: Value = serde_json::from_slice(&json).map_err(|_| EnvelopeError::Undecodable)?;

    if value.get("magic").and_then(Value::as_str) != Some(MAGIC) {
        return Err(EnvelopeError::BadMagic.into());
    }
    if value.get("version").and_then(Value::as_u64) != Some(u64::from(FORMAT_VERSION)) {
        return Err(EnvelopeError::UnsupportedVersion.into());
    }

    let container: Container =
        serde_json::from_value(value).map_err(|_| EnvelopeError::Undecodable)?;
    Ok(container)
}
