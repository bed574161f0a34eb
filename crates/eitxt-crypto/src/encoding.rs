//! base64url helpers and serde adapters for binary container fields
//!
//! Encoding never pads; decoding accepts padded and unpadded input.

use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

const B64URL: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn encode(data: &[u8]) -> String {
    B64URL.encode(data)
}

pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    B64URL.decode(s)
}

/// `#[serde(with = "encoding::bytes")]` for variable-length byte fields.
pub mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "encoding::fixed")]` for salts and nonces; wrong lengths are rejected.
pub mod fixed {
    use serde::de::Error;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        data: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        super::bytes::serialize(data, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let bytes = super::bytes::deserialize(deserializer)?;
        <[u8; N]>::try_from(bytes.as_slice())
            .map_err(|_| D::Error::invalid_length(bytes.len(), &"a fixed-length base64url value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_unpadded_url_safe() {
        // 0xfb 0xff encodes to "+/8=" in the standard alphabet
        assert_eq!(encode(&[0xfb, 0xff]), "-_8");
    }

    #[test]
    fn decode_accepts_optional_padding() {
        assert_eq!(decode("-_8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode("-_8=").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn decode_rejects_standard_alphabet() {
        assert!(decode("+/8").is_err());
        assert!(decode("not base64!").is_err());
    }

    #[test]
    fn fixed_rejects_wrong_length() {
        #[derive(serde::Deserialize)]
        struct Nonce {
            #[serde(with = "fixed")]
            #[allow(dead_code)]
            iv: [u8; 12],
        }
        let short = format!("{{\"iv\":\"{}\"}}", encode(&[0u8; 11]));
        assert!(serde_json::from_str::<Nonce>(&short).is_err());
        let exact = format!("{{\"iv\":\"{}\"}}", encode(&[7u8; 12]));
        assert!(serde_json::from_str::<Nonce>(&exact).is_ok());
    }
}
