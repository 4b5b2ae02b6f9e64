use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Media bytes (video frames, audio chunks) encoded as base64 for JSON frames
pub type Base64EncodedMedia = String;

pub fn encode(bytes: &[u8]) -> Base64EncodedMedia {
    STANDARD.encode(bytes)
}

pub fn decode(media: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(media)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_matches_standard_alphabet() {
        assert_eq!(encode(b"frame"), "ZnJhbWU=");
        assert_eq!(decode("ZnJhbWU=").unwrap(), b"frame");
    }
}
