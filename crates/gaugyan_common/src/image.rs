//! Image payloads and their `data:` URI wire form.
//!
//! Photos travel as `data:<mimetype>;base64,<encoded_data>`. History keeps
//! only a content reference (`<mimetype>;sha256:<hex>`), never the bytes.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("image must be a data URI of the form data:<mimetype>;base64,<data>")]
    NotADataUri,

    #[error("unsupported media type '{0}', expected image/*")]
    UnsupportedMediaType(String),

    #[error("image data is not valid base64")]
    InvalidBase64,

    #[error("image data is empty")]
    Empty,
}

/// Decoded photo with its declared media type
#[derive(Clone, PartialEq)]
pub struct ImagePayload {
    media_type: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImagePayload {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ImageError> {
        let media_type = media_type.into().trim().to_ascii_lowercase();
        if !media_type.starts_with("image/") || media_type.len() <= "image/".len() {
            return Err(ImageError::UnsupportedMediaType(media_type));
        }
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(Self { media_type, bytes })
    }

    /// Parse `data:<mimetype>;base64,<data>`
    pub fn from_data_uri(uri: &str) -> Result<Self, ImageError> {
        let rest = uri.trim().strip_prefix("data:").ok_or(ImageError::NotADataUri)?;
        let (header, data) = rest.split_once(',').ok_or(ImageError::NotADataUri)?;

        // Header is "<mimetype>[;param=value...];base64"
        let mut params = header.split(';');
        let media_type = params.next().unwrap_or_default();
        if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(ImageError::NotADataUri);
        }

        let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = BASE64_STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|_| ImageError::InvalidBase64)?;

        Self::new(media_type, bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64())
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn base64(&self) -> String {
        BASE64_STANDARD.encode(&self.bytes)
    }

    /// Hex SHA-256 of the decoded bytes
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Reference stored in history in place of the payload
    pub fn reference(&self) -> String {
        format!("{};sha256:{}", self.media_type, self.digest())
    }
}
