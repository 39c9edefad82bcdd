use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{CodecError, ImageFile};

static DATA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:([A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,(.*)$").expect("valid data url regex")
});

/// A parsed `data:<mime>;base64,<payload>` string. The payload is kept encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub payload: String,
}

impl DataUrl {
    pub fn parse(value: &str) -> Result<Self, CodecError> {
        let trimmed = value.trim();
        let captures = DATA_URL_RE.captures(trimmed).ok_or_else(|| {
            CodecError::MalformedInput(format!(
                "expected data:<mime>;base64,<payload>, got '{}'",
                preview(trimmed)
            ))
        })?;

        let mime_type = captures[1].to_ascii_lowercase();
        let payload = captures[2].trim().to_string();
        if payload.is_empty() {
            return Err(CodecError::MalformedInput("empty base64 payload".to_string()));
        }

        Ok(Self { mime_type, payload })
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            payload: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn decode_payload(&self) -> Result<Vec<u8>, CodecError> {
        general_purpose::STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|err| CodecError::MalformedInput(format!("invalid base64 payload: {err}")))
    }
}

impl std::fmt::Display for DataUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload)
    }
}

fn preview(value: &str) -> String {
    const LIMIT: usize = 40;
    if value.chars().count() <= LIMIT {
        return value.to_string();
    }
    let truncated: String = value.chars().take(LIMIT).collect();
    format!("{truncated}...")
}

pub fn decode_data_url_to_file(data_url: &str, filename: &str) -> Result<ImageFile, CodecError> {
    let parsed = DataUrl::parse(data_url)?;
    let bytes = parsed.decode_payload()?;
    Ok(ImageFile::new(filename, parsed.mime_type, bytes))
}

pub fn encode_file_to_data_url(file: &ImageFile) -> String {
    DataUrl::from_bytes(&file.mime_type, &file.bytes).to_string()
}
