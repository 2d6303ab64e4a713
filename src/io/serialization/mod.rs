//! Model serialization formats.
//!
//! The binary format is the opaque byte sequence handed to the host for
//! storage; JSON exists for inspection and portability. Both reproduce
//! predictions bit for bit.

pub mod bincode;
pub mod json;

use crate::boosting::Model;
use crate::core::constants::MODEL_MAGIC;
use crate::core::error::{GbtError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    #[default]
    Bincode,
    Json,
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationFormat::Bincode => write!(f, "bincode"),
            SerializationFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for SerializationFormat {
    type Err = GbtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bincode" | "bin" | "binary" => Ok(SerializationFormat::Bincode),
            "json" => Ok(SerializationFormat::Json),
            _ => Err(GbtError::invalid_parameter(
                "format",
                s,
                "expected bincode or json",
            )),
        }
    }
}

/// `.json` files hold JSON, everything else the binary format.
pub fn detect_format_from_extension(path: &Path) -> SerializationFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => SerializationFormat::Json,
        _ => SerializationFormat::Bincode,
    }
}

pub fn detect_format_from_content(data: &[u8]) -> Option<SerializationFormat> {
    if data.starts_with(&MODEL_MAGIC) {
        return Some(SerializationFormat::Bincode);
    }
    match data.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Some(SerializationFormat::Json),
        _ => None,
    }
}

pub fn to_bytes(model: &Model, format: SerializationFormat) -> Result<Vec<u8>> {
    match format {
        SerializationFormat::Bincode => bincode::serialize_model(model),
        SerializationFormat::Json => json::to_json(model, true).map(String::into_bytes),
    }
}

/// Decode either format, detected from the content.
pub fn from_bytes(data: &[u8]) -> Result<Model> {
    match detect_format_from_content(data) {
        Some(SerializationFormat::Bincode) => bincode::deserialize_model(data),
        Some(SerializationFormat::Json) => {
            let text = std::str::from_utf8(data)
                .map_err(|e| GbtError::serialization(format!("model JSON is not UTF-8: {}", e)))?;
            json::from_json(text)
        }
        None => Err(GbtError::serialization("unrecognised model format")),
    }
}
