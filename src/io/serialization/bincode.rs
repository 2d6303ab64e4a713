//! Binary model format: magic, little-endian format version, bincode body.

use crate::boosting::Model;
use crate::core::constants::{MODEL_FORMAT_VERSION, MODEL_MAGIC};
use crate::core::error::{GbtError, Result};

const HEADER_LEN: usize = MODEL_MAGIC.len() + 4;

pub fn serialize_model(model: &Model) -> Result<Vec<u8>> {
    let body = bincode::serialize(model)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MODEL_MAGIC);
    out.extend_from_slice(&MODEL_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn deserialize_model(data: &[u8]) -> Result<Model> {
    if data.len() < HEADER_LEN || !data.starts_with(&MODEL_MAGIC) {
        return Err(GbtError::serialization("missing model header"));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&data[MODEL_MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != MODEL_FORMAT_VERSION {
        return Err(GbtError::serialization(format!(
            "model format version {} is not supported (expected {})",
            version, MODEL_FORMAT_VERSION
        )));
    }
    let model: Model = bincode::deserialize(&data[HEADER_LEN..])?;
    model.validate()?;
    Ok(model)
}
