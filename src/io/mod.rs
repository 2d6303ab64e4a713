//! Model persistence and text dumps.

pub mod dump;
pub mod serialization;

pub use dump::dump_model;
pub use serialization::{
    detect_format_from_content, detect_format_from_extension, SerializationFormat,
};

use crate::boosting::Model;
use crate::core::error::Result;
use std::fs;
use std::path::Path;

impl Model {
    /// Opaque binary encoding of the model.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialization::to_bytes(self, SerializationFormat::Bincode)
    }

    /// Decode bytes produced by [`Model::to_bytes`] or JSON.
    pub fn from_bytes(data: &[u8]) -> Result<Model> {
        serialization::from_bytes(data)
    }

    pub fn to_json(&self) -> Result<String> {
        serialization::json::to_json(self, true)
    }

    pub fn from_json(text: &str) -> Result<Model> {
        serialization::json::from_json(text)
    }
}

/// Save a model; the format follows the file extension.
pub fn save_model<P: AsRef<Path>>(model: &Model, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = serialization::to_bytes(model, detect_format_from_extension(path))?;
    fs::write(path, bytes)?;
    log::debug!("Saved model with {} trees to {}", model.num_trees(), path.display());
    Ok(())
}

/// Load a model saved by [`save_model`] in either format.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model> {
    let bytes = fs::read(path.as_ref())?;
    serialization::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Objective;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_by_extension() {
        let dir = tempdir().unwrap();
        let mut model = Model::new(Objective::RankNdcg, 0.0, 5);
        model.set_feature_names(Some((0..5).map(|i| format!("x{}", i)).collect()));
        for name in ["model.bin", "model.json"] {
            let path = dir.path().join(name);
            save_model(&model, &path).unwrap();
            assert_eq!(load_model(&path).unwrap(), model);
        }
        let text = std::fs::read_to_string(dir.path().join("model.json")).unwrap();
        assert!(text.contains("x4"));
        assert!(load_model(dir.path().join("missing.bin")).is_err());
    }
}
