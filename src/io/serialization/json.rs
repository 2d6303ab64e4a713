//! JSON model format.

use crate::boosting::Model;
use crate::core::error::Result;

pub fn to_json(model: &Model, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(model)?
    } else {
        serde_json::to_string(model)?
    })
}

pub fn from_json(text: &str) -> Result<Model> {
    let model: Model = serde_json::from_str(text)?;
    model.validate()?;
    Ok(model)
}
