//! The on-disk state file: the entire `Model` serialized as JSON, written to
//! `<path>.new` and renamed over `<path>`. `std::fs::rename` is atomic within
//! a filesystem on every platform this daemon targets, which is all the
//! durability this format asks for.

use std::path::Path;

use crate::domain::model::Model;
use crate::error::{Error, Result};

/// Load the model from `path`. A missing file yields an empty model; the
/// caller is responsible for running `domain::init::ensure_default_classes`
/// afterward.
pub fn load(path: &Path) -> Result<Model> {
    if !path.exists() {
        log::info!("state file {} does not exist, starting with an empty model", path.display());
        return Ok(Model::new());
    }
    let raw = std::fs::read_to_string(path)?;
    let model: Model = serde_json::from_str(&raw)?;
    log::info!("loaded state from {} ({} hosts, {} classes)", path.display(), model.hosts.len(), model.classes.len());
    Ok(model)
}

/// Write the full model to `path` via a sibling `.new` file and an atomic
/// rename. Any failure here is fatal: the caller must abort the process.
pub fn save(path: &Path, model: &Model) -> Result<()> {
    let tmp_path = tmp_path_for(path);
    let serialized = serde_json::to_string_pretty(model)?;
    std::fs::write(&tmp_path, serialized).map_err(|source| Error::Persistence { path: tmp_path.display().to_string(), source })?;
    std::fs::rename(&tmp_path, path).map_err(|source| Error::Persistence { path: path.display().to_string(), source })?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut os_string = path.as_os_str().to_owned();
    os_string.push(".new");
    std::path::PathBuf::from(os_string)
}
