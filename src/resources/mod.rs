use std::path::{Path, PathBuf};

/**
 * This module contains all logic for loading meshes, textures and compute passes from external files.
 */
pub mod mesh;
pub mod texture;

/// Resolves an asset name against an optional root directory.
///
/// Absolute names and names without a root are used as given.
pub fn resolve(root: Option<&Path>, file_name: &str) -> PathBuf {
    let path = Path::new(file_name);
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

pub fn load_string(root: Option<&Path>, file_name: &str) -> anyhow::Result<String> {
    let path = resolve(root, file_name);
    let txt = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("could not read {}: {e}", path.display()))?;
    Ok(txt)
}

pub fn load_binary(root: Option<&Path>, file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = resolve(root, file_name);
    let data = std::fs::read(&path)
        .map_err(|e| anyhow::anyhow!("could not read {}: {e}", path.display()))?;
    Ok(data)
}
