//! Bulk extension rename applied to the top level of the log folder.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::discover::has_extension;
use crate::error::{CollectError, Result};

/// Replace the extension of every file in `folder` whose name ends with one
/// of `extensions` by `new_ext`. Returns the new paths.
///
/// Files already carrying `new_ext` are left alone.
pub fn rename_logs(folder: &Path, extensions: &[String], new_ext: &str) -> Result<Vec<PathBuf>> {
    let mut renamed = Vec::new();
    let entries = fs::read_dir(folder).map_err(|e| CollectError::io(folder, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CollectError::io(folder, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !has_extension(&name, extensions) || name.ends_with(new_ext) {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let target = folder.join(format!("{stem}{new_ext}"));
        fs::rename(&path, &target).map_err(|e| CollectError::io(&path, e))?;
        info!("Renamed {} to {}", name, target.display());
        renamed.push(target);
    }
    renamed.sort();
    Ok(renamed)
}
