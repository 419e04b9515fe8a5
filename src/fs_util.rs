use std::fs;

use camino::Utf8Path;
use tempfile::{Builder, NamedTempFile};

use crate::error::TrackerError;

/// Directory holding `path`, `.` for bare file names.
pub fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."))
}

/// Temp file next to `target`. On unix it is created with 0666 minus the
/// umask, like a plain `File::create`, rather than tempfile's owner-only mode.
pub fn sibling_temp_file(target: &Utf8Path, prefix: &str) -> Result<NamedTempFile, TrackerError> {
    let dir = parent_dir(target);
    let mut builder = Builder::new();
    builder.prefix(prefix);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
        .tempfile_in(dir.as_std_path())
        .map_err(|err| TrackerError::Storage(format!("create temp file in {dir}: {err}")))
}

/// Moves `temp` over `target`. A file already at `target` keeps its
/// permissions.
pub fn replace_file(temp: NamedTempFile, target: &Utf8Path) -> Result<(), TrackerError> {
    let previous = fs::metadata(target.as_std_path())
        .ok()
        .map(|meta| meta.permissions());
    temp.persist(target.as_std_path())
        .map_err(|err| TrackerError::Storage(format!("write {target}: {err}")))?;
    if let Some(permissions) = previous {
        fs::set_permissions(target.as_std_path(), permissions)
            .map_err(|err| TrackerError::Storage(format!("chmod {target}: {err}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_names_live_in_the_current_dir() {
        assert_eq!(parent_dir(Utf8Path::new("track-data.json")), Utf8Path::new("."));
        assert_eq!(parent_dir(Utf8Path::new("/a/b.json")), Utf8Path::new("/a"));
    }
}
