//! Filesystem utilities.
//!
//! Crash-tolerant write primitives shared by the local result store and the
//! settings manager. A torn cache record would be read back as a miss, but a
//! torn settings file would silently reset configuration, so both go through
//! the same temp-file + rename path.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::{CoreError, CoreResult};

/// Write bytes to `path` using an atomic replace pattern.
///
/// Implementation notes:
/// - Write to a sibling temporary file unique to this process.
/// - Flush and sync the temp file.
/// - Swap into place by renaming.
/// - If the destination exists, it is first moved aside as a `.bak` file, then removed.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path_for(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    atomic_replace(path, &tmp_path)?;
    Ok(())
}

/// Write a JSON file atomically with pretty formatting.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

/// Returns true for the scratch files produced by [`atomic_write_bytes`].
pub fn is_scratch_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.') || name.ends_with(".bak"))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "tmp".to_string());
    // Concurrent writers of the same key must not share a scratch file.
    tmp.set_file_name(format!(
        ".{file_name}.tmp.{}.{}",
        std::process::id(),
        ulid::Ulid::new()
    ));
    tmp
}

fn bak_path_for(path: &Path) -> PathBuf {
    let mut bak = path.to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "bak".to_string());
    bak.set_file_name(format!("{file_name}.bak"));
    bak
}

fn atomic_replace(dest: &Path, src_tmp: &Path) -> CoreResult<()> {
    // Unix rename replaces atomically.
    if cfg!(unix) || !dest.exists() {
        return std::fs::rename(src_tmp, dest).map_err(|e| {
            let _ = std::fs::remove_file(src_tmp);
            CoreError::IoError(e)
        });
    }

    // Windows: rename-over-existing may fail depending on filesystem; use a backup swap.
    let bak = bak_path_for(dest);
    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(src_tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(src_tmp);
            Err(CoreError::IoError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_bytes_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.json");

        atomic_write_bytes(&path, b"one").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one");

        atomic_write_bytes(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("file.json");

        atomic_write_json_pretty(&path, &serde_json::json!({"ok": true})).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_leaves_no_scratch_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.json");

        for i in 0..5 {
            atomic_write_bytes(&path, format!("v{i}").as_bytes()).unwrap();
        }

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_scratch_file(&e.path()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn scratch_file_detection() {
        assert!(is_scratch_file(Path::new("/tmp/.abc.json.tmp.1.X")));
        assert!(is_scratch_file(Path::new("/tmp/abc.json.bak")));
        assert!(!is_scratch_file(Path::new("/tmp/abc.json")));
    }
}
