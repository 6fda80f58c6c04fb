use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "dltix";

/// Get the application data directory for storing index caches
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Get the default directory for `.dix` index cache files.
///
/// Resolution order: `DLTIX_CACHE_DIR` environment variable, then
/// `<app data dir>/cache`. The directory is created if missing.
pub fn get_default_cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DLTIX_CACHE_DIR") {
        if !dir.is_empty() {
            let dir = PathBuf::from(dir);
            fs::create_dir_all(&dir)?;
            return Ok(dir);
        }
    }

    let cache_dir = get_app_data_dir()?.join("cache");
    fs::create_dir_all(&cache_dir)?;
    Ok(cache_dir)
}

/// Remove every `.dix` entry from a cache directory. Returns the number of
/// files removed.
pub fn clear_cache_dir(dir: &PathBuf) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("dix") {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_cache_dir_missing() {
        let dir = PathBuf::from("/nonexistent/dltix-cache");
        assert_eq!(clear_cache_dir(&dir).unwrap(), 0);
    }

    #[test]
    fn test_clear_cache_dir_removes_only_dix() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        fs::write(dir.join("a.dix"), b"x").unwrap();
        fs::write(dir.join("b.dix"), b"x").unwrap();
        fs::write(dir.join("keep.txt"), b"x").unwrap();

        assert_eq!(clear_cache_dir(&dir).unwrap(), 2);
        assert!(dir.join("keep.txt").exists());
        assert!(!dir.join("a.dix").exists());
    }
}
