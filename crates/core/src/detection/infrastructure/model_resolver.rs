use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("model {name} not found (looked in: {searched}) and no download URL configured")]
    NotFound { name: String, searched: String },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model weights file.
///
/// Resolution order:
/// 1. `requested` itself, if it exists
/// 2. its file name in the user model cache
/// 3. its file name in `bundled_dir`
/// 4. download from `url` into the cache
pub fn resolve(
    requested: &Path,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if requested.exists() {
        return Ok(requested.to_path_buf());
    }
    resolve_in(&model_cache_dir()?, requested, url, bundled_dir, progress)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FallWatch/models/`
/// - Linux: `$XDG_CACHE_HOME/FallWatch/models/` or `~/.cache/FallWatch/models/`
/// - Windows: `%LOCALAPPDATA%/FallWatch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn resolve_in(
    cache_dir: &Path,
    requested: &Path,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if requested.exists() {
        return Ok(requested.to_path_buf());
    }
    let name = requested
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| requested.to_string_lossy().into_owned());

    let cached_path = cache_dir.join(&name);
    if cached_path.exists() {
        log::debug!("Using cached model {}", cached_path.display());
        return Ok(cached_path);
    }

    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(&name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = url else {
        let mut searched = vec![requested.display().to_string(), cached_path.display().to_string()];
        if let Some(dir) = bundled_dir {
            searched.push(dir.join(&name).display().to_string());
        }
        return Err(ModelResolveError::NotFound {
            name,
            searched: searched.join(", "),
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {name} from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Streams `url` into `dest` via a `.part` file that is only renamed into
/// place once complete.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_to(url, &temp_path, progress).and_then(|()| {
        fs::rename(&temp_path, dest).map_err(|source| ModelResolveError::Write {
            path: dest.to_path_buf(),
            source,
        })
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_to(
    url: &str,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let write_err = |source| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source,
    };

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(temp_path).map_err(write_err)?;
    let mut buf = vec![0u8; 1024 * 1024];
    let mut downloaded: u64 = 0;
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_path_wins() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("best.onnx");
        fs::write(&model, b"weights").unwrap();

        let resolved = resolve(&model, None, None, None).unwrap();
        assert_eq!(resolved, model);
    }

    #[test]
    fn test_finds_cached_file_by_name() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("yolo11n-pose.onnx"), b"weights").unwrap();

        let resolved =
            resolve_in(&cache, Path::new("models/yolo11n-pose.onnx"), None, None, None).unwrap();
        assert_eq!(resolved, cache.join("yolo11n-pose.onnx"));
    }

    #[test]
    fn test_finds_bundled_file() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("best.onnx"), b"weights").unwrap();

        let resolved = resolve_in(
            &tmp.path().join("empty-cache"),
            Path::new("best.onnx"),
            None,
            Some(&bundled),
            None,
        )
        .unwrap();
        assert_eq!(resolved, bundled.join("best.onnx"));
    }

    #[test]
    fn test_missing_without_url_lists_searched_locations() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_in(tmp.path(), Path::new("best.onnx"), None, None, None).unwrap_err();
        match err {
            ModelResolveError::NotFound { name, searched } => {
                assert_eq!(name, "best.onnx");
                assert!(searched.contains(&tmp.path().display().to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_model_cache_dir_is_app_scoped() {
        let path = model_cache_dir().unwrap();
        assert!(path.ends_with(Path::new(APP_DIR_NAME).join("models")));
    }

    #[test]
    fn test_failed_download_leaves_no_files() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://127.0.0.1:9/model.onnx", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
