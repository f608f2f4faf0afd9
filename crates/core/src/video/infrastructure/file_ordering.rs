use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::shared::constants::VIDEO_EXTENSIONS;

pub fn is_video_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                VIDEO_EXTENSIONS
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(ext))
            })
}

/// Video files directly inside `dir`, sorted by file name. Hidden files are
/// skipped.
pub fn list_video_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_hidden(&path) && is_video_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Renames the videos in `dir` to `{prefix}1.ext`, `{prefix}2.ext`, ... in
/// file name order and returns the new paths.
///
/// Files are first moved into a fresh staging directory inside `dir`, so no
/// rename ever lands on an existing name. A target taken by something other
/// than the videos being renamed is an error before anything moves, and a
/// failure midway moves every file back where it was.
pub fn rename_and_order_files(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    let files = list_video_files(dir)?;
    let targets: Vec<PathBuf> = files
        .iter()
        .enumerate()
        .map(|(i, path)| dir.join(format!("{prefix}{}.{}", i + 1, extension_of(path))))
        .collect();
    if let Some(taken) = targets.iter().find(|t| t.exists() && !files.contains(t)) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", taken.display()),
        ));
    }
    if files.is_empty() {
        return Ok(targets);
    }

    let staging = tempfile::Builder::new()
        .prefix(".fallwatch-reorder-")
        .keep(true)
        .tempdir_in(dir)?;
    let mut moves: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len() * 2);
    let result = stage_then_place(&files, &targets, staging.path(), &mut moves);
    if let Err(e) = result {
        log::error!("Reordering {} failed, restoring names: {e}", dir.display());
        for (from, to) in moves.iter().rev() {
            if let Err(undo) = fs::rename(to, from) {
                log::error!("Could not move {} back to {}: {undo}", to.display(), from.display());
            }
        }
        let _ = fs::remove_dir(staging.path());
        return Err(e);
    }
    fs::remove_dir(staging.path())?;

    log::info!("Renamed {} videos in {}", targets.len(), dir.display());
    Ok(targets)
}

fn stage_then_place(
    files: &[PathBuf],
    targets: &[PathBuf],
    staging: &Path,
    moves: &mut Vec<(PathBuf, PathBuf)>,
) -> io::Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        let temp = staging.join(i.to_string());
        fs::rename(path, &temp)?;
        moves.push((path.clone(), temp.clone()));
        staged.push(temp);
    }
    for (temp, target) in staged.iter().zip(targets) {
        fs::rename(temp, target)?;
        moves.push((temp.clone(), target.clone()));
    }
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_contiguous_sequence_in_name_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.mp4", "b");
        touch(tmp.path(), "a.mov", "a");
        touch(tmp.path(), "c.MP4", "c");

        let renamed = rename_and_order_files(tmp.path(), "video").unwrap();
        assert_eq!(names(&renamed), vec!["video1.mov", "video2.mp4", "video3.MP4"]);
        assert_eq!(fs::read_to_string(tmp.path().join("video1.mov")).unwrap(), "a");
        assert_eq!(fs::read_to_string(tmp.path().join("video3.MP4")).unwrap(), "c");
    }

    #[test]
    fn test_existing_targets_are_not_clobbered() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "video2.mp4", "second");
        touch(tmp.path(), "video1.mp4", "first");
        touch(tmp.path(), "video10.mp4", "tenth");

        rename_and_order_files(tmp.path(), "video").unwrap();
        // name order is video1, video10, video2
        assert_eq!(fs::read_to_string(tmp.path().join("video1.mp4")).unwrap(), "first");
        assert_eq!(fs::read_to_string(tmp.path().join("video2.mp4")).unwrap(), "tenth");
        assert_eq!(fs::read_to_string(tmp.path().join("video3.mp4")).unwrap(), "second");
        assert_eq!(list_video_files(tmp.path()).unwrap().len(), 3);
    }

    #[test]
    fn test_non_video_files_untouched() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "notes.txt", "n");
        touch(tmp.path(), "clip.avi", "v");
        fs::create_dir(tmp.path().join("sub.mp4")).unwrap();

        let renamed = rename_and_order_files(tmp.path(), "clip").unwrap();
        assert_eq!(names(&renamed), vec!["clip1.avi"]);
        assert!(tmp.path().join("notes.txt").exists());
        assert!(tmp.path().join("sub.mp4").is_dir());
    }

    #[test]
    fn test_empty_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(rename_and_order_files(tmp.path(), "video").unwrap().is_empty());
    }

    #[test]
    fn test_missing_dir_errors() {
        let tmp = TempDir::new().unwrap();
        assert!(rename_and_order_files(&tmp.path().join("nope"), "video").is_err());
    }

    #[test]
    fn test_hidden_files_are_neither_listed_nor_touched() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "-a.mp4", "A");
        touch(tmp.path(), "-b.mp4", "B");
        touch(tmp.path(), ".video-reorder-1.mp4", "C");

        let renamed = rename_and_order_files(tmp.path(), "video").unwrap();
        assert_eq!(names(&renamed), vec!["video1.mp4", "video2.mp4"]);
        assert_eq!(fs::read_to_string(tmp.path().join("video1.mp4")).unwrap(), "A");
        assert_eq!(fs::read_to_string(tmp.path().join("video2.mp4")).unwrap(), "B");
        assert_eq!(
            fs::read_to_string(tmp.path().join(".video-reorder-1.mp4")).unwrap(),
            "C"
        );
        // staging directory is gone
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_taken_target_fails_before_moving_anything() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.mp4", "A");
        touch(tmp.path(), "b.mp4", "B");
        fs::create_dir(tmp.path().join("video2.mp4")).unwrap();

        let err = rename_and_order_files(tmp.path(), "video").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(tmp.path().join("a.mp4")).unwrap(), "A");
        assert_eq!(fs::read_to_string(tmp.path().join("b.mp4")).unwrap(), "B");
        assert!(tmp.path().join("video2.mp4").is_dir());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 3);
    }
}
