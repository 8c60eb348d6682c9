//! Tests for the plain file export target.

use super::*;
use crate::level::CourierLevel;
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

fn entries(texts: &[&str]) -> Vec<CourierLogEntry> {
    texts
        .iter()
        .map(|text| CourierLogEntry::new(*text, CourierLevel::Info, "application"))
        .collect()
}

#[rstest]
fn appends_batches_in_order() -> Result<(), HandlerError> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("app.log");
    let handler = CourierFileHandler::new(&path)?;

    handler.export(&entries(&["first", "second"]))?;
    handler.export(&entries(&["third"]))?;

    let contents = fs::read_to_string(&path).expect("read log");
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("[info][application] first"));
    assert!(lines[1].ends_with("[info][application] second"));
    assert!(lines[2].ends_with("[info][application] third"));
    Ok(())
}

#[rstest]
fn empty_batch_does_not_touch_the_file() -> Result<(), HandlerError> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("app.log");
    let handler = CourierFileHandler::new(&path)?;
    handler.export(&[])?;
    assert!(!path.exists());
    Ok(())
}

#[rstest]
fn creates_missing_parent_directories() -> Result<(), HandlerError> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nested/deeper/app.log");
    let handler = CourierFileHandler::new(&path)?;
    assert!(dir.path().join("nested/deeper").is_dir());
    handler.export(&entries(&["hello"]))?;
    assert!(path.is_file());
    Ok(())
}

#[cfg(unix)]
#[rstest]
fn applies_directory_and_file_modes() -> Result<(), HandlerError> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("logs/app.log");
    let config = FileHandlerConfig::default()
        .with_dir_mode(0o750)
        .with_file_mode(0o640);
    let handler = CourierFileHandler::with_config(&path, DefaultFormatter, config, NoRotation)?;
    handler.export(&entries(&["hello"]))?;

    let dir_mode = fs::metadata(dir.path().join("logs"))
        .expect("dir metadata")
        .permissions()
        .mode();
    let file_mode = fs::metadata(&path)
        .expect("file metadata")
        .permissions()
        .mode();
    assert_eq!(dir_mode & 0o777, 0o750);
    assert_eq!(file_mode & 0o777, 0o640);
    Ok(())
}

#[rstest]
fn unwritable_path_reports_open_error() {
    let dir = tempdir().expect("tempdir");
    let handler = CourierFileHandler::new(dir.path()).expect("directory already exists");
    let err = handler
        .export(&entries(&["lost"]))
        .expect_err("a directory cannot be opened for append");
    assert!(matches!(err, HandlerError::Open { .. }));
    assert!(err.to_string().starts_with("Unable to append to log file"));
}

struct AlwaysRotate;

impl RotationStrategy for AlwaysRotate {
    fn before_write(&self, path: &Path, _current_len: u64) -> io::Result<bool> {
        let mut moved = path.as_os_str().to_owned();
        moved.push(".moved");
        fs::rename(path, moved)?;
        Ok(true)
    }
}

#[rstest]
fn rotated_batches_land_in_a_fresh_file() -> Result<(), HandlerError> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("app.log");
    let handler =
        CourierFileHandler::with_config(&path, DefaultFormatter, FileHandlerConfig::default(), AlwaysRotate)?;

    handler.export(&entries(&["after rotation"]))?;

    let contents = fs::read_to_string(&path).expect("read log");
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("after rotation"));
    assert!(dir.path().join("app.log.moved").exists());
    Ok(())
}

#[cfg(unix)]
#[rstest]
fn handle_on_a_rotated_file_no_longer_names_the_path() -> io::Result<()> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("app.log");
    let stale = OpenOptions::new().create(true).append(true).open(&path)?;
    assert!(names_file(&path, &stale)?);

    fs::rename(&path, dir.path().join("app.log.1"))?;
    assert!(!names_file(&path, &stale)?);

    fs::write(&path, "")?;
    assert!(!names_file(&path, &stale)?);
    Ok(())
}

#[cfg(unix)]
#[rstest]
fn lock_is_taken_on_the_file_the_path_names() -> Result<(), HandlerError> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("app.log");
    let handler = CourierFileHandler::new(&path)?;
    handler.export(&entries(&["before rotation"]))?;
    fs::rename(&path, dir.path().join("app.log.1")).expect("rotate away");

    let lock = handler.lock_current()?;

    assert!(names_file(&path, &lock.file).expect("compare"));
    assert_eq!(lock.file.metadata().expect("metadata").len(), 0);
    Ok(())
}
