use crate::error::{BuildError, Result};
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Replace every occurrence of `find` with `replace` in each file.
///
/// With `regex` set, `find` is a regular expression and `replace` may refer to
/// capture groups (`$1`, `${name}`). A missing file fails the whole call before
/// anything is written.
pub fn replace_in_files<P: AsRef<Path>>(
    find: &str,
    replace: &str,
    file_paths: &[P],
    regex: bool,
) -> Result<()> {
    let pattern = if regex { Some(Regex::new(find)?) } else { None };

    for path in file_paths {
        let path = path.as_ref();
        if !path.is_file() {
            error!(
                "File path does not exist for string replacement: {}",
                path.display()
            );
            return Err(BuildError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
    }

    for path in file_paths {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let replaced = match &pattern {
            Some(pattern) => pattern.replace_all(&data, replace).into_owned(),
            None => data.replace(find, replace),
        };
        if replaced != data {
            fs::write(path, replaced)?;
            debug!("Replaced '{}' in {}", find, path.display());
        }
    }

    Ok(())
}

/// Copy `src` to `target`.
///
/// By default an existing `target` is removed first, so it ends up as an exact
/// copy of `src`. With `preserve_target` the contents of `src` are merged into
/// `target`: entries with the same name are replaced, everything else is kept.
pub fn copy(src: impl AsRef<Path>, target: impl AsRef<Path>, preserve_target: bool) -> Result<()> {
    let src = src.as_ref();
    let target = target.as_ref();

    let result = if src.is_file() {
        copy_file(src, target)
    } else {
        if !preserve_target && target.exists() {
            remove(target)?;
        }
        copy_dir(src, target)
    };

    result.map_err(|e| {
        error!("Failed to copy {} to {}: {}", src.display(), target.display(), e);
        BuildError::Io(e)
    })
}

fn remove(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn copy_file(src: &Path, target: &Path) -> io::Result<()> {
    if target.is_dir() {
        fs::remove_dir_all(target)?;
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, target).map(|_| ())
}

fn copy_dir(src: &Path, target: &Path) -> io::Result<()> {
    if target.is_file() {
        fs::remove_file(target)?;
    }
    fs::create_dir_all(target)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            copy_file(&from, &to)?;
        }
    }
    Ok(())
}
