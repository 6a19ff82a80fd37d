//! Small helpers for reading and writing the files we keep on disk.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::trace;

use crate::commons::error::IoError;

/// Creates a directory, and its parents, unless it exists.
pub fn create_dir(dir: &Path) -> Result<(), IoError> {
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|e| {
            IoError::new(format!("could not create dir: {}", dir.to_string_lossy()), e)
        })?;
    }
    Ok(())
}

pub fn create_file_with_path(path: &Path) -> Result<File, IoError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            trace!("Creating path: {}", parent.to_string_lossy());
            create_dir(parent)?;
        }
    }
    File::create(path).map_err(|e| {
        IoError::new(format!("Could not create file: {}", path.to_string_lossy()), e)
    })
}

/// Derive the path for this file.
pub fn file_path(base_path: &Path, file_name: &str) -> PathBuf {
    let mut path = base_path.to_path_buf();
    path.push(file_name);
    path
}

/// Saves a file, creating parent dirs as needed
pub fn save(content: &[u8], full_path: &Path) -> Result<(), IoError> {
    let mut f = create_file_with_path(full_path)?;
    f.write_all(content).map_err(|e| {
        IoError::new(format!("Could not write to: {}", full_path.to_string_lossy()), e)
    })?;

    trace!("Saved file: {}", full_path.to_string_lossy());
    Ok(())
}

/// Saves a file that only the owner may read, creating parent dirs as needed
pub fn save_private(content: &[u8], full_path: &Path) -> Result<(), IoError> {
    save(content, full_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(full_path, fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                IoError::new(
                    format!(
                        "Could not restrict permissions of: {}",
                        full_path.to_string_lossy()
                    ),
                    e,
                )
            })?;
    }
    Ok(())
}

/// Reads a file to Bytes
pub fn read(path: &Path) -> Result<Bytes, IoError> {
    let mut f = File::open(path).map_err(|e| {
        IoError::new(format!("Could not open: '{}'", path.to_string_lossy()), e)
    })?;
    let mut bytes = Vec::new();
    f.read_to_end(&mut bytes).map_err(|e| {
        IoError::new(format!("Could not read: {}", path.to_string_lossy()), e)
    })?;
    Ok(Bytes::from(bytes))
}


//------------ Tests ---------------------------------------------------------
