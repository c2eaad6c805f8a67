//! Writing conversion results to disk.
//!
//! Every output is first written to a hidden temporary file next to its
//! destination and only renamed into place once all outputs were staged, so
//! a failed run never leaves a truncated FIT file behind.

use crate::conversion::types::ConvertError;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A file waiting to be renamed into place.
#[derive(Debug)]
struct Staged {
    temp: PathBuf,
    target: PathBuf,
}

/// Atomically write each `(path, contents)` pair.
pub fn write_outputs(outputs: &[(&Path, &[u8])]) -> Result<(), ConvertError> {
    let mut staged: Vec<Staged> = Vec::with_capacity(outputs.len());

    for (target, contents) in outputs {
        match stage(target, contents) {
            Ok(file) => staged.push(file),
            Err(err) => {
                discard(&staged);
                return Err(err);
            }
        }
    }

    for (index, file) in staged.iter().enumerate() {
        if let Err(err) = fs::rename(&file.temp, &file.target) {
            discard(&staged[index..]);
            return Err(err.into());
        }
        tracing::info!(path = %file.target.display(), "wrote output");
    }

    Ok(())
}

fn stage(target: &Path, contents: &[u8]) -> Result<Staged, ConvertError> {
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            ConvertError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{}' is not a file path", target.display()),
            ))
        })?;

    let temp = target.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    if let Err(err) = fs::write(&temp, contents) {
        let _ = fs::remove_file(&temp);
        return Err(err.into());
    }

    Ok(Staged {
        temp,
        target: target.to_path_buf(),
    })
}

fn discard(staged: &[Staged]) {
    for file in staged {
        if let Err(err) = fs::remove_file(&file.temp) {
            tracing::warn!(path = %file.temp.display(), %err, "failed to remove temporary file");
        }
    }
}
