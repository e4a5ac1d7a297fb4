/// Write-then-rename outputs

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

use crate::{KmatrixError, Result};

const TEMP_PREFIX: &str = ".kmatrix-";

fn parent_dir(path: &Path) -> Result<&Path> {
    let parent = path.parent().ok_or_else(|| {
        KmatrixError::Other(format!("{} has no parent directory", path.display()))
    })?;
    fs::create_dir_all(parent)?;
    Ok(parent)
}

/// A file that only appears at its final path after `commit`
pub struct AtomicFile {
    target: PathBuf,
    writer: BufWriter<NamedTempFile>,
}

impl AtomicFile {
    pub fn create<P: Into<PathBuf>>(target: P) -> Result<Self> {
        let target = target.into();
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(parent_dir(&target)?)?;
        Ok(Self {
            target,
            writer: BufWriter::new(temp),
        })
    }

    pub fn writer(&mut self) -> &mut BufWriter<NamedTempFile> {
        &mut self.writer
    }

    pub fn commit(self) -> Result<()> {
        let temp = self
            .writer
            .into_inner()
            .map_err(|e| KmatrixError::Io(e.into_error()))?;
        temp.as_file().sync_all()?;
        temp.persist(&self.target)?;
        Ok(())
    }
}

/// Write `target` atomically with the bytes produced by `write`
pub fn write_atomic<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let mut file = AtomicFile::create(target)?;
    write(file.writer())?;
    file.commit()
}

/// Reserve a temporary path next to `target` for a tool that writes its own
/// output; `TempPath::persist` moves it into place, dropping it removes it
pub fn pending_path(target: &Path) -> Result<TempPath> {
    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(parent_dir(target)?)?;
    Ok(temp.into_temp_path())
}

/// Output exists at its final path
pub fn is_committed(path: &Path) -> bool {
    path.is_file()
}

/// Output exists and holds at least one byte
pub fn is_committed_nonempty(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
