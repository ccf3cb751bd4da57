//! Filesystem access needed by the driver: script files and zonepaths.

use crate::error::Result;
use crate::script::CommandScript;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Mode of generated script files.
pub const SCRIPT_MODE: u32 = 0o600;

/// Mode of a zonepath created on behalf of `create`.
pub const ZONEPATH_MODE: u32 = 0o700;

pub trait Filesystem {
    fn write_file(&self, path: &Path, content: &str, mode: u32) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn directory_exists(&self, path: &Path) -> bool;
    /// Create a directory and any missing parents.
    fn make_directory(&self, path: &Path, mode: u32) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct HostFilesystem;

impl Filesystem for HostFilesystem {
    fn write_file(&self, path: &Path, content: &str, mode: u32) -> Result<()> {
        let mut f = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)?;
        f.write_all(content.as_bytes())?;
        f.sync_all()?;
        // the umask may have narrowed the mode given to open
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn make_directory(&self, path: &Path, mode: u32) -> Result<()> {
        DirBuilder::new().recursive(true).mode(mode).create(path)?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }
}

/// A script written to disk for the lifetime of one zonecfg invocation.
/// The file is removed when the guard is dropped.
pub struct ScriptFile<'a, F: Filesystem + ?Sized> {
    fs: &'a F,
    path: PathBuf,
}

impl<'a, F: Filesystem + ?Sized> ScriptFile<'a, F> {
    pub fn create(fs: &'a F, dir: &Path, script: &CommandScript) -> Result<Self> {
        let path = dir.join(format!("zonecfg-{}.cfg", Uuid::new_v4()));
        fs.write_file(&path, &script.render(), SCRIPT_MODE)?;
        debug!(target: "zonecfg", "wrote script {}: {}", path.display(), script);
        Ok(Self { fs, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<F: Filesystem + ?Sized> Drop for ScriptFile<'_, F> {
    fn drop(&mut self) {
        if let Err(e) = self.fs.remove_file(&self.path) {
            warn!(target: "zonecfg", "failed to remove script {}: {}", self.path.display(), e);
        }
    }
}
