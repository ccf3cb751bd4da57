//! In-memory collaborators for exercising the driver without zonecfg.

use crate::error::Result;
use crate::fs::Filesystem;
use crate::process::{CommandLine, CommandOutput, CommandRunner};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

/// Records every command and answers with queued outputs. Once the queue
/// is drained every command succeeds silently.
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: RefCell<VecDeque<CommandOutput>>,
    calls: RefCell<Vec<CommandLine>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, output: CommandOutput) {
        self.responses.borrow_mut().push_back(output);
    }

    pub fn respond_with(&self, exit_code: i32, stdout: &str, stderr: &str) {
        self.respond(CommandOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &CommandLine) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(cmd.clone());
        Ok(self.responses.borrow_mut().pop_front().unwrap_or_default())
    }
}

/// A file written through [`MockFilesystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub content: String,
    pub mode: u32,
}

#[derive(Debug, Default)]
pub struct MockFilesystem {
    files: RefCell<BTreeMap<PathBuf, WrittenFile>>,
    history: RefCell<Vec<WrittenFile>>,
    removed: RefCell<Vec<PathBuf>>,
    dirs: RefCell<BTreeMap<PathBuf, u32>>,
    fail_writes: bool,
}

impl MockFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A filesystem on which every write fails.
    pub fn read_only() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn add_directory<P: Into<PathBuf>>(&self, path: P) {
        self.dirs.borrow_mut().insert(path.into(), 0o755);
    }

    /// Every file ever written, in order, including removed ones.
    pub fn written(&self) -> Vec<WrittenFile> {
        self.history.borrow().clone()
    }

    /// Files that are still present.
    pub fn existing(&self) -> BTreeSet<PathBuf> {
        self.files.borrow().keys().cloned().collect()
    }

    pub fn removed(&self) -> Vec<PathBuf> {
        self.removed.borrow().clone()
    }

    pub fn directory_mode(&self, path: &Path) -> Option<u32> {
        self.dirs.borrow().get(path).copied()
    }
}

impl Filesystem for MockFilesystem {
    fn write_file(&self, path: &Path, content: &str, mode: u32) -> Result<()> {
        if self.fail_writes {
            let err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only filesystem");
            return Err(err.into());
        }
        let file = WrittenFile {
            path: path.to_path_buf(),
            content: content.to_string(),
            mode,
        };
        self.history.borrow_mut().push(file.clone());
        self.files.borrow_mut().insert(path.to_path_buf(), file);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match self.files.borrow_mut().remove(path) {
            Some(_) => {
                self.removed.borrow_mut().push(path.to_path_buf());
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such file").into()),
        }
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.dirs.borrow().contains_key(path)
    }

    fn make_directory(&self, path: &Path, mode: u32) -> Result<()> {
        self.dirs.borrow_mut().insert(path.to_path_buf(), mode);
        Ok(())
    }
}
