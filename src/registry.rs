//! Process-wide bookkeeping of open file pairs.
//!
//! Any number of read-only sessions may share a pair, or a single writer may
//! hold it alone.

use crate::NefisError;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Holders {
    Readers(usize),
    Writer,
}

static OPEN_FILES: OnceLock<Mutex<HashMap<PathBuf, Holders>>> = OnceLock::new();

fn open_files() -> MutexGuard<'static, HashMap<PathBuf, Holders>> {
    OPEN_FILES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Identifies a file by its canonical path. A file that does not exist yet
/// is identified by its canonical parent directory and file name.
fn file_key(path: &Path) -> io::Result<PathBuf> {
    match path.canonicalize() {
        Ok(key) => Ok(key),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let name = path.file_name().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
            })?;
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            Ok(parent.canonicalize()?.join(name))
        }
        Err(err) => Err(err),
    }
}

/// Registration of a session on a set of files, released on drop.
#[derive(Debug)]
pub(crate) struct Registration {
    keys: Vec<PathBuf>,
    writer: bool,
}

impl Registration {
    pub fn acquire(paths: &[&Path], writer: bool) -> Result<Registration, NefisError> {
        let mut keys = paths
            .iter()
            .map(|path| file_key(path))
            .collect::<io::Result<Vec<_>>>()?;
        keys.sort();
        keys.dedup();

        let mut open = open_files();
        for key in &keys {
            match (open.get(key), writer) {
                (None, _) | (Some(Holders::Readers(_)), false) => {}
                _ => return Err(NefisError::AlreadyOpen(key.clone())),
            }
        }
        for key in &keys {
            let holders = match open.get(key) {
                Some(Holders::Readers(n)) => Holders::Readers(n + 1),
                _ if writer => Holders::Writer,
                _ => Holders::Readers(1),
            };
            open.insert(key.clone(), holders);
        }
        log::trace!("registered {:?} (writer: {})", keys, writer);
        Ok(Registration { keys, writer })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut open = open_files();
        for key in &self.keys {
            match open.get(key).copied() {
                Some(Holders::Readers(n)) if n > 1 && !self.writer => {
                    open.insert(key.clone(), Holders::Readers(n - 1));
                }
                _ => {
                    open.remove(key);
                }
            }
        }
    }
}
