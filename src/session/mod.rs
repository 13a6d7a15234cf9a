//! Sessions on an open `.dat`/`.def` file pair.

mod dump;
mod variable;

pub use self::dump::Dump;
pub use self::variable::{Variable, VariableData};

use crate::data::{self, Access, DataFile, Transfer};
use crate::directory::{AttributeValue, Directory, Element};
use crate::dtype::Coding;
use crate::elements::{self, ReadableElement, WritableElement};
use crate::header::{FileKind, Header, DEFAULT_DAT_TEXT, DEFAULT_DEF_TEXT, HEADER_LEN};
use crate::index::{AxisOrder, IndexRange};
use crate::registry::Registration;
use crate::NefisError;
use indexmap::IndexMap;
use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use num_traits::ToPrimitive;
use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// How a file pair is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Open an existing pair without modifying it.
    Read,
    /// Create a new pair. Fails if either file exists.
    Create,
    /// Open an existing pair for reading and writing.
    Update,
}

impl OpenMode {
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

#[derive(Debug)]
pub struct ParseOpenModeError(String);

impl Error for ParseOpenModeError {}

impl fmt::Display for ParseOpenModeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown open mode: {:?}", self.0)
    }
}

impl FromStr for OpenMode {
    type Err = ParseOpenModeError;

    /// Accepts the single-letter modes `r`, `c` and `u` as well as the
    /// spelled-out names.
    fn from_str(s: &str) -> Result<OpenMode, ParseOpenModeError> {
        match s.to_ascii_lowercase().as_str() {
            "r" | "read" => Ok(OpenMode::Read),
            "c" | "create" => Ok(OpenMode::Create),
            "u" | "update" => Ok(OpenMode::Update),
            _ => Err(ParseOpenModeError(s.to_owned())),
        }
    }
}

/// Options for opening a file pair.
///
/// ```no_run
/// use nefis::{Coding, OpenMode, OpenOptions};
///
/// let session = OpenOptions::new()
///     .mode(OpenMode::Create)
///     .coding(Coding::Little)
///     .def_header("run 42 definitions")
///     .open("trim-run.dat", "trim-run.def")?;
/// # Ok::<_, nefis::NefisError>(())
/// ```
#[derive(Clone, Debug)]
pub struct OpenOptions {
    mode: OpenMode,
    coding: Coding,
    def_text: String,
    dat_text: String,
}

impl Default for OpenOptions {
    fn default() -> OpenOptions {
        OpenOptions::new()
    }
}

impl OpenOptions {
    /// Read mode, big endian coding, default header texts.
    pub fn new() -> OpenOptions {
        OpenOptions {
            mode: OpenMode::Read,
            coding: Coding::default(),
            def_text: DEFAULT_DEF_TEXT.to_owned(),
            dat_text: DEFAULT_DAT_TEXT.to_owned(),
        }
    }

    pub fn mode(&mut self, mode: OpenMode) -> &mut OpenOptions {
        self.mode = mode;
        self
    }

    /// Byte order of a created pair. Existing pairs keep their own coding.
    pub fn coding(&mut self, coding: Coding) -> &mut OpenOptions {
        self.coding = coding;
        self
    }

    /// Header text of a created `.def` file.
    pub fn def_header<S: Into<String>>(&mut self, text: S) -> &mut OpenOptions {
        self.def_text = text.into();
        self
    }

    /// Header text of a created `.dat` file.
    pub fn dat_header<S: Into<String>>(&mut self, text: S) -> &mut OpenOptions {
        self.dat_text = text.into();
        self
    }

    pub fn open<P, Q>(&self, dat: P, def: Q) -> Result<Session, NefisError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let (dat, def) = (dat.as_ref(), def.as_ref());
        if self.mode != OpenMode::Create {
            for path in [dat, def] {
                if !path.exists() {
                    return Err(NefisError::FileNotFound(path.to_owned()));
                }
            }
        }
        let registration = Registration::acquire(&[dat, def], self.mode.is_writable())?;
        let pair = match self.mode {
            OpenMode::Create => OpenPair::create(dat, def, self, registration)?,
            mode => OpenPair::open(dat, def, mode, registration)?,
        };
        log::debug!(
            "opened {} and {} ({:?}, {:?} coding)",
            dat.display(),
            def.display(),
            pair.mode,
            pair.coding
        );
        Ok(Session {
            dat_path: dat.to_owned(),
            def_path: def.to_owned(),
            pair: Some(pair),
        })
    }
}

/// Token shared by both headers of a pair, unique per creation.
fn pair_token(dat: &Path, def: &Path) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(dat.to_string_lossy().as_bytes());
    hasher.update(def.to_string_lossy().as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    (u64::from(hasher.finalize()) << 32) | (nanos as u64 & 0xffff_ffff)
}

struct OpenPair {
    mode: OpenMode,
    coding: Coding,
    dat: DataFile<File>,
    def: File,
    dat_header: Header,
    def_header: Header,
    directory: Directory,
    /// The directory has changed since the `.def` body was last written.
    dirty: bool,
    // Released after the files above are closed.
    _registration: Registration,
}

impl OpenPair {
    fn create(
        dat_path: &Path,
        def_path: &Path,
        options: &OpenOptions,
        registration: Registration,
    ) -> Result<OpenPair, NefisError> {
        for path in [dat_path, def_path] {
            if path.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", path.display()),
                )
                .into());
            }
        }
        let token = pair_token(dat_path, def_path);
        let dat_header = Header::new(FileKind::Data, options.coding, token, &options.dat_text);
        let def_header =
            Header::new(FileKind::Definition, options.coding, token, &options.def_text);
        let dat_bytes = dat_header.to_bytes()?;
        def_header.to_bytes()?;

        let create = |path: &Path| {
            fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(path)
        };
        let mut dat = create(dat_path)?;
        dat.write_all(&dat_bytes)?;
        let def = create(def_path)?;

        let mut pair = OpenPair {
            mode: OpenMode::Create,
            coding: options.coding,
            dat: DataFile::new(dat, HEADER_LEN as u64),
            def,
            dat_header,
            def_header,
            directory: Directory::new(),
            dirty: true,
            _registration: registration,
        };
        pair.write_definition()?;
        Ok(pair)
    }

    fn open(
        dat_path: &Path,
        def_path: &Path,
        mode: OpenMode,
        registration: Registration,
    ) -> Result<OpenPair, NefisError> {
        let open = |path: &Path| {
            fs::OpenOptions::new()
                .read(true)
                .write(mode.is_writable())
                .open(path)
        };
        let mut dat = open(dat_path)?;
        let mut def = open(def_path)?;
        let dat_header = Header::from_reader(&mut dat, FileKind::Data)?;
        let def_header = Header::from_reader(&mut def, FileKind::Definition)?;
        if dat_header.pair_token != def_header.pair_token
            || dat_header.coding != def_header.coding
        {
            return Err(NefisError::MismatchedPair {
                dat: dat_path.to_owned(),
                def: def_path.to_owned(),
            });
        }
        let coding = def_header.coding;

        let available = def.metadata()?.len().saturating_sub(HEADER_LEN as u64);
        let body_len = match def_header.body_len.to_usize() {
            Some(len) if def_header.body_len <= available => len,
            _ => {
                return Err(NefisError::Format(format!(
                    "definition body of {} bytes is truncated to {}",
                    def_header.body_len, available
                )))
            }
        };
        let mut body = vec![0; body_len];
        def.read_exact(&mut body)?;
        if crc32fast::hash(&body) != def_header.body_crc {
            return Err(NefisError::Format("definition body checksum mismatch".into()));
        }
        let directory = Directory::decode(&body, coding)?;

        let end = dat.seek(SeekFrom::End(0))?;
        data::check_slabs(&directory, end)?;
        log::trace!(
            "loaded {} elements, {} cells, {} group definitions, {} groups",
            directory.elements().len(),
            directory.cells().len(),
            directory.group_definitions().len(),
            directory.group_instances().len()
        );

        Ok(OpenPair {
            mode,
            coding,
            dat: DataFile::new(dat, end),
            def,
            dat_header,
            def_header,
            directory,
            dirty: false,
            _registration: registration,
        })
    }

    /// Rewrites the `.def` header and body in full.
    fn write_definition(&mut self) -> Result<(), NefisError> {
        let body = self.directory.encode(self.coding)?;
        self.def_header.body_len = body.len() as u64;
        self.def_header.body_crc = crc32fast::hash(&body);
        let header = self.def_header.to_bytes()?;
        self.def.seek(SeekFrom::Start(0))?;
        self.def.write_all(&header)?;
        self.def.write_all(&body)?;
        self.def.set_len((HEADER_LEN + body.len()) as u64)?;
        self.def.flush()?;
        self.dirty = false;
        log::debug!("wrote definition body of {} bytes", body.len());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), NefisError> {
        if !self.mode.is_writable() {
            return Ok(());
        }
        self.dat.flush()?;
        if self.dirty {
            self.write_definition()?;
        }
        Ok(())
    }
}

/// An open file pair.
///
/// Dropping a session flushes it; errors during that flush can only be
/// logged, so call [`Session::close`] to observe them. Every operation on a
/// closed session fails with [`NefisError::SessionClosed`].
pub struct Session {
    dat_path: PathBuf,
    def_path: PathBuf,
    pair: Option<OpenPair>,
}

impl Session {
    /// Opens a pair with default options.
    pub fn open<P, Q>(dat: P, def: Q, mode: OpenMode) -> Result<Session, NefisError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        OpenOptions::new().mode(mode).open(dat, def)
    }

    fn pair(&self) -> Result<&OpenPair, NefisError> {
        self.pair.as_ref().ok_or(NefisError::SessionClosed)
    }

    fn pair_mut(&mut self) -> Result<&mut OpenPair, NefisError> {
        self.pair.as_mut().ok_or(NefisError::SessionClosed)
    }

    fn writable(&mut self) -> Result<&mut OpenPair, NefisError> {
        let pair = self.pair_mut()?;
        if pair.mode.is_writable() {
            Ok(pair)
        } else {
            Err(NefisError::ReadOnly)
        }
    }

    pub fn dat_path(&self) -> &Path {
        &self.dat_path
    }

    pub fn def_path(&self) -> &Path {
        &self.def_path
    }

    pub fn is_open(&self) -> bool {
        self.pair.is_some()
    }

    pub fn mode(&self) -> Result<OpenMode, NefisError> {
        Ok(self.pair()?.mode)
    }

    pub fn coding(&self) -> Result<Coding, NefisError> {
        Ok(self.pair()?.coding)
    }

    /// Header text of the `.def` file.
    pub fn def_header(&self) -> Result<&str, NefisError> {
        Ok(&self.pair()?.def_header.text)
    }

    /// Header text of the `.dat` file.
    pub fn dat_header(&self) -> Result<&str, NefisError> {
        Ok(&self.pair()?.dat_header.text)
    }

    /// The catalogs of the pair.
    pub fn directory(&self) -> Result<&Directory, NefisError> {
        Ok(&self.pair()?.directory)
    }

    /// Writes pending directory changes to the `.def` file.
    pub fn flush(&mut self) -> Result<(), NefisError> {
        self.pair_mut()?.flush()
    }

    /// Flushes and closes the pair. Both files are closed even if the flush
    /// fails.
    pub fn close(&mut self) -> Result<(), NefisError> {
        let mut pair = self.pair.take().ok_or(NefisError::SessionClosed)?;
        pair.flush()?;
        log::debug!(
            "closed {} with {} data bytes",
            self.def_path.display(),
            pair.dat.len()
        );
        Ok(())
    }

    pub fn define_element(&mut self, element: Element) -> Result<(), NefisError> {
        let pair = self.writable()?;
        pair.directory.define_element(element)?;
        pair.dirty = true;
        Ok(())
    }

    pub fn define_cell<S: AsRef<str>>(
        &mut self,
        name: &str,
        elements: &[S],
    ) -> Result<(), NefisError> {
        let pair = self.writable()?;
        pair.directory.define_cell(name, elements)?;
        pair.dirty = true;
        Ok(())
    }

    /// Defines a group of `dimensions` cells. `order` lists the group axes
    /// from fastest to slowest varying in storage; an unbounded axis
    /// (extent `0`) must come last.
    pub fn define_group(
        &mut self,
        name: &str,
        cell: &str,
        dimensions: &[usize],
        order: &[usize],
    ) -> Result<(), NefisError> {
        let pair = self.writable()?;
        pair.directory.define_group(name, cell, dimensions, order)?;
        pair.dirty = true;
        Ok(())
    }

    /// Creates a group instance. The storage of a fixed-size group is
    /// reserved immediately.
    pub fn instantiate_group(
        &mut self,
        instance: &str,
        definition: &str,
    ) -> Result<(), NefisError> {
        let pair = self.writable()?;
        pair.directory.instantiate_group(instance, definition)?;
        if let Err(err) = data::reserve(&mut pair.directory, &mut pair.dat, instance) {
            pair.directory.discard_group_instance(instance);
            return Err(err);
        }
        pair.dirty = true;
        Ok(())
    }

    pub fn put_attribute(
        &mut self,
        instance: &str,
        name: &str,
        value: AttributeValue,
    ) -> Result<(), NefisError> {
        let pair = self.writable()?;
        pair.directory.put_attribute(instance, name, value)?;
        pair.dirty = true;
        Ok(())
    }

    pub fn attributes(
        &self,
        instance: &str,
    ) -> Result<&IndexMap<String, AttributeValue>, NefisError> {
        self.pair()?.directory.attributes(instance)
    }

    pub fn max_index(&self, group: &str) -> Result<usize, NefisError> {
        self.pair()?.directory.max_index(group)
    }

    /// Reads the raw values of `element` for the selected cells.
    ///
    /// `ranges` select along the group axes; missing trailing ranges select
    /// an axis in full. The returned buffer holds the element's values
    /// fastest, then the group axes in `order`, in the file's coding.
    pub fn read(
        &mut self,
        group: &str,
        element: &str,
        ranges: &[IndexRange],
        order: &AxisOrder,
    ) -> Result<Vec<u8>, NefisError> {
        let pair = self.pair_mut()?;
        let transfer =
            Transfer::plan(&pair.directory, group, element, ranges, order, Access::Read)?;
        transfer.read(&pair.directory, &mut pair.dat)
    }

    /// Writes raw values laid out as [`Session::read`] returns them. A
    /// selection may extend the unbounded axis of a group by appending at
    /// `max_index`; gaps are rejected before anything is written.
    pub fn write(
        &mut self,
        group: &str,
        element: &str,
        ranges: &[IndexRange],
        order: &AxisOrder,
        bytes: &[u8],
    ) -> Result<(), NefisError> {
        let pair = self.writable()?;
        let transfer =
            Transfer::plan(&pair.directory, group, element, ranges, order, Access::Write)?;
        transfer.write(&mut pair.directory, &mut pair.dat, bytes)?;
        pair.dirty = true;
        Ok(())
    }

    /// Reads the selected values as an array in natural (row-major) shape:
    /// the reverse of the buffer layout described at [`Session::read`].
    pub fn typed_read<A: ReadableElement>(
        &mut self,
        group: &str,
        element: &str,
        ranges: &[IndexRange],
        order: &AxisOrder,
    ) -> Result<ArrayD<A>, NefisError> {
        let pair = self.pair_mut()?;
        let transfer =
            Transfer::plan(&pair.directory, group, element, ranges, order, Access::Read)?;
        let bytes = transfer.read(&pair.directory, &mut pair.dat)?;
        elements::to_array(&bytes, transfer.data_type(), pair.coding, &transfer.natural_shape())
    }

    /// Writes an array whose shape is the natural shape of the selection.
    pub fn typed_write<A, S, D>(
        &mut self,
        group: &str,
        element: &str,
        ranges: &[IndexRange],
        order: &AxisOrder,
        array: &ArrayBase<S, D>,
    ) -> Result<(), NefisError>
    where
        A: WritableElement,
        S: Data<Elem = A>,
        D: Dimension,
    {
        let pair = self.writable()?;
        let transfer =
            Transfer::plan(&pair.directory, group, element, ranges, order, Access::Write)?;
        let shape = transfer.natural_shape();
        if array.shape() != shape.as_slice() {
            return Err(NefisError::ShapeMismatch(format!(
                "array of shape {:?} given for a selection of shape {:?}",
                array.shape(),
                shape
            )));
        }
        let mut bytes = Vec::with_capacity(transfer.len_bytes());
        A::write_values(array.iter(), transfer.data_type(), pair.coding, &mut bytes)?;
        transfer.write(&mut pair.directory, &mut pair.dat, &bytes)?;
        pair.dirty = true;
        Ok(())
    }

    /// Every element of every group instance, keyed by element name, or by
    /// `<group>/<element>` where several instances hold the same element.
    pub fn variables(&self) -> Result<IndexMap<String, Variable>, NefisError> {
        variable::collect(&self.pair()?.directory)
    }

    /// Reads a variable at one index of its group's slowest varying axis.
    /// That axis is dropped from the shape of the result.
    pub fn read_variable(&mut self, name: &str, index: usize) -> Result<VariableData, NefisError> {
        let pair = self.pair_mut()?;
        variable::read(&pair.directory, &mut pair.dat, pair.coding, name, index)
    }

    /// A printable summary of the whole pair.
    pub fn dump(&self) -> Result<Dump<'_>, NefisError> {
        Dump::new(&self.pair()?.directory)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(pair) = self.pair.as_mut() {
            if let Err(err) = pair.flush() {
                log::warn!("failed to flush {}: {}", self.def_path.display(), err);
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Session")
            .field("dat_path", &self.dat_path)
            .field("def_path", &self.def_path)
            .field("open", &self.is_open())
            .finish()
    }
}
