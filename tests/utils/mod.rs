//! Useful library code for tests

#![allow(dead_code)]

use std::cell::Cell;
use std::ops::ControlFlow;
use std::rc::Rc;

use embedded_cardreader::{
    Attributes, BlockMedia, CardReader, Config, DirEntry, Mode, ShortFileName, TimeSource,
    Timestamp,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Nothing mounted
    NotMounted,
    /// No such file or directory
    NotFound,
    /// No file is open
    NotOpen,
    /// We were asked to fail
    Injected,
}

#[derive(Debug, Clone)]
struct Node {
    name: ShortFileName,
    long_name: Option<String>,
    attributes: Attributes,
    data: Vec<u8>,
    children: Vec<usize>,
}

#[derive(Debug)]
struct Cursor {
    node: usize,
    pos: usize,
    mode: Mode,
}

/// A directory tree held in RAM, standing in for a FAT volume.
///
/// Directory handles are node indices. Sub-directories list `.` and `..`
/// first, like FAT does.
#[derive(Debug)]
pub struct RamMedia {
    nodes: Vec<Node>,
    cursor: Option<Cursor>,
    mounted: bool,
    /// Is the card in the socket?
    pub inserted: bool,
    /// Make the next mount fail, as if the volume were unreadable
    pub fail_mount: bool,
    /// Make every record write fail
    pub fail_record_writes: bool,
    /// Claim one byte more than was written, like a misbehaving driver
    pub over_report_writes: bool,
    /// How many times a directory has been enumerated
    pub scans: usize,
    /// How many times a record has been written
    pub record_writes: usize,
}

impl Default for RamMedia {
    fn default() -> Self {
        RamMedia::new()
    }
}

impl RamMedia {
    /// An inserted card with an empty root directory.
    pub fn new() -> RamMedia {
        RamMedia {
            nodes: vec![Node {
                name: ShortFileName::this_dir(),
                long_name: None,
                attributes: Attributes::directory(),
                data: Vec::new(),
                children: Vec::new(),
            }],
            cursor: None,
            mounted: false,
            inserted: true,
            fail_mount: false,
            fail_record_writes: false,
            over_report_writes: false,
            scans: 0,
            record_writes: 0,
        }
    }

    fn child(&self, dir: usize, name: &ShortFileName) -> Option<usize> {
        self.nodes[dir]
            .children
            .iter()
            .copied()
            .find(|idx| self.nodes[*idx].name == *name)
    }

    fn add(&mut self, dir: usize, name: &str, attributes: Attributes, data: &[u8]) -> usize {
        let name = ShortFileName::create_from_str(name).expect("valid 8.3 name");
        if let Some(idx) = self.child(dir, &name) {
            return idx;
        }
        self.nodes.push(Node {
            name,
            long_name: None,
            attributes,
            data: data.to_vec(),
            children: Vec::new(),
        });
        let idx = self.nodes.len() - 1;
        self.nodes[dir].children.push(idx);
        idx
    }

    /// Find a node by absolute path.
    fn lookup(&self, path: &str) -> Option<usize> {
        let mut node = 0;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let name = ShortFileName::create_from_str(segment).ok()?;
            node = self.child(node, &name)?;
        }
        Some(node)
    }

    /// Add a directory (and any missing parents).
    pub fn dir(&mut self, path: &str) -> &mut Self {
        let mut node = 0;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = self.add(node, segment, Attributes::directory(), &[]);
        }
        self
    }

    /// Add a file (and any missing parent directories).
    pub fn file(&mut self, path: &str, contents: &[u8]) -> &mut Self {
        let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
        self.dir(parent);
        let parent = self.lookup(parent).expect("parent exists");
        self.add(parent, name, Attributes::file(), contents);
        self
    }

    /// Add a hidden file.
    pub fn hidden_file(&mut self, path: &str) -> &mut Self {
        self.file(path, b"");
        let node = self.lookup(path).expect("just added");
        self.nodes[node].attributes = Attributes::from_raw(Attributes::ARCHIVE | Attributes::HIDDEN);
        self
    }

    /// Give an existing entry a long file name.
    pub fn long_name(&mut self, path: &str, long_name: &str) -> &mut Self {
        let node = self.lookup(path).expect("path exists");
        self.nodes[node].long_name = Some(long_name.to_owned());
        self
    }

    /// The contents of a file, if it exists.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lookup(path).map(|node| self.nodes[node].data.clone())
    }

    /// Does this path exist?
    pub fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Overwrite a file's contents behind the card reader's back.
    pub fn set_contents(&mut self, path: &str, contents: &[u8]) {
        let node = self.lookup(path).expect("path exists");
        self.nodes[node].data = contents.to_vec();
    }

    fn check_mounted(&self) -> Result<(), Error> {
        if self.mounted && self.inserted {
            Ok(())
        } else {
            Err(Error::NotMounted)
        }
    }

    fn find_file(&self, dir: usize, name: &ShortFileName) -> Option<usize> {
        self.child(dir, name)
            .filter(|idx| !self.nodes[*idx].attributes.is_directory())
    }
}

impl BlockMedia for RamMedia {
    type Error = Error;
    type Dir = usize;

    fn is_inserted(&mut self) -> bool {
        self.inserted
    }

    fn mount(&mut self) -> Result<usize, Error> {
        if !self.inserted || self.fail_mount {
            return Err(Error::Injected);
        }
        self.mounted = true;
        Ok(0)
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.cursor = None;
    }

    fn iterate_dir<F>(&mut self, dir: usize, mut func: F) -> Result<(), Error>
    where
        F: FnMut(&DirEntry) -> ControlFlow<()>,
    {
        self.check_mounted()?;
        self.scans += 1;
        let mut slot = 0u16;
        if dir != 0 {
            for name in [ShortFileName::this_dir(), ShortFileName::parent_dir()] {
                let entry = DirEntry::new(name, Attributes::directory(), 0, slot);
                slot += 1;
                if func(&entry).is_break() {
                    return Ok(());
                }
            }
        }
        for idx in self.nodes[dir].children.iter() {
            let node = &self.nodes[*idx];
            let mut entry =
                DirEntry::new(node.name.clone(), node.attributes, node.data.len() as u32, slot);
            if let Some(lfn) = &node.long_name {
                entry = entry.with_long_name(lfn).expect("long name fits");
            }
            slot += 1;
            if func(&entry).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn open_dir(&mut self, parent: usize, entry: &DirEntry) -> Result<usize, Error> {
        self.check_mounted()?;
        self.child(parent, &entry.name)
            .filter(|idx| self.nodes[*idx].attributes.is_directory())
            .ok_or(Error::NotFound)
    }

    fn open_file(&mut self, dir: usize, name: &ShortFileName, mode: Mode) -> Result<u32, Error> {
        self.check_mounted()?;
        let node = match self.find_file(dir, name) {
            Some(node) => node,
            None if mode == Mode::ReadOnly => return Err(Error::NotFound),
            None => {
                self.nodes.push(Node {
                    name: name.clone(),
                    long_name: None,
                    attributes: Attributes::file(),
                    data: Vec::new(),
                    children: Vec::new(),
                });
                let idx = self.nodes.len() - 1;
                self.nodes[dir].children.push(idx);
                idx
            }
        };
        if mode == Mode::ReadWriteCreateOrTruncate {
            self.nodes[node].data.clear();
        }
        let len = self.nodes[node].data.len();
        let pos = if mode == Mode::ReadWriteCreateOrAppend { len } else { 0 };
        self.cursor = Some(Cursor { node, pos, mode });
        Ok(len as u32)
    }

    fn close_file(&mut self) -> Result<(), Error> {
        self.cursor.take().map(|_| ()).ok_or(Error::NotOpen)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        self.check_mounted()?;
        let cursor = self.cursor.as_mut().ok_or(Error::NotOpen)?;
        let data = &self.nodes[cursor.node].data;
        let n = buffer.len().min(data.len() - cursor.pos);
        buffer[..n].copy_from_slice(&data[cursor.pos..cursor.pos + n]);
        cursor.pos += n;
        Ok(n)
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize, Error> {
        self.check_mounted()?;
        let cursor = self.cursor.as_mut().ok_or(Error::NotOpen)?;
        assert!(cursor.mode != Mode::ReadOnly, "write to a read-only file");
        let data = &mut self.nodes[cursor.node].data;
        data.truncate(cursor.pos);
        data.extend_from_slice(buffer);
        cursor.pos += buffer.len();
        if self.over_report_writes {
            return Ok(buffer.len() + 1);
        }
        Ok(buffer.len())
    }

    fn seek(&mut self, offset: u32) -> Result<u32, Error> {
        self.check_mounted()?;
        let cursor = self.cursor.as_mut().ok_or(Error::NotOpen)?;
        cursor.pos = (offset as usize).min(self.nodes[cursor.node].data.len());
        Ok(cursor.pos as u32)
    }

    fn delete_file(&mut self, dir: usize, name: &ShortFileName) -> Result<bool, Error> {
        self.check_mounted()?;
        let Some(node) = self.find_file(dir, name) else {
            return Ok(false);
        };
        self.nodes[dir].children.retain(|idx| *idx != node);
        Ok(true)
    }

    fn read_record(
        &mut self,
        dir: usize,
        name: &ShortFileName,
        buffer: &mut [u8],
    ) -> Result<Option<usize>, Error> {
        self.check_mounted()?;
        Ok(self.find_file(dir, name).map(|node| {
            let data = &self.nodes[node].data;
            let n = buffer.len().min(data.len());
            buffer[..n].copy_from_slice(&data[..n]);
            data.len()
        }))
    }

    fn write_record(&mut self, dir: usize, name: &ShortFileName, data: &[u8]) -> Result<(), Error> {
        self.check_mounted()?;
        if self.fail_record_writes {
            return Err(Error::Injected);
        }
        self.record_writes += 1;
        let node = match self.find_file(dir, name) {
            Some(node) => node,
            None => {
                self.nodes.push(Node {
                    name: name.clone(),
                    long_name: None,
                    attributes: Attributes::file(),
                    data: Vec::new(),
                    children: Vec::new(),
                });
                let idx = self.nodes.len() - 1;
                self.nodes[dir].children.push(idx);
                idx
            }
        };
        self.nodes[node].data = data.to_vec();
        Ok(())
    }
}

/// A clock the test winds by hand.
#[derive(Debug, Clone, Default)]
pub struct TestTimeSource {
    millis: Rc<Cell<u32>>,
}

impl TestTimeSource {
    /// Move the clock forward.
    pub fn advance(&self, millis: u32) {
        self.millis.set(self.millis.get().wrapping_add(millis));
    }
}

impl TimeSource for TestTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.get())
    }
}

/// Make a time source that starts at zero.
pub fn make_time_source() -> TestTimeSource {
    TestTimeSource::default()
}

/// A card-detect switch the test flips by hand.
#[derive(Debug, Clone, Default)]
pub struct TestPin {
    pub level: Rc<Cell<bool>>,
}

impl embedded_hal::digital::ErrorType for TestPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::InputPin for TestPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

/// The card reader type most tests use.
pub type TestReader = CardReader<RamMedia, TestTimeSource>;

/// Turn on logging, if RUST_LOG asks for it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A mounted card reader over `media`.
pub fn make_reader(media: RamMedia) -> TestReader {
    init_logging();
    let mut card = CardReader::new(media, make_time_source());
    card.mount().expect("mount");
    card
}

/// A mounted card reader with a custom config and sort cache size.
#[allow(unused)]
pub fn make_reader_with<const N: usize>(
    media: RamMedia,
    config: Config,
) -> CardReader<RamMedia, TestTimeSource, N, 1> {
    init_logging();
    let mut card = CardReader::new_with_config(media, make_time_source(), config);
    card.mount().expect("mount");
    card
}

/// The display names of a listing, in order.
#[allow(unused)]
pub fn names<const N: usize, const P: usize>(
    card: &mut CardReader<RamMedia, TestTimeSource, N, P>,
) -> Vec<String> {
    let mut out = Vec::new();
    card.list(|_, entry| out.push(entry.display_name().to_string()))
        .expect("list");
    out
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
