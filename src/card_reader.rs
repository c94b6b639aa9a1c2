//! The Card Reader implementation.
//!
//! The card reader owns the media and every piece of state built on top of
//! it: the working directory, the sorted listing, the open job file, the
//! sub-file call stack and the recovery journal.

use core::fmt::Write;
use core::ops::ControlFlow;

use crate::call_stack::{CallFrame, CallStack};
use crate::config::Config;
use crate::filesystem::{DirEntry, Mode, OpenFile, PathBuf, ShortFileName, TimeSource};
use crate::media::BlockMedia;
use crate::navigator::{self, WorkDir};
use crate::progress::JobPosition;
use crate::recovery::{JobState, RecoveryJournal, RECOVERY_FILE_NAME};
use crate::sort::{FolderPlacement, SortCache};
use crate::{debug, trace, warn, Error, FILENAME_LEN, MAX_DIR_DEPTH};

/// `auto0.g` through `auto9.g`.
const AUTOSTART_LIMIT: u8 = 10;

/// What the card reader is doing.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CardState {
    /// No volume mounted.
    Idle,
    /// A volume is mounted; a file may be open but nothing is running.
    Mounted,
    /// A job file is being consumed.
    Printing,
    /// A job file is open but consumption is suspended.
    Paused,
}

/// Result of [`CardReader::cdup`].
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CdUp {
    /// We moved to the parent directory.
    Moved,
    /// We were already at the root, so nothing changed.
    AtRoot,
}

/// Result of [`CardReader::file_has_finished`].
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Finished {
    /// A called file ended and its parent is running again.
    Returned,
    /// The top-level job ended.
    JobComplete,
}

/// Result of [`CardReader::manage_media`].
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaChange {
    /// Nothing changed since the last poll.
    None,
    /// A card appeared. `mounted` is false if its volume was unreadable.
    Inserted {
        /// Did the automatic mount succeed?
        mounted: bool,
    },
    /// The card disappeared. `job_interrupted` is true if a job was running
    /// or paused on it; the caller should treat that job as lost.
    Removed {
        /// Was a job in progress?
        job_interrupted: bool,
    },
}

/// A snapshot of the job, for status reports.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JobStatus {
    /// What the card reader is doing.
    pub state: CardState,
    /// Bytes consumed from the open file.
    pub offset: u32,
    /// Size of the open file.
    pub size: u32,
}

/// A `CardReader` wraps a [`BlockMedia`] and gives you directory navigation,
/// sorted listings and print job control on top of it.
///
/// `SORT_LIMIT` is how many entries of a directory are sorted and cached.
/// `PROCEDURE_DEPTH` is how many sub-file calls may be nested.
pub struct CardReader<M, T, const SORT_LIMIT: usize = 64, const PROCEDURE_DEPTH: usize = 1>
where
    M: BlockMedia,
    T: TimeSource,
{
    media: M,
    time_source: T,
    config: Config,
    state: CardState,
    media_present: bool,
    work_dir: WorkDir<M::Dir>,
    sort_cache: SortCache<SORT_LIMIT>,
    file: Option<OpenFile>,
    selected: Option<DirEntry>,
    call_stack: CallStack<PROCEDURE_DEPTH>,
    journal: RecoveryJournal,
    autostart_index: Option<u8>,
    abort_requested: bool,
}

impl<M, T> CardReader<M, T>
where
    M: BlockMedia,
    T: TimeSource,
{
    /// Create a new Card Reader using a generic `BlockMedia`.
    ///
    /// This creates a `CardReader` with the default [`Config`], a sort cache
    /// of 64 entries and one level of sub-file calls. Call
    /// `CardReader::new_with_config` if you need something else.
    pub fn new(media: M, time_source: T) -> CardReader<M, T> {
        Self::new_with_config(media, time_source, Config::default())
    }
}

impl<M, T, const SORT_LIMIT: usize, const PROCEDURE_DEPTH: usize>
    CardReader<M, T, SORT_LIMIT, PROCEDURE_DEPTH>
where
    M: BlockMedia,
    T: TimeSource,
{
    /// Create a new Card Reader with the given policy. Capacities come from
    /// the type's `const` parameters.
    pub fn new_with_config(
        media: M,
        time_source: T,
        config: Config,
    ) -> CardReader<M, T, SORT_LIMIT, PROCEDURE_DEPTH> {
        debug!("Creating new embedded-cardreader::CardReader");
        let journal = RecoveryJournal::new(config.recovery_interval_ms);
        CardReader {
            media,
            time_source,
            config,
            state: CardState::Idle,
            media_present: false,
            work_dir: WorkDir::new(),
            sort_cache: SortCache::new(),
            file: None,
            selected: None,
            call_stack: CallStack::new(),
            journal,
            autostart_index: None,
            abort_requested: false,
        }
    }

    /// Temporarily get access to the underlying media.
    pub fn media(&mut self) -> &mut M {
        &mut self.media
    }

    /// Consume self and return the media and time source
    pub fn free(self) -> (M, T) {
        (self.media, self.time_source)
    }

    /// The policy we were built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// What we're doing right now.
    pub fn state(&self) -> CardState {
        self.state
    }

    /// Is a volume mounted?
    pub fn is_mounted(&self) -> bool {
        self.state != CardState::Idle
    }

    // ************************************************************************
    //
    // Media
    //
    // ************************************************************************

    /// Mount the volume and go to its root directory.
    ///
    /// Anything already mounted is released first.
    pub fn mount(&mut self) -> Result<(), Error<M::Error>> {
        if self.is_mounted() {
            self.release();
        }
        if !self.media.is_inserted() {
            warn!("No media inserted");
            return Err(Error::MediaAbsent);
        }
        self.media_present = true;
        let root = match self.media.mount() {
            Ok(root) => root,
            Err(_e) => {
                warn!("Media inserted but the volume can't be read");
                return Err(Error::MediaUnmounted);
            }
        };
        self.work_dir.reset(root);
        self.sort_cache.invalidate();
        self.state = CardState::Mounted;
        debug!("Media mounted");
        Ok(())
    }

    /// Close everything and unmount. Safe to call when nothing is mounted.
    pub fn release(&mut self) {
        if self.file.take().is_some() && self.media.close_file().is_err() {
            warn!("Failed to close the open file on release");
        }
        self.call_stack.clear();
        self.selected = None;
        self.sort_cache.invalidate();
        self.work_dir.clear();
        self.abort_requested = false;
        self.autostart_index = None;
        if self.state != CardState::Idle {
            self.media.unmount();
            debug!("Media released");
        }
        self.state = CardState::Idle;
    }

    /// Poll the card-detect state and react to a change: mount on insert
    /// (and arm autostart), release on removal.
    pub fn manage_media(&mut self) -> MediaChange {
        let present = self.media.is_inserted();
        if present == self.media_present {
            return MediaChange::None;
        }
        self.media_present = present;
        if present {
            let mounted = self.is_mounted() || self.mount().is_ok();
            if mounted {
                self.begin_autostart();
            }
            MediaChange::Inserted { mounted }
        } else {
            let job_interrupted = matches!(self.state, CardState::Printing | CardState::Paused);
            if job_interrupted {
                warn!("Media removed during a job");
            }
            self.release();
            MediaChange::Removed { job_interrupted }
        }
    }

    fn root(&self) -> Result<M::Dir, Error<M::Error>> {
        self.work_dir.root().ok_or(Error::MediaUnmounted)
    }

    fn cwd(&self) -> Result<M::Dir, Error<M::Error>> {
        self.work_dir.current().ok_or(Error::MediaUnmounted)
    }

    // ************************************************************************
    //
    // Directory navigation
    //
    // ************************************************************************

    /// Change directory. Accepts `.`, `..`, multi-level paths, and absolute
    /// paths starting with `/`.
    ///
    /// Either the whole path resolves and we move, or nothing changes.
    pub fn cd(&mut self, relpath: &str) -> Result<(), Error<M::Error>> {
        let resolved = self.resolve_dir(relpath)?;
        self.work_dir = resolved;
        self.sort_cache.invalidate();
        debug!("cd {} (depth {})", relpath, self.work_dir.depth());
        Ok(())
    }

    /// Go to the parent directory.
    pub fn cdup(&mut self) -> Result<CdUp, Error<M::Error>> {
        self.cwd()?;
        if self.work_dir.pop().is_some() {
            self.sort_cache.invalidate();
            debug!("cdup (depth {})", self.work_dir.depth());
            Ok(CdUp::Moved)
        } else {
            Ok(CdUp::AtRoot)
        }
    }

    /// Go to the root directory.
    pub fn cdroot(&mut self) -> Result<(), Error<M::Error>> {
        self.cwd()?;
        self.work_dir.cdroot();
        self.sort_cache.invalidate();
        Ok(())
    }

    /// How many directories below the root we are.
    pub fn depth(&self) -> usize {
        self.work_dir.depth()
    }

    /// Name of the working directory, `None` at the root.
    pub fn work_dir_name(&self) -> Option<&ShortFileName> {
        self.work_dir.name()
    }

    /// Absolute path of the working directory, with a trailing `/`.
    pub fn work_dir_path(&self) -> Option<PathBuf> {
        self.work_dir.root()?;
        self.work_dir.path()
    }

    /// Walk `path` from the working directory (or the root, if absolute) on
    /// a copy of the stack.
    fn resolve_dir(&mut self, path: &str) -> Result<WorkDir<M::Dir>, Error<M::Error>> {
        self.cwd()?;
        let mut scratch = if path.starts_with('/') {
            self.work_dir.rooted()
        } else {
            self.work_dir.clone()
        };
        for segment in navigator::segments(path) {
            match segment {
                "." => {}
                ".." => {
                    let _ = scratch.pop();
                }
                name => {
                    let dir = scratch.current().ok_or(Error::MediaUnmounted)?;
                    let entry = match navigator::find_entry(&mut self.media, dir, name)? {
                        Some(entry) if entry.is_directory() => entry,
                        _ => return Err(Error::PathNotFound),
                    };
                    let sub = self.media.open_dir(dir, &entry)?;
                    if scratch.push(sub, entry.name).is_err() {
                        warn!("{} is deeper than {} directories", path, MAX_DIR_DEPTH);
                        return Err(Error::DepthExceeded);
                    }
                }
            }
        }
        Ok(scratch)
    }

    /// Resolve the directory part of `path` and split off the file name.
    fn locate<'p>(&mut self, path: &'p str) -> Result<(WorkDir<M::Dir>, &'p str), Error<M::Error>> {
        let (parent, file_name) = navigator::split_last(path);
        if matches!(file_name, "" | "." | "..") {
            return Err(Error::NotAFile);
        }
        Ok((self.resolve_dir(parent)?, file_name))
    }

    // ************************************************************************
    //
    // Listing
    //
    // ************************************************************************

    /// Make sure the sort cache (or, with sorting off, the entry count)
    /// describes the working directory.
    fn ensure_listing(&mut self) -> Result<(), Error<M::Error>> {
        if self.sort_cache.is_valid() {
            return Ok(());
        }
        let dir = self.cwd()?;
        let config = &self.config;
        let cache = &mut self.sort_cache;
        cache.begin(config.sort_enabled);
        self.media.iterate_dir(dir, |entry| {
            if is_visible(config, entry) {
                cache.offer(entry);
            }
            ControlFlow::Continue(())
        })?;
        cache.finish(config.folder_placement);
        Ok(())
    }

    /// Number of listable entries in the working directory.
    pub fn file_count(&mut self) -> Result<u16, Error<M::Error>> {
        self.ensure_listing()?;
        Ok(self.sort_cache.entry_count())
    }

    /// The entry at a position in the listing.
    ///
    /// Positions past the sort cache are still served, by scanning the
    /// directory, so nothing is ever unreachable.
    pub fn get_entry_at(&mut self, display_index: u16) -> Result<Option<DirEntry>, Error<M::Error>> {
        self.ensure_listing()?;
        let count = self.sort_cache.entry_count();
        if display_index >= count {
            return Ok(None);
        }
        let dir = self.cwd()?;
        if self.config.sort_enabled {
            if let Some(entry) = self.sort_cache.get(display_index) {
                return Ok(Some(entry.clone()));
            }
            trace!("Entry {} is past the sort cache", display_index);
            return nth_visible(&mut self.media, &self.config, dir, display_index);
        }
        let raw = if self.config.recent_first {
            count - 1 - display_index
        } else {
            display_index
        };
        nth_visible(&mut self.media, &self.config, dir, raw)
    }

    /// Call `func` for every listable entry of the working directory, in
    /// display order.
    pub fn list<F>(&mut self, mut func: F) -> Result<(), Error<M::Error>>
    where
        F: FnMut(u16, &DirEntry),
    {
        let count = self.file_count()?;
        for index in 0..count {
            if let Some(entry) = self.get_entry_at(index)? {
                func(index, &entry);
            }
        }
        Ok(())
    }

    /// Call `func` for every listable entry below the working directory,
    /// recursively, with the absolute path of the directory holding it.
    pub fn list_all<F>(&mut self, mut func: F) -> Result<(), Error<M::Error>>
    where
        F: FnMut(&str, &DirEntry),
    {
        let dir = self.cwd()?;
        let mut prefix = PathBuf::new();
        self.work_dir
            .write_path(&mut prefix)
            .map_err(|_| Error::PathTooLong)?;
        let depth = self.work_dir.depth();
        self.list_dir(dir, &mut prefix, depth, &mut func)
    }

    fn list_dir<F>(
        &mut self,
        dir: M::Dir,
        prefix: &mut PathBuf,
        depth: usize,
        func: &mut F,
    ) -> Result<(), Error<M::Error>>
    where
        F: FnMut(&str, &DirEntry),
    {
        let mut index = 0;
        while let Some(entry) = nth_visible(&mut self.media, &self.config, dir, index)? {
            index += 1;
            func(prefix.as_str(), &entry);
            if entry.is_directory() && depth < MAX_DIR_DEPTH {
                let sub = self.media.open_dir(dir, &entry)?;
                let restore = prefix.len();
                write!(prefix, "{}/", entry.name).map_err(|_| Error::PathTooLong)?;
                self.list_dir(sub, prefix, depth + 1, func)?;
                prefix.truncate(restore);
            }
        }
        Ok(())
    }

    /// Turn sorting on or off. The listing is rebuilt on next use.
    pub fn set_sort_enabled(&mut self, enabled: bool) {
        self.config.sort_enabled = enabled;
        self.sort_cache.invalidate();
    }

    /// Change where directories go in a sorted listing.
    pub fn set_folder_placement(&mut self, placement: FolderPlacement) {
        self.config.folder_placement = placement;
        self.sort_cache.invalidate();
    }

    /// Did the working directory overflow the sort cache?
    pub fn is_sort_partial(&self) -> bool {
        self.sort_cache.is_partial()
    }

    /// Select the entry at a listing position.
    pub fn select_file_by_index(&mut self, index: u16) -> Result<Option<DirEntry>, Error<M::Error>> {
        let entry = self.get_entry_at(index)?;
        self.selected = entry.clone();
        Ok(entry)
    }

    /// Select a listable entry of the working directory by either of its
    /// names.
    pub fn select_file_by_name(&mut self, name: &str) -> Result<Option<DirEntry>, Error<M::Error>> {
        self.ensure_listing()?;
        let cached = self.sort_cache.find(name).cloned();
        let complete = self.config.sort_enabled && !self.sort_cache.is_partial();
        let entry = match cached {
            Some(entry) => Some(entry),
            None if complete => None,
            None => {
                let dir = self.cwd()?;
                find_visible(&mut self.media, &self.config, dir, name)?
            }
        };
        self.selected = entry.clone();
        Ok(entry)
    }

    /// The last selected entry.
    pub fn selected(&self) -> Option<&DirEntry> {
        self.selected.as_ref()
    }

    /// Find an entry, consulting the sort cache if `dir` is the working
    /// directory.
    fn lookup(&mut self, dir: M::Dir, segment: &str) -> Result<Option<DirEntry>, Error<M::Error>> {
        if self.sort_cache.is_valid() && self.work_dir.current() == Some(dir) {
            if let Some(entry) = self.sort_cache.find(segment) {
                return Ok(Some(entry.clone()));
            }
        }
        Ok(navigator::find_entry(&mut self.media, dir, segment)?)
    }

    /// Write the long-name form of a path of 8.3 names into `out`.
    ///
    /// Segments without a long name are written as they are.
    pub fn write_long_path<W: Write>(&mut self, path: &str, out: &mut W) -> Result<(), Error<M::Error>> {
        self.cwd()?;
        let mut location = if path.starts_with('/') {
            out.write_char('/').map_err(|_| Error::PathTooLong)?;
            self.work_dir.rooted()
        } else {
            self.work_dir.clone()
        };
        let mut segments = navigator::segments(path).peekable();
        let mut first = true;
        while let Some(segment) = segments.next() {
            let dir = location.current().ok_or(Error::MediaUnmounted)?;
            let entry = self.lookup(dir, segment)?.ok_or(Error::PathNotFound)?;
            if !first {
                out.write_char('/').map_err(|_| Error::PathTooLong)?;
            }
            first = false;
            out.write_str(&entry.display_name())
                .map_err(|_| Error::PathTooLong)?;
            if segments.peek().is_some() {
                if !entry.is_directory() {
                    return Err(Error::PathNotFound);
                }
                let sub = self.media.open_dir(dir, &entry)?;
                location
                    .push(sub, entry.name)
                    .map_err(|_| Error::DepthExceeded)?;
            }
        }
        Ok(())
    }

    // ************************************************************************
    //
    // Files
    //
    // ************************************************************************

    fn close_open_file(&mut self) -> Result<(), Error<M::Error>> {
        if let Some(file) = self.file.take() {
            self.media.close_file()?;
            if file.mode.is_write() {
                // Its listed size is stale
                self.sort_cache.invalidate();
            }
        }
        Ok(())
    }

    /// Open `path` as the one open file. Resolution happens before the
    /// previous file is closed, so a bad path leaves it alone.
    fn open_path(&mut self, path: &str, mode: Mode) -> Result<(), Error<M::Error>> {
        let (location, file_name) = self.locate(path)?;
        let dir = location.current().ok_or(Error::MediaUnmounted)?;
        let name = match navigator::find_entry(&mut self.media, dir, file_name)? {
            Some(entry) if entry.is_directory() => return Err(Error::NotAFile),
            Some(entry) => entry.name,
            None if mode.is_write() => {
                ShortFileName::create_from_str(file_name).map_err(Error::FilenameError)?
            }
            None => return Err(Error::PathNotFound),
        };
        let abs = absolute_path(&location, &name)?;
        self.close_open_file()?;
        let size = self.media.open_file(dir, &name, mode)?;
        let position = match mode {
            Mode::ReadWriteCreateOrAppend => JobPosition::at_end(size),
            _ => JobPosition::new(size),
        };
        debug!("Opened {} ({} bytes)", abs.as_str(), size);
        self.file = Some(OpenFile {
            path: abs,
            mode,
            position,
        });
        if mode.is_write() {
            self.sort_cache.invalidate();
        }
        Ok(())
    }

    /// Open a file as a new top-level job, ending any job in progress if the
    /// old file had to be closed.
    fn open_top_level(&mut self, path: &str, mode: Mode) -> Result<(), Error<M::Error>> {
        let result = self.open_path(path, mode);
        if result.is_ok() || self.file.is_none() {
            self.call_stack.clear();
            self.stop_job();
        }
        result
    }

    fn stop_job(&mut self) {
        if matches!(self.state, CardState::Printing | CardState::Paused) {
            self.state = CardState::Mounted;
        }
    }

    /// Open a file for reading. It's selected but not started.
    pub fn open_file_read(&mut self, path: &str) -> Result<(), Error<M::Error>> {
        self.open_top_level(path, Mode::ReadOnly)
    }

    /// Create (or truncate) a file to save a job into.
    pub fn open_file_write(&mut self, path: &str) -> Result<(), Error<M::Error>> {
        self.open_top_level(path, Mode::ReadWriteCreateOrTruncate)
    }

    /// Open a file to append command lines to.
    pub fn open_log_file(&mut self, path: &str) -> Result<(), Error<M::Error>> {
        self.open_top_level(path, Mode::ReadWriteCreateOrAppend)
    }

    /// Open a file and start printing it. If a job is already printing, the
    /// file is run as a sub-file call instead.
    pub fn open_and_print_file(&mut self, path: &str) -> Result<(), Error<M::Error>> {
        if self.is_printing() {
            return self.push_call(path);
        }
        self.open_file_read(path)?;
        self.start_print()
    }

    /// Close the open file, ending any job.
    pub fn close_file(&mut self) -> Result<(), Error<M::Error>> {
        self.call_stack.clear();
        self.stop_job();
        self.close_open_file()
    }

    /// Delete a file. The open file can't be deleted.
    pub fn remove_file(&mut self, path: &str) -> Result<(), Error<M::Error>> {
        let (location, file_name) = self.locate(path)?;
        let dir = location.current().ok_or(Error::MediaUnmounted)?;
        let entry = match navigator::find_entry(&mut self.media, dir, file_name)? {
            Some(entry) if entry.is_directory() => return Err(Error::NotAFile),
            Some(entry) => entry,
            None => return Err(Error::PathNotFound),
        };
        let abs = absolute_path(&location, &entry.name)?;
        if self.file.as_ref().is_some_and(|f| f.path == abs) {
            return Err(Error::FileAlreadyOpen);
        }
        self.media.delete_file(dir, &entry.name)?;
        self.sort_cache.invalidate();
        if self.selected.as_ref() == Some(&entry) && location.current() == self.work_dir.current() {
            self.selected = None;
        }
        debug!("Deleted {}", abs.as_str());
        Ok(())
    }

    /// Is any file open?
    pub fn is_file_open(&self) -> bool {
        self.file.is_some()
    }

    /// Is the open file being written?
    pub fn is_saving(&self) -> bool {
        self.file.as_ref().is_some_and(|f| f.mode.is_write())
    }

    /// Absolute 8.3 path of the open file.
    pub fn abs_filename(&self) -> Option<&str> {
        self.file.as_ref().map(|f| f.path.as_str())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, Error<M::Error>> {
        let file = self.file.as_mut().ok_or(Error::NoFileOpen)?;
        let n = self.media.read(buffer)?;
        file.position.advance(n);
        trace!("Read {} bytes, now at {}", n, file.position.offset());
        Ok(n)
    }

    fn write_bytes(&mut self, buffer: &[u8]) -> Result<usize, Error<M::Error>> {
        let file = self.file.as_mut().ok_or(Error::NoFileOpen)?;
        if !file.mode.is_write() {
            return Err(Error::ReadOnly);
        }
        let n = self.media.write(buffer)?.min(buffer.len());
        file.position.record_write(n);
        Ok(n)
    }

    fn write_all_bytes(&mut self, mut buffer: &[u8]) -> Result<(), Error<M::Error>> {
        while !buffer.is_empty() {
            match self.write_bytes(buffer)? {
                0 => return Err(Error::DiskFull),
                n => buffer = &buffer[n..],
            }
        }
        Ok(())
    }

    /// The next byte of the open file, `None` at the end.
    pub fn next_byte(&mut self) -> Result<Option<u8>, Error<M::Error>> {
        let mut byte = [0u8; 1];
        Ok(match self.read_bytes(&mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    /// Append a command line, with a CR LF, to the file being saved.
    pub fn write_command(&mut self, line: &str) -> Result<(), Error<M::Error>> {
        self.write_all_bytes(line.as_bytes())?;
        self.write_all_bytes(b"\r\n")
    }

    // ************************************************************************
    //
    // Job position
    //
    // ************************************************************************

    fn job_file(&self) -> Option<&OpenFile> {
        self.file.as_ref().filter(|f| !f.mode.is_write())
    }

    /// Start (or continue) consuming the open file.
    pub fn start_print(&mut self) -> Result<(), Error<M::Error>> {
        if self.job_file().is_none() {
            return Err(Error::NoFileOpen);
        }
        if self.state != CardState::Printing {
            debug!("Printing");
        }
        self.state = CardState::Printing;
        Ok(())
    }

    /// Suspend the job, keeping the file open and the offset where it is.
    pub fn pause(&mut self) {
        if self.state == CardState::Printing {
            debug!("Paused");
            self.state = CardState::Paused;
        }
    }

    /// Continue a paused job.
    pub fn resume(&mut self) -> Result<(), Error<M::Error>> {
        self.start_print()
    }

    /// Is a job being consumed?
    pub fn is_printing(&self) -> bool {
        self.state == CardState::Printing
    }

    /// Is a file open but not being consumed?
    pub fn is_paused(&self) -> bool {
        self.file.is_some() && self.state != CardState::Printing
    }

    /// Bytes consumed from the open file.
    pub fn offset(&self) -> u32 {
        self.file.as_ref().map_or(0, |f| f.position.offset())
    }

    /// Size of the open file.
    pub fn file_size(&self) -> u32 {
        self.file.as_ref().map_or(0, |f| f.position.size())
    }

    /// Has the open file been consumed?
    pub fn eof(&self) -> bool {
        self.file.as_ref().map_or(true, |f| f.position.eof())
    }

    /// Move within the open file.
    ///
    /// The media clamps out-of-range offsets to the end of the file; keeping
    /// `offset` meaningful is the caller's job.
    pub fn set_offset(&mut self, offset: u32) -> Result<(), Error<M::Error>> {
        let file = self.file.as_mut().ok_or(Error::NoFileOpen)?;
        let actual = self.media.seek(offset)?;
        file.position.set(actual);
        Ok(())
    }

    /// Whole percent of the open file consumed.
    pub fn percent_done(&self) -> u8 {
        self.file.as_ref().map_or(0, |f| f.position.percent_done())
    }

    /// Hundredths of a percent consumed, if enabled in the [`Config`].
    pub fn permyriad_done(&self) -> Option<u16> {
        if !self.config.permyriad_progress {
            return None;
        }
        Some(self.file.as_ref().map_or(0, |f| f.position.permyriad_done()))
    }

    /// A snapshot for status reports.
    pub fn status(&self) -> JobStatus {
        JobStatus {
            state: self.state,
            offset: self.offset(),
            size: self.file_size(),
        }
    }

    /// Ask the main loop to abandon the job. Nothing here stops on its own;
    /// the loop checks [`CardReader::abort_requested`] between operations.
    pub fn request_abort(&mut self) {
        self.abort_requested = true;
    }

    /// Has an abort been requested?
    pub fn abort_requested(&self) -> bool {
        self.abort_requested
    }

    /// Finish or abandon the job: close the file and clear the abort flag.
    pub fn end_file_print(&mut self) -> Result<(), Error<M::Error>> {
        self.abort_requested = false;
        self.close_file()
    }

    /// Call when the open file hits its end. Returns to the parent if this
    /// was a called file, otherwise ends the job and clears the recovery
    /// record.
    pub fn file_has_finished(&mut self) -> Result<Finished, Error<M::Error>> {
        if !self.call_stack.is_empty() {
            self.pop_call()?;
            return Ok(Finished::Returned);
        }
        self.end_file_print()?;
        self.clear_recovery()?;
        debug!("Job complete");
        Ok(Finished::JobComplete)
    }

    // ************************************************************************
    //
    // Sub-file calls
    //
    // ************************************************************************

    /// How many sub-file calls are active.
    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    /// Run another file from the current position of the open one.
    ///
    /// If the call can't be made, the open file and its offset are as they
    /// were.
    pub fn push_call(&mut self, path: &str) -> Result<(), Error<M::Error>> {
        let parent = self.job_file().ok_or(Error::NoFileOpen)?;
        let frame = CallFrame {
            saved_offset: parent.position.offset(),
            filename: parent.path.clone(),
            depth: u8::try_from(self.call_stack.depth()).unwrap_or(u8::MAX),
        };
        if self.call_stack.push(frame).is_err() {
            warn!("Call to {} exceeds depth {}", path, PROCEDURE_DEPTH);
            return Err(Error::DepthExceeded);
        }
        if let Err(e) = self.open_path(path, Mode::ReadOnly) {
            if let Some(frame) = self.call_stack.pop() {
                if self.file.is_none() {
                    self.reopen(&frame.filename, frame.saved_offset)?;
                }
            }
            return Err(e);
        }
        debug!("Called {} (depth {})", path, self.call_stack.depth());
        Ok(())
    }

    /// Return from a sub-file call to where the parent left off.
    pub fn pop_call(&mut self) -> Result<(), Error<M::Error>> {
        let frame = self.call_stack.pop().ok_or(Error::NoActiveCall)?;
        self.reopen(&frame.filename, frame.saved_offset)?;
        debug!(
            "Returned to {} @ {}",
            frame.filename.as_str(),
            frame.saved_offset
        );
        Ok(())
    }

    fn reopen(&mut self, path: &str, offset: u32) -> Result<(), Error<M::Error>> {
        let result = match self.open_path(path, Mode::ReadOnly) {
            Ok(()) => self.set_offset(offset),
            Err(e) => Err(e),
        };
        if result.is_err() && self.file.is_none() {
            warn!("Lost the parent file {}", path);
            self.call_stack.clear();
            self.stop_job();
        }
        result
    }

    // ************************************************************************
    //
    // Autostart
    //
    // ************************************************************************

    /// Arm autostart, if the [`Config`] allows it. Called on every insert.
    pub fn begin_autostart(&mut self) {
        self.autostart_index = if self.config.autostart { Some(0) } else { None };
    }

    /// If armed and idle, start the next `autoN.g` from the root. Returns
    /// whether one was started. Autostart disarms at the first missing file.
    pub fn check_autostart(&mut self) -> Result<bool, Error<M::Error>> {
        let Some(index) = self.autostart_index else {
            return Ok(false);
        };
        if !self.is_mounted() || self.is_file_open() {
            return Ok(false);
        }
        if index >= AUTOSTART_LIMIT {
            self.autostart_index = None;
            return Ok(false);
        }
        let mut path: heapless::String<FILENAME_LEN> = heapless::String::new();
        write!(path, "/AUTO{}.G", index).map_err(|_| Error::PathTooLong)?;
        let root = self.root()?;
        match navigator::find_entry(&mut self.media, root, &path[1..])? {
            Some(entry) if !entry.is_directory() => {
                self.autostart_index = Some(index + 1);
                debug!("Autostarting {}", path.as_str());
                self.open_and_print_file(&path)?;
                Ok(true)
            }
            _ => {
                self.autostart_index = None;
                Ok(false)
            }
        }
    }

    // ************************************************************************
    //
    // Power-loss recovery
    //
    // ************************************************************************

    /// The record lives in the root, so a root listing is now stale.
    fn root_touched(&mut self) {
        if self.work_dir.is_root() {
            self.sort_cache.invalidate();
            if self.selected.as_ref().is_some_and(|e| e.name.matches(RECOVERY_FILE_NAME)) {
                self.selected = None;
            }
        }
    }

    fn job_state(&self) -> Option<JobState> {
        self.job_file().map(|f| JobState {
            filename: f.path.clone(),
            offset: f.position.offset(),
        })
    }

    /// Save the job position if printing and the save interval has passed.
    /// Call this from the main loop as often as you like.
    pub fn checkpoint(&mut self) -> Result<bool, Error<M::Error>> {
        if self.state != CardState::Printing {
            return Ok(false);
        }
        let Some(state) = self.job_state() else {
            return Ok(false);
        };
        let root = self.root()?;
        let now = self.time_source.get_timestamp();
        let saved = self.journal.save_if_due(&mut self.media, root, &state, now)?;
        if saved {
            self.root_touched();
        }
        Ok(saved)
    }

    /// Save the job position now. Inside a sub-file call this records the
    /// called file.
    pub fn save_recovery(&mut self) -> Result<(), Error<M::Error>> {
        let state = self.job_state().ok_or(Error::NoFileOpen)?;
        let root = self.root()?;
        let now = self.time_source.get_timestamp();
        self.journal.save(&mut self.media, root, &state, now)?;
        self.root_touched();
        Ok(())
    }

    /// Is there a well-formed recovery record?
    pub fn recovery_exists(&mut self) -> Result<bool, Error<M::Error>> {
        let root = self.root()?;
        self.journal.exists(&mut self.media, root)
    }

    /// Read the recovery record.
    pub fn load_recovery(&mut self) -> Result<JobState, Error<M::Error>> {
        let root = self.root()?;
        self.journal.load(&mut self.media, root)
    }

    /// Delete the recovery record.
    pub fn clear_recovery(&mut self) -> Result<bool, Error<M::Error>> {
        let root = self.root()?;
        let removed = self.journal.clear(&mut self.media, root)?;
        if removed {
            self.root_touched();
        }
        Ok(removed)
    }

    /// Open a recovered job's file at its saved offset, ready for
    /// [`CardReader::start_print`].
    pub fn open_recovered(&mut self, state: &JobState) -> Result<(), Error<M::Error>> {
        self.open_file_read(&state.filename)?;
        self.set_offset(state.offset)
    }
}

impl<M, T, const SORT_LIMIT: usize, const PROCEDURE_DEPTH: usize> embedded_io::ErrorType
    for CardReader<M, T, SORT_LIMIT, PROCEDURE_DEPTH>
where
    M: BlockMedia,
    T: TimeSource,
{
    type Error = Error<M::Error>;
}

impl<M, T, const SORT_LIMIT: usize, const PROCEDURE_DEPTH: usize> embedded_io::Read
    for CardReader<M, T, SORT_LIMIT, PROCEDURE_DEPTH>
where
    M: BlockMedia,
    T: TimeSource,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_bytes(buf)
    }
}

impl<M, T, const SORT_LIMIT: usize, const PROCEDURE_DEPTH: usize> embedded_io::Write
    for CardReader<M, T, SORT_LIMIT, PROCEDURE_DEPTH>
where
    M: BlockMedia,
    T: TimeSource,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.write_bytes(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        // The media writes through; closing the file flushes it.
        Ok(())
    }
}

/// Entries that show up in listings: directories and job files, minus dot
/// entries, hidden files and volume labels.
fn is_visible(config: &Config, entry: &DirEntry) -> bool {
    if entry.is_dot() || entry.attributes.is_hidden() || entry.attributes.is_volume() {
        return false;
    }
    if entry
        .long_name
        .as_ref()
        .is_some_and(|lfn| lfn.starts_with('.'))
    {
        return false;
    }
    entry.is_directory() || config.is_job_file(&entry.name)
}

/// The `n`th visible entry of `dir` in enumeration order.
fn nth_visible<M>(
    media: &mut M,
    config: &Config,
    dir: M::Dir,
    n: u16,
) -> Result<Option<DirEntry>, Error<M::Error>>
where
    M: BlockMedia,
{
    let mut seen = 0u16;
    let mut found = None;
    media.iterate_dir(dir, |entry| {
        if !is_visible(config, entry) {
            return ControlFlow::Continue(());
        }
        if seen == n {
            found = Some(entry.clone());
            return ControlFlow::Break(());
        }
        seen += 1;
        ControlFlow::Continue(())
    })?;
    Ok(found)
}

/// A visible entry of `dir` by either of its names.
fn find_visible<M>(
    media: &mut M,
    config: &Config,
    dir: M::Dir,
    name: &str,
) -> Result<Option<DirEntry>, Error<M::Error>>
where
    M: BlockMedia,
{
    let mut found = None;
    media.iterate_dir(dir, |entry| {
        if is_visible(config, entry) && entry.matches(name) {
            found = Some(entry.clone());
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    Ok(found)
}

fn absolute_path<D, E>(location: &WorkDir<D>, name: &ShortFileName) -> Result<PathBuf, Error<E>>
where
    E: core::fmt::Debug,
{
    let mut abs = PathBuf::new();
    location
        .write_path(&mut abs)
        .map_err(|_| Error::PathTooLong)?;
    write!(abs, "{}", name).map_err(|_| Error::PathTooLong)?;
    Ok(abs)
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
