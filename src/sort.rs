//! Alphabetical ordering of the working directory's entries.
//!
//! The cache holds at most `N` entries. A directory with more than that is
//! still fully navigable: the first `N` visible entries (in enumeration
//! order) are sorted, and anything past them is fetched from the media in
//! raw order when asked for.

use core::cmp::Ordering;

use heapless::Vec;

use crate::filesystem::DirEntry;
use crate::{debug, warn};

/// Where sub-directories go in a sorted listing.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FolderPlacement {
    /// Directories first, then files.
    #[default]
    Before,
    /// Directories and files mixed, purely by name.
    None,
    /// Files first, then directories.
    After,
}

impl FolderPlacement {
    /// The display order of two entries under this policy.
    pub fn compare(self, a: &DirEntry, b: &DirEntry) -> Ordering {
        let by_kind = match self {
            FolderPlacement::Before => b.is_directory().cmp(&a.is_directory()),
            FolderPlacement::None => Ordering::Equal,
            FolderPlacement::After => a.is_directory().cmp(&b.is_directory()),
        };
        by_kind.then_with(|| a.cmp_by_name(b))
    }
}

/// A cached, sorted view of one directory.
#[derive(Debug, Default)]
pub struct SortCache<const N: usize> {
    entries: Vec<DirEntry, N>,
    entry_count: u16,
    caching: bool,
    partial: bool,
    valid: bool,
}

impl<const N: usize> SortCache<N> {
    /// An empty, invalid cache.
    pub const fn new() -> SortCache<N> {
        SortCache {
            entries: Vec::new(),
            entry_count: 0,
            caching: false,
            partial: false,
            valid: false,
        }
    }

    /// Throw the cache away; the next listing rebuilds it.
    pub fn invalidate(&mut self) {
        if self.valid {
            debug!("Sort cache invalidated");
        }
        self.entries.clear();
        self.entry_count = 0;
        self.partial = false;
        self.valid = false;
    }

    /// Does the cache describe the current directory?
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Did the directory have more entries than the cache could hold?
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Number of sorted entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total visible entries seen by the last build, cached or not.
    pub fn entry_count(&self) -> u16 {
        self.entry_count
    }

    /// Start a rebuild. With `caching` false only entries are counted, which
    /// is all an unsorted listing needs.
    pub fn begin(&mut self, caching: bool) {
        self.invalidate();
        self.caching = caching;
    }

    /// Feed the next visible entry, in enumeration order.
    pub fn offer(&mut self, entry: &DirEntry) {
        self.entry_count = self.entry_count.saturating_add(1);
        if self.caching && !self.partial && self.entries.push(entry.clone()).is_err() {
            self.partial = true;
        }
    }

    /// Finish a rebuild by sorting what we kept.
    pub fn finish(&mut self, placement: FolderPlacement) {
        if self.partial {
            warn!(
                "Directory has {} entries, only sorting the first {}",
                self.entry_count,
                N
            );
        }
        self.entries
            .sort_unstable_by(|a, b| placement.compare(a, b));
        self.valid = true;
        debug!(
            "Sort cache built: {} cached of {}",
            self.entries.len(),
            self.entry_count
        );
    }

    /// The entry at a display position, if it's in the cache.
    pub fn get(&self, display_index: u16) -> Option<&DirEntry> {
        self.entries.get(usize::from(display_index))
    }

    /// Find a cached entry by either of its names.
    pub fn find(&self, segment: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.matches(segment))
    }

    /// The sort order as raw enumeration indices.
    pub fn order(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|e| e.raw_index)
    }
}

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
