use core::cmp::Ordering;

use crate::filesystem::{cmp_ignore_case, Attributes, FilenameError, LongFileName, ShortFileName};

/// Represents a directory entry, which tells you about
/// other files and directories.
///
/// Entries are produced by the [`BlockMedia`](crate::BlockMedia) and never
/// modified afterwards.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DirEntry {
    /// The 8.3 name of the file
    pub name: ShortFileName,
    /// The long file name, if the media stored one
    pub long_name: Option<LongFileName>,
    /// The file attributes (Directory, Hidden, etc)
    pub attributes: Attributes,
    /// The size of the file in bytes.
    pub size: u32,
    /// Position of this entry in the directory's natural enumeration order.
    pub raw_index: u16,
}

impl DirEntry {
    /// Make an entry without a long file name.
    pub fn new(name: ShortFileName, attributes: Attributes, size: u32, raw_index: u16) -> DirEntry {
        DirEntry {
            name,
            long_name: None,
            attributes,
            size,
            raw_index,
        }
    }

    /// Attach a long file name.
    pub fn with_long_name(mut self, long_name: &str) -> Result<DirEntry, FilenameError> {
        let mut lfn = LongFileName::new();
        lfn.push_str(long_name)
            .map_err(|_| FilenameError::NameTooLong)?;
        self.long_name = Some(lfn);
        Ok(self)
    }

    /// Does this entry point at a directory?
    pub fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }

    /// Is this one of the `.` or `..` entries?
    pub fn is_dot(&self) -> bool {
        self.name.is_dot()
    }

    /// The long name if we have one, otherwise the 8.3 name.
    pub fn display_name(&self) -> LongFileName {
        match &self.long_name {
            Some(lfn) => lfn.clone(),
            None => {
                let mut out = LongFileName::new();
                // An 8.3 name is always shorter than a long one.
                let _ = out.push_str(&self.name.to_buf());
                out
            }
        }
    }

    /// Does a path segment name this entry, by either of its names?
    pub fn matches(&self, segment: &str) -> bool {
        self.name.matches(segment)
            || self
                .long_name
                .as_ref()
                .is_some_and(|lfn| lfn.eq_ignore_ascii_case(segment))
    }

    /// Case-insensitive display name order, ties broken by enumeration order.
    pub fn cmp_by_name(&self, other: &DirEntry) -> Ordering {
        cmp_ignore_case(&self.display_name(), &other.display_name())
            .then(self.raw_index.cmp(&other.raw_index))
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
