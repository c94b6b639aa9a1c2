//! embedded-cardreader - Generic File System structures
//!
//! The media hands us decoded directory entries; these are the types we
//! keep them in, plus the names and paths we build from them.

mod attributes;
mod directory;
mod filename;
mod files;
mod timestamp;

pub use self::attributes::Attributes;
pub use self::directory::DirEntry;
pub use self::filename::{
    cmp_ignore_case, FilenameError, LongFileName, PathBuf, ShortFileName,
};
pub use self::files::Mode;
pub(crate) use self::files::OpenFile;
pub use self::timestamp::{TimeSource, Timestamp};
