//! # embedded-cardreader
//!
//! > A removable-media print job manager written in Embedded Rust
//!
//! This crate turns a removable block-storage device (an SD card, a USB
//! thumb drive) into the thing a 3D printer or CNC controller needs from it:
//! a navigable directory tree, a sorted file listing that fits in a few
//! kilobytes of RAM, nested sub-file execution and a power-loss recovery
//! record. It is `#![no_std]` and does not use `alloc`; every buffer is sized
//! by a `const` generic.
//!
//! ## Using the crate
//!
//! You will need something that implements the [`BlockMedia`] trait, which
//! enumerates directories and reads/writes a single open file. Wrap it in a
//! [`CardReader`] and call it from your main loop.
//!
//! ```rust
//! use embedded_cardreader::{BlockMedia, CardReader, Error, TimeSource};
//!
//! fn print_first<M, T>(card: &mut CardReader<M, T>) -> Result<(), Error<M::Error>>
//! where
//!     M: BlockMedia,
//!     T: TimeSource,
//! {
//!     card.mount()?;
//!     if let Some(entry) = card.select_file_by_index(0)? {
//!         if !entry.is_directory() {
//!             let mut path = embedded_cardreader::PathBuf::new();
//!             let _ = core::fmt::Write::write_fmt(&mut path, format_args!("{}", entry.name));
//!             card.open_and_print_file(&path)?;
//!         }
//!     }
//!     while card.is_printing() {
//!         match card.next_byte()? {
//!             Some(_byte) => { /* feed the command parser */ }
//!             None => {
//!                 card.file_has_finished()?;
//!             }
//!         }
//!         card.checkpoint()?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! * `log`: Enabled by default. Generates log messages using the `log` crate.
//! * `defmt-log`: By turning off the default features and enabling the
//!   `defmt-log` feature you can configure this crate to log messages over defmt
//!   instead.
//!
//! You cannot enable both the `log` feature and the `defmt-log` feature.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate hex_literal;

pub mod call_stack;
pub mod config;
pub mod filesystem;
pub mod media;
pub mod navigator;
pub mod progress;
pub mod recovery;
pub mod sort;

mod card_reader;

use core::fmt::Debug;
use embedded_io::ErrorKind;

#[doc(inline)]
pub use call_stack::{CallFrame, CallStack};

#[doc(inline)]
pub use card_reader::{CardReader, CardState, CdUp, Finished, JobStatus, MediaChange};

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use filesystem::{
    Attributes, DirEntry, FilenameError, LongFileName, Mode, PathBuf, ShortFileName, TimeSource,
    Timestamp,
};

#[doc(inline)]
pub use media::{BlockMedia, DetectPin};

#[doc(inline)]
pub use progress::JobPosition;

#[doc(inline)]
pub use recovery::{JobState, RecoveryJournal};

#[doc(inline)]
pub use sort::{FolderPlacement, SortCache};

#[cfg(all(feature = "defmt-log", feature = "log"))]
compile_error!("Cannot enable both log and defmt-log");

#[cfg(feature = "log")]
use log::{debug, trace, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace, warn};

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::debug! but does nothing at all
macro_rules! debug {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::trace! but does nothing at all
macro_rules! trace {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::warn! but does nothing at all
macro_rules! warn {
    ($($arg:tt)+) => {};
}

// ****************************************************************************
//
// Public Constants
//
// ****************************************************************************

/// Maximum number of directories below the root we can descend into.
pub const MAX_DIR_DEPTH: usize = 10;

/// Length of a DOS directory name.
pub const MAX_DIR_NAME_LEN: usize = 8;

/// Room for an 8.3 name, its dot, and a terminator.
pub const FILENAME_LEN: usize = 13;

/// `"/"` + N * `"ADIRNAME/"` + `"filename.ext"`.
pub const MAX_PATH_LEN: usize =
    1 + (MAX_DIR_NAME_LEN + 1) * MAX_DIR_DEPTH + 1 + FILENAME_LEN;

/// Five VFAT long file name fragments of 13 characters each.
pub const LONG_FILENAME_LEN: usize = 65;

// ****************************************************************************
//
// Public Types
//
// ****************************************************************************

/// All the ways the functions in this crate can fail.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E>
where
    E: core::fmt::Debug,
{
    /// The underlying media threw an error.
    DeviceError(E),
    /// No card is in the slot.
    MediaAbsent,
    /// A card is present but its volume could not be read, or nothing is
    /// mounted right now.
    MediaUnmounted,
    /// A path segment did not resolve to an entry of the right kind.
    PathNotFound,
    /// The operation would nest deeper than the configured limit.
    DepthExceeded,
    /// There is no sub-file call to return from.
    NoActiveCall,
    /// The recovery record is truncated or its markers disagree.
    RecoveryCorrupt,
    /// The operation needs an open file.
    NoFileOpen,
    /// You can't delete the file that is currently open.
    FileAlreadyOpen,
    /// You can't open a directory as a file.
    NotAFile,
    /// The given filename was bad.
    FilenameError(FilenameError),
    /// A path didn't fit in a [`PathBuf`] or the output buffer.
    PathTooLong,
    /// Tried to write to a file opened for reading.
    ReadOnly,
    /// The media accepted no more bytes.
    DiskFull,
}

impl<E: Debug> embedded_io::Error for Error<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::DeviceError(_) | Error::DiskFull | Error::FileAlreadyOpen => ErrorKind::Other,
            Error::MediaAbsent | Error::MediaUnmounted | Error::PathNotFound => {
                ErrorKind::NotFound
            }
            Error::DepthExceeded => ErrorKind::OutOfMemory,
            Error::NoActiveCall | Error::NoFileOpen | Error::FilenameError(_) => {
                ErrorKind::InvalidInput
            }
            Error::PathTooLong => ErrorKind::InvalidInput,
            Error::RecoveryCorrupt | Error::NotAFile => ErrorKind::InvalidData,
            Error::ReadOnly => ErrorKind::PermissionDenied,
        }
    }
}

impl<E> From<E> for Error<E>
where
    E: core::fmt::Debug,
{
    fn from(value: E) -> Error<E> {
        Error::DeviceError(value)
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
