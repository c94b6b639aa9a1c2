use crate::filesystem::PathBuf;
use crate::progress::JobPosition;

/// The different ways we can open a file.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Mode {
    /// Open a file for reading, if it exists.
    ReadOnly,
    /// Create a new empty file, or truncate an existing file. Used when
    /// saving a job streamed in from the host.
    ReadWriteCreateOrTruncate,
    /// Create a new empty file, or append to an existing file. Used for
    /// command logging.
    ReadWriteCreateOrAppend,
}

impl Mode {
    /// Does this mode allow writes?
    pub fn is_write(self) -> bool {
        self != Mode::ReadOnly
    }
}

/// Internal metadata about the one open file
#[derive(Debug, Clone)]
pub(crate) struct OpenFile {
    /// Absolute path of the file, built from 8.3 names so it can always be
    /// reopened.
    pub(crate) path: PathBuf,
    /// What mode the file was opened in
    pub(crate) mode: Mode,
    /// How far through the file we are
    pub(crate) position: JobPosition,
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
