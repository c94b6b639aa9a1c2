//! Runtime policy for a [`CardReader`](crate::CardReader).
//!
//! Capacities (sort cache size, call depth) are `const` generics on the card
//! reader itself; everything that can change without changing RAM usage
//! lives here.

use crate::filesystem::ShortFileName;
use crate::sort::FolderPlacement;

/// Card reader settings, read once at construction.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Present listings alphabetically.
    pub sort_enabled: bool,
    /// Where directories go in a sorted listing.
    pub folder_placement: FolderPlacement,
    /// With sorting off, list the most recently written entries first.
    pub recent_first: bool,
    /// Offer hundredths-of-a-percent progress.
    pub permyriad_progress: bool,
    /// Extensions (upper-case, without the dot) of files worth listing. An
    /// empty list shows every file.
    pub job_extensions: &'static [&'static str],
    /// Minimum time between two recovery records.
    pub recovery_interval_ms: u32,
    /// Run `auto0.g`, `auto1.g`, ... from the root after a mount.
    pub autostart: bool,
}

impl Config {
    /// Does this file belong in a listing?
    pub fn is_job_file(&self, name: &ShortFileName) -> bool {
        self.job_extensions.is_empty()
            || self
                .job_extensions
                .iter()
                .any(|ext| ext.as_bytes().eq_ignore_ascii_case(name.extension()))
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            sort_enabled: true,
            folder_placement: FolderPlacement::Before,
            recent_first: false,
            permyriad_progress: false,
            job_extensions: &["GCO", "G"],
            recovery_interval_ms: 1000,
            autostart: true,
        }
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
