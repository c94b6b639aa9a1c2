//! Power-loss recovery record.
//!
//! While printing, the card reader periodically writes which file it's in
//! and how far through it is to a small dedicated file in the root
//! directory. After a power cut the host can read it back and offer to
//! resume. Deciding whether to resume is not our job.
//!
//! The record is a fixed layout, little-endian:
//!
//! | Offset            | Size           | Field                      |
//! |-------------------|----------------|----------------------------|
//! | 0                 | 1              | head marker                |
//! | 1                 | `MAX_PATH_LEN` | path, NUL padded           |
//! | 1 + MAX_PATH_LEN  | 4              | byte offset                |
//! | 5 + MAX_PATH_LEN  | 1              | foot marker                |
//!
//! Both markers carry the same non-zero sequence number. A write torn half
//! way leaves them disagreeing (or the file short), which is how we spot it.

use byteorder::{ByteOrder, LittleEndian};

use crate::filesystem::{PathBuf, ShortFileName, Timestamp};
use crate::media::BlockMedia;
use crate::{debug, warn, Error, MAX_PATH_LEN};

/// Name of the record file, in the root directory.
pub const RECOVERY_FILE_NAME: &str = "PLR.BIN";

/// Size of an encoded record in bytes.
pub const RECORD_LEN: usize = 1 + MAX_PATH_LEN + 4 + 1;

const PATH_START: usize = 1;
const OFFSET_START: usize = PATH_START + MAX_PATH_LEN;
const FOOT_INDEX: usize = OFFSET_START + 4;

/// Which file we were printing, and where we'd got to.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    /// Absolute path of the job file.
    pub filename: PathBuf,
    /// Byte offset to resume from.
    pub offset: u32,
}

impl JobState {
    /// Build a state from a path. Returns `None` if the path is too long.
    pub fn new(filename: &str, offset: u32) -> Option<JobState> {
        let mut path = PathBuf::new();
        path.push_str(filename).ok()?;
        Some(JobState {
            filename: path,
            offset,
        })
    }
}

/// Reads and writes the recovery record, and limits how often it's written.
#[derive(Debug)]
pub struct RecoveryJournal {
    interval_ms: u32,
    last_save: Option<Timestamp>,
    sequence: u8,
}

impl RecoveryJournal {
    /// A journal that writes at most once every `interval_ms` through
    /// [`RecoveryJournal::save_if_due`].
    pub const fn new(interval_ms: u32) -> RecoveryJournal {
        RecoveryJournal {
            interval_ms,
            last_save: None,
            sequence: 0,
        }
    }

    fn file_name() -> ShortFileName {
        // A constant, known-good 8.3 name.
        ShortFileName {
            contents: *b"PLR     BIN",
        }
    }

    /// Encode `state`, stamping it with the next sequence number.
    pub fn encode(&mut self, state: &JobState) -> [u8; RECORD_LEN] {
        self.sequence = match self.sequence.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        let mut data = [0u8; RECORD_LEN];
        data[0] = self.sequence;
        let path = state.filename.as_bytes();
        data[PATH_START..PATH_START + path.len()].copy_from_slice(path);
        LittleEndian::write_u32(&mut data[OFFSET_START..OFFSET_START + 4], state.offset);
        data[FOOT_INDEX] = self.sequence;
        data
    }

    /// Decode a record, checking its structure. Returns the state and the
    /// record's sequence number.
    pub fn decode(data: &[u8]) -> Option<(JobState, u8)> {
        if data.len() != RECORD_LEN {
            return None;
        }
        let head = data[0];
        if head == 0 || head != data[FOOT_INDEX] {
            return None;
        }
        let path = &data[PATH_START..OFFSET_START];
        let len = path.iter().position(|b| *b == 0).unwrap_or(path.len());
        if len == 0 || path[len..].iter().any(|b| *b != 0) {
            return None;
        }
        let filename = core::str::from_utf8(&path[..len]).ok()?;
        let offset = LittleEndian::read_u32(&data[OFFSET_START..OFFSET_START + 4]);
        Some((JobState::new(filename, offset)?, head))
    }

    /// Write `state` now, replacing any previous record.
    pub fn save<M>(
        &mut self,
        media: &mut M,
        root: M::Dir,
        state: &JobState,
        now: Timestamp,
    ) -> Result<(), Error<M::Error>>
    where
        M: BlockMedia,
    {
        let data = self.encode(state);
        media.write_record(root, &Self::file_name(), &data)?;
        self.last_save = Some(now);
        debug!(
            "Saved recovery record {}: {} @ {}",
            self.sequence,
            state.filename.as_str(),
            state.offset
        );
        Ok(())
    }

    /// Write `state` if the save interval has passed since the last write.
    /// Returns whether it wrote.
    pub fn save_if_due<M>(
        &mut self,
        media: &mut M,
        root: M::Dir,
        state: &JobState,
        now: Timestamp,
    ) -> Result<bool, Error<M::Error>>
    where
        M: BlockMedia,
    {
        let due = self
            .last_save
            .map_or(true, |last| now.millis_since(last) >= self.interval_ms);
        if due {
            self.save(media, root, state, now)?;
        }
        Ok(due)
    }

    /// Is there a well-formed record on the media?
    pub fn exists<M>(&self, media: &mut M, root: M::Dir) -> Result<bool, Error<M::Error>>
    where
        M: BlockMedia,
    {
        let mut buffer = [0u8; RECORD_LEN];
        let found = media.read_record(root, &Self::file_name(), &mut buffer)?;
        Ok(match found {
            Some(len) if len == RECORD_LEN => Self::decode(&buffer).is_some(),
            _ => false,
        })
    }

    /// Read the record back. Later saves continue its sequence numbering.
    pub fn load<M>(&mut self, media: &mut M, root: M::Dir) -> Result<JobState, Error<M::Error>>
    where
        M: BlockMedia,
    {
        let mut buffer = [0u8; RECORD_LEN];
        let len = media
            .read_record(root, &Self::file_name(), &mut buffer)?
            .ok_or(Error::PathNotFound)?;
        if len != RECORD_LEN {
            warn!("Recovery record is {} bytes, expected {}", len, RECORD_LEN);
            return Err(Error::RecoveryCorrupt);
        }
        let Some((state, sequence)) = Self::decode(&buffer) else {
            warn!("Recovery record markers are inconsistent");
            return Err(Error::RecoveryCorrupt);
        };
        self.sequence = sequence;
        debug!(
            "Loaded recovery record {}: {} @ {}",
            sequence,
            state.filename.as_str(),
            state.offset
        );
        Ok(state)
    }

    /// Remove the record. Returns whether there was one.
    pub fn clear<M>(&mut self, media: &mut M, root: M::Dir) -> Result<bool, Error<M::Error>>
    where
        M: BlockMedia,
    {
        let removed = media.delete_file(root, &Self::file_name())?;
        self.last_save = None;
        if removed {
            debug!("Cleared recovery record");
        }
        Ok(removed)
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
