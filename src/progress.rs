//! Byte position and progress of the active job file.

/// Where we are in the open file, and how big it is.
///
/// `offset <= size` always holds: every way of moving the offset clamps.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct JobPosition {
    offset: u32,
    size: u32,
}

impl JobPosition {
    /// A freshly opened file of `size` bytes, positioned at the start.
    pub const fn new(size: u32) -> JobPosition {
        JobPosition { offset: 0, size }
    }

    /// A freshly opened file of `size` bytes, positioned at the end.
    pub const fn at_end(size: u32) -> JobPosition {
        JobPosition { offset: size, size }
    }

    /// How far through the file we've read (in bytes).
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// How long is the file?
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Are we at the end of the file?
    pub fn eof(&self) -> bool {
        self.offset >= self.size
    }

    /// Amount of file left to read.
    pub fn left(&self) -> u32 {
        self.size - self.offset
    }

    /// Move to an absolute offset, clamped to the end of the file.
    pub fn set(&mut self, offset: u32) {
        self.offset = offset.min(self.size);
    }

    /// Account for `n` bytes read.
    pub fn advance(&mut self, n: usize) {
        let n = u32::try_from(n).unwrap_or(u32::MAX);
        self.offset = self.offset.saturating_add(n).min(self.size);
    }

    /// Account for `n` bytes written, growing the file if we went past the
    /// end.
    pub fn record_write(&mut self, n: usize) {
        let n = u32::try_from(n).unwrap_or(u32::MAX);
        self.offset = self.offset.saturating_add(n);
        self.size = self.size.max(self.offset);
    }

    /// Whole percent done. An empty file counts as finished.
    pub fn percent_done(&self) -> u8 {
        // Never more than 100, so the cast is lossless.
        self.scaled(100) as u8
    }

    /// Hundredths of a percent done. An empty file counts as finished.
    pub fn permyriad_done(&self) -> u16 {
        // Never more than 10000, so the cast is lossless.
        self.scaled(10_000) as u16
    }

    fn scaled(&self, full: u64) -> u64 {
        if self.size == 0 {
            return full;
        }
        (u64::from(self.offset) * full / u64::from(self.size)).min(full)
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
