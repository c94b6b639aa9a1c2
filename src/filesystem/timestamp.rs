/// Things that impl this can tell you the current time.
pub trait TimeSource {
    /// Returns the current time
    fn get_timestamp(&self) -> Timestamp;
}

/// A reading of a free-running millisecond counter.
///
/// The counter is allowed to wrap; use [`Timestamp::millis_since`] rather
/// than comparing raw values.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timestamp {
    /// Milliseconds since some arbitrary epoch, usually boot.
    pub millis: u32,
}

impl Timestamp {
    /// Create a `Timestamp` from a millisecond counter.
    pub const fn from_millis(millis: u32) -> Timestamp {
        Timestamp { millis }
    }

    /// How many milliseconds passed between `earlier` and `self`.
    pub fn millis_since(self, earlier: Timestamp) -> u32 {
        self.millis.wrapping_sub(earlier.millis)
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
