/// Indicates whether a directory entry is hidden, a directory, a volume
/// label, etc.
///
/// The bit layout is the FAT one, so a media driver reading FAT volumes can
/// pass the on-disk byte straight through [`Attributes::from_raw`].
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Default)]
pub struct Attributes(pub(crate) u8);

impl Attributes {
    /// Indicates this file cannot be written.
    pub const READ_ONLY: u8 = 0x01;
    /// Indicates the file is hidden.
    pub const HIDDEN: u8 = 0x02;
    /// Indicates this is a system file.
    pub const SYSTEM: u8 = 0x04;
    /// Indicates this is a volume label.
    pub const VOLUME: u8 = 0x08;
    /// Indicates this is a directory.
    pub const DIRECTORY: u8 = 0x10;
    /// Indicates this file needs archiving.
    pub const ARCHIVE: u8 = 0x20;

    /// Create an `Attributes` value from the raw attribute byte.
    pub const fn from_raw(value: u8) -> Attributes {
        Attributes(value)
    }

    /// Attributes of a plain directory.
    pub const fn directory() -> Attributes {
        Attributes(Self::DIRECTORY)
    }

    /// Attributes of a plain file.
    pub const fn file() -> Attributes {
        Attributes(Self::ARCHIVE)
    }

    /// The raw attribute byte.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Does this file has the read-only attribute set?
    pub fn is_read_only(self) -> bool {
        (self.0 & Self::READ_ONLY) == Self::READ_ONLY
    }

    /// Does this file has the hidden attribute set?
    pub fn is_hidden(self) -> bool {
        (self.0 & Self::HIDDEN) == Self::HIDDEN
    }

    /// Does this file has the system attribute set?
    pub fn is_system(self) -> bool {
        (self.0 & Self::SYSTEM) == Self::SYSTEM
    }

    /// Is this the volume label rather than a real entry?
    pub fn is_volume(self) -> bool {
        (self.0 & Self::VOLUME) == Self::VOLUME
    }

    /// Does this entry point at a directory?
    pub fn is_directory(self) -> bool {
        (self.0 & Self::DIRECTORY) == Self::DIRECTORY
    }
}

impl core::fmt::Debug for Attributes {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.is_directory() {
            write!(f, "D")?;
        } else {
            write!(f, "F")?;
        }
        if self.is_read_only() {
            write!(f, "R")?;
        }
        if self.is_hidden() {
            write!(f, "H")?;
        }
        if self.is_system() {
            write!(f, "S")?;
        }
        if self.is_volume() {
            write!(f, "V")?;
        }
        Ok(())
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
