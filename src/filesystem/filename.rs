//! Filename related types

use core::cmp::Ordering;
use core::fmt::Write;

use crate::{FILENAME_LEN, LONG_FILENAME_LEN, MAX_PATH_LEN};

/// A long (VFAT) file name, as decoded by the media.
pub type LongFileName = heapless::String<LONG_FILENAME_LEN>;

/// An absolute or relative path built from 8.3 names.
pub type PathBuf = heapless::String<MAX_PATH_LEN>;

/// Various filename related errors that can occur.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilenameError {
    /// Tried to create a file with an invalid character.
    InvalidCharacter,
    /// Tried to create a file with no file name.
    FilenameEmpty,
    /// Given name was too long (we are limited to 8.3).
    NameTooLong,
    /// Can't start a file with a period, or after 8 characters.
    MisplacedPeriod,
}

/// An MS-DOS 8.3 filename.
///
/// ISO-8859-1 encoding is assumed. All lower-case is converted to upper-case,
/// so two names compare equal exactly when DOS would consider them the same
/// file.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(PartialEq, Eq, Clone)]
pub struct ShortFileName {
    pub(crate) contents: [u8; Self::TOTAL_LEN],
}

impl ShortFileName {
    const BASE_LEN: usize = 8;
    const TOTAL_LEN: usize = 11;

    /// Get a short file name containing "..", which means "parent directory".
    pub const fn parent_dir() -> Self {
        Self {
            contents: *b"..         ",
        }
    }

    /// Get a short file name containing ".", which means "this directory".
    pub const fn this_dir() -> Self {
        Self {
            contents: *b".          ",
        }
    }

    /// Is this one of the `.` or `..` entries every sub-directory carries?
    pub fn is_dot(&self) -> bool {
        self.contents[0] == b'.'
    }

    /// Get base name (without extension) of the file.
    pub fn base_name(&self) -> &[u8] {
        Self::bytes_before_space(&self.contents[..Self::BASE_LEN])
    }

    /// Get extension of the file (without base name).
    pub fn extension(&self) -> &[u8] {
        Self::bytes_before_space(&self.contents[Self::BASE_LEN..])
    }

    fn bytes_before_space(bytes: &[u8]) -> &[u8] {
        bytes.split(|b| *b == b' ').next().unwrap_or(&[])
    }

    /// Create a new MS-DOS 8.3 space-padded file name as stored in the directory entry.
    pub fn create_from_str(name: &str) -> Result<ShortFileName, FilenameError> {
        if name == ".." {
            return Ok(ShortFileName::parent_dir());
        }
        if name == "." {
            return Ok(ShortFileName::this_dir());
        }

        let mut sfn = ShortFileName {
            contents: [b' '; Self::TOTAL_LEN],
        };
        let mut idx = 0;
        let mut seen_dot = false;
        for ch in name.chars() {
            match ch {
                // Microsoft say these are the invalid characters
                '\u{0000}'..='\u{001F}'
                | '"'
                | '*'
                | '+'
                | ','
                | '/'
                | ':'
                | ';'
                | '<'
                | '='
                | '>'
                | '?'
                | '['
                | '\\'
                | ']'
                | ' '
                | '|' => {
                    return Err(FilenameError::InvalidCharacter);
                }
                x if x > '\u{00FF}' => {
                    return Err(FilenameError::InvalidCharacter);
                }
                '.' => {
                    if (1..=Self::BASE_LEN).contains(&idx) && !seen_dot {
                        idx = Self::BASE_LEN;
                        seen_dot = true;
                    } else {
                        return Err(FilenameError::MisplacedPeriod);
                    }
                }
                _ => {
                    let b = ch.to_ascii_uppercase() as u8;
                    let limit = if seen_dot {
                        Self::TOTAL_LEN
                    } else {
                        Self::BASE_LEN
                    };
                    if idx >= limit {
                        return Err(FilenameError::NameTooLong);
                    }
                    sfn.contents[idx] = b;
                    idx += 1;
                }
            }
        }
        if idx == 0 {
            return Err(FilenameError::FilenameEmpty);
        }
        Ok(sfn)
    }

    /// Does `name` refer to this file, ignoring case?
    ///
    /// Anything that can't be an 8.3 name never matches.
    pub fn matches(&self, name: &str) -> bool {
        ShortFileName::create_from_str(name).is_ok_and(|sfn| sfn == *self)
    }

    /// Render as `NAME.EXT` into a fixed buffer.
    pub fn to_buf(&self) -> heapless::String<FILENAME_LEN> {
        let mut out = heapless::String::new();
        // 8 + 1 + 3 always fits
        let _ = write!(out, "{}", self);
        out
    }
}

impl core::fmt::Display for ShortFileName {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        for (i, &c) in self.contents.iter().enumerate() {
            if c != b' ' {
                if i == Self::BASE_LEN {
                    write!(f, ".")?;
                }
                // converting a byte to a codepoint means you are assuming
                // ISO-8859-1 encoding, because that's how Unicode was designed.
                write!(f, "{}", c as char)?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for ShortFileName {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "ShortFileName(\"{}\")", self)
    }
}

/// Compare two names the way `strcasecmp` would.
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let a = a.bytes().map(|b| b.to_ascii_lowercase());
    let b = b.bytes().map(|b| b.to_ascii_lowercase());
    a.cmp(b)
}

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filename_no_extension() {
        let sfn = ShortFileName {
            contents: *b"HELLO      ",
        };
        assert_eq!(format!("{}", &sfn), "HELLO");
        assert_eq!(sfn, ShortFileName::create_from_str("HELLO").unwrap());
        assert_eq!(sfn, ShortFileName::create_from_str("hello").unwrap());
        assert_eq!(sfn, ShortFileName::create_from_str("HELLO.").unwrap());
    }

    #[test]
    fn filename_extension() {
        let sfn = ShortFileName::create_from_str("job.gco").unwrap();
        assert_eq!(sfn.to_buf().as_str(), "JOB.GCO");
        assert_eq!(sfn.extension(), b"GCO");
        assert_eq!(sfn.base_name(), b"JOB");
    }

    #[test]
    fn filename_dots() {
        assert!(ShortFileName::this_dir().is_dot());
        assert!(ShortFileName::create_from_str("..").unwrap().is_dot());
        assert!(!ShortFileName::create_from_str("A.G").unwrap().is_dot());
    }

    #[test]
    fn filename_matches() {
        let sfn = ShortFileName::create_from_str("AUTO0.G").unwrap();
        assert!(sfn.matches("auto0.g"));
        assert!(!sfn.matches("auto1.g"));
        assert!(!sfn.matches("a name with spaces.gcode"));
    }

    #[test]
    fn filename_bad() {
        assert!(ShortFileName::create_from_str("").is_err());
        assert!(ShortFileName::create_from_str(" ").is_err());
        assert!(ShortFileName::create_from_str("123456789").is_err());
        assert!(ShortFileName::create_from_str("12345678.ABCD").is_err());
        assert!(ShortFileName::create_from_str("A.B.C").is_err());
    }

    #[test]
    fn case_insensitive_ordering() {
        assert_eq!(cmp_ignore_case("abc", "ABC"), Ordering::Equal);
        assert_eq!(cmp_ignore_case("Apple", "banana"), Ordering::Less);
        assert_eq!(cmp_ignore_case("zeta", "Alpha"), Ordering::Greater);
        assert_eq!(cmp_ignore_case("ab", "abc"), Ordering::Less);
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
