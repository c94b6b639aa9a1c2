//! Traits and types for working with removable media.
//!
//! The card reader never touches sectors or FAT tables itself. It talks to a
//! [`BlockMedia`], which knows how to mount one volume, walk its directories
//! and stream one file.

use core::ops::ControlFlow;

use embedded_hal::digital::InputPin;

use crate::filesystem::{DirEntry, Mode, ShortFileName};

/// A mounted-or-not removable volume with a single file cursor.
///
/// Directory handles are plain tokens (a start cluster, say). They are never
/// closed and stay usable until the next [`BlockMedia::unmount`].
///
/// Directory operations and the `*_record` whole-file operations must not
/// disturb the open file or its cursor.
pub trait BlockMedia {
    /// The errors that the media can return. Must be debug formattable.
    type Error: core::fmt::Debug;
    /// A handle to a directory on the mounted volume.
    type Dir: Copy + core::fmt::Debug + PartialEq;

    /// Is a card physically present? This is polled, so keep it cheap.
    fn is_inserted(&mut self) -> bool;

    /// Mount the volume and hand back its root directory.
    fn mount(&mut self) -> Result<Self::Dir, Self::Error>;

    /// Forget the volume. Closes the open file, if any.
    fn unmount(&mut self);

    /// Call `func` for every entry of `dir`, in on-disk order, until it
    /// breaks. Each entry's `raw_index` is its slot number in that order.
    fn iterate_dir<F>(&mut self, dir: Self::Dir, func: F) -> Result<(), Self::Error>
    where
        F: FnMut(&DirEntry) -> ControlFlow<()>;

    /// Get a handle to a sub-directory found in `parent`.
    fn open_dir(&mut self, parent: Self::Dir, entry: &DirEntry) -> Result<Self::Dir, Self::Error>;

    /// Open a file in `dir`, closing any file already open, and return its
    /// length. The cursor starts at zero, except in
    /// [`Mode::ReadWriteCreateOrAppend`] where it starts at the end.
    fn open_file(
        &mut self,
        dir: Self::Dir,
        name: &ShortFileName,
        mode: Mode,
    ) -> Result<u32, Self::Error>;

    /// Close the open file, flushing any writes.
    fn close_file(&mut self) -> Result<(), Self::Error>;

    /// Read from the cursor. Returns `Ok(0)` at end of file.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write at the cursor.
    fn write(&mut self, buffer: &[u8]) -> Result<usize, Self::Error>;

    /// Move the cursor, clamping to the end of the file, and return where it
    /// ended up.
    fn seek(&mut self, offset: u32) -> Result<u32, Self::Error>;

    /// Delete a file. Returns `false` if there was nothing to delete.
    fn delete_file(&mut self, dir: Self::Dir, name: &ShortFileName) -> Result<bool, Self::Error>;

    /// Read a whole small file into `buffer`. Returns `None` if it doesn't
    /// exist, otherwise its full length (which may exceed `buffer`).
    fn read_record(
        &mut self,
        dir: Self::Dir,
        name: &ShortFileName,
        buffer: &mut [u8],
    ) -> Result<Option<usize>, Self::Error>;

    /// Create or replace a whole small file.
    fn write_record(
        &mut self,
        dir: Self::Dir,
        name: &ShortFileName,
        data: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Media whose presence is read from a card-detect switch.
///
/// Everything except [`BlockMedia::is_inserted`] is passed straight to the
/// wrapped media.
#[derive(Debug)]
pub struct DetectPin<M, P> {
    media: M,
    pin: P,
    active_low: bool,
}

impl<M, P> DetectPin<M, P>
where
    M: BlockMedia,
    P: InputPin,
{
    /// Wrap `media`. With `active_low`, a low pin means a card is inserted,
    /// which is how most sockets with a switch to ground are wired.
    pub fn new(media: M, pin: P, active_low: bool) -> DetectPin<M, P> {
        DetectPin {
            media,
            pin,
            active_low,
        }
    }

    /// Access the wrapped media
    pub fn media(&mut self) -> &mut M {
        &mut self.media
    }

    /// Get the media and pin back
    pub fn free(self) -> (M, P) {
        (self.media, self.pin)
    }
}

impl<M, P> BlockMedia for DetectPin<M, P>
where
    M: BlockMedia,
    P: InputPin,
{
    type Error = M::Error;
    type Dir = M::Dir;

    fn is_inserted(&mut self) -> bool {
        let level = if self.active_low {
            self.pin.is_low()
        } else {
            self.pin.is_high()
        };
        // A pin we can't read is a card we can't trust.
        level.unwrap_or(false)
    }

    fn mount(&mut self) -> Result<Self::Dir, Self::Error> {
        self.media.mount()
    }

    fn unmount(&mut self) {
        self.media.unmount()
    }

    fn iterate_dir<F>(&mut self, dir: Self::Dir, func: F) -> Result<(), Self::Error>
    where
        F: FnMut(&DirEntry) -> ControlFlow<()>,
    {
        self.media.iterate_dir(dir, func)
    }

    fn open_dir(&mut self, parent: Self::Dir, entry: &DirEntry) -> Result<Self::Dir, Self::Error> {
        self.media.open_dir(parent, entry)
    }

    fn open_file(
        &mut self,
        dir: Self::Dir,
        name: &ShortFileName,
        mode: Mode,
    ) -> Result<u32, Self::Error> {
        self.media.open_file(dir, name, mode)
    }

    fn close_file(&mut self) -> Result<(), Self::Error> {
        self.media.close_file()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        self.media.read(buffer)
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize, Self::Error> {
        self.media.write(buffer)
    }

    fn seek(&mut self, offset: u32) -> Result<u32, Self::Error> {
        self.media.seek(offset)
    }

    fn delete_file(&mut self, dir: Self::Dir, name: &ShortFileName) -> Result<bool, Self::Error> {
        self.media.delete_file(dir, name)
    }

    fn read_record(
        &mut self,
        dir: Self::Dir,
        name: &ShortFileName,
        buffer: &mut [u8],
    ) -> Result<Option<usize>, Self::Error> {
        self.media.read_record(dir, name, buffer)
    }

    fn write_record(
        &mut self,
        dir: Self::Dir,
        name: &ShortFileName,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        self.media.write_record(dir, name, data)
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
