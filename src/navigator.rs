//! The working directory and the stack of directories above it.

use core::fmt::Write;
use core::ops::ControlFlow;

use heapless::Vec;

use crate::filesystem::{DirEntry, PathBuf, ShortFileName};
use crate::media::BlockMedia;
use crate::MAX_DIR_DEPTH;

/// The root directory plus every directory we've descended into.
///
/// The root is never popped. `depth()` counts the directories below it and
/// is at most [`MAX_DIR_DEPTH`].
#[derive(Debug, Clone)]
pub struct WorkDir<D> {
    root: Option<D>,
    stack: Vec<(D, ShortFileName), MAX_DIR_DEPTH>,
}

impl<D> Default for WorkDir<D> {
    fn default() -> Self {
        WorkDir::new()
    }
}

impl<D> WorkDir<D> {
    /// Nothing mounted.
    pub const fn new() -> WorkDir<D> {
        WorkDir {
            root: None,
            stack: Vec::new(),
        }
    }

    /// How many directories below the root we are.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Are we in the root directory?
    pub fn is_root(&self) -> bool {
        self.stack.is_empty()
    }

    /// Forget everything, including the root.
    pub fn clear(&mut self) {
        self.root = None;
        self.stack.clear();
    }

    /// Pop one directory. `None` means we were already at the root.
    pub fn pop(&mut self) -> Option<(D, ShortFileName)> {
        self.stack.pop()
    }

    /// Go back to the root.
    pub fn cdroot(&mut self) {
        self.stack.clear();
    }

    /// Name of the current directory, `None` for the root.
    pub fn name(&self) -> Option<&ShortFileName> {
        self.stack.last().map(|(_, name)| name)
    }

    /// Write the absolute path of the current directory, with a trailing
    /// `/`, into `out`.
    pub fn write_path<W: Write>(&self, out: &mut W) -> core::fmt::Result {
        out.write_char('/')?;
        for (_, name) in self.stack.iter() {
            write!(out, "{}/", name)?;
        }
        Ok(())
    }

    /// The absolute path of the current directory.
    pub fn path(&self) -> Option<PathBuf> {
        let mut out = PathBuf::new();
        self.write_path(&mut out).ok()?;
        Some(out)
    }
}

impl<D: Copy> WorkDir<D> {
    /// A freshly mounted volume.
    pub fn reset(&mut self, root: D) {
        self.root = Some(root);
        self.stack.clear();
    }

    /// The root directory, if mounted.
    pub fn root(&self) -> Option<D> {
        self.root
    }

    /// The current directory, if mounted.
    pub fn current(&self) -> Option<D> {
        self.stack.last().map(|(dir, _)| *dir).or(self.root)
    }

    /// A copy of this stack with only the root left.
    pub fn rooted(&self) -> WorkDir<D> {
        WorkDir {
            root: self.root,
            stack: Vec::new(),
        }
    }

    /// Descend into `dir`. Once at [`MAX_DIR_DEPTH`] nothing changes and the
    /// pair is handed back.
    pub fn push(&mut self, dir: D, name: ShortFileName) -> Result<(), (D, ShortFileName)> {
        self.stack.push((dir, name))
    }
}

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Split a path into the directory part (with trailing `/`) and the final
/// name.
pub fn split_last(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..=idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Look for an entry in `dir` by either of its names. Skips `.` and `..`.
pub fn find_entry<M>(
    media: &mut M,
    dir: M::Dir,
    segment: &str,
) -> Result<Option<DirEntry>, M::Error>
where
    M: BlockMedia,
{
    let mut found = None;
    media.iterate_dir(dir, |entry| {
        if !entry.is_dot() && entry.matches(segment) {
            found = Some(entry.clone());
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    Ok(found)
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
