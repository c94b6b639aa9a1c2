//! Saved parent positions for nested sub-file execution.
//!
//! A job file may ask for another file to be run in the middle of it (a
//! "procedure call"). Only one file can be open, so the parent is closed and
//! a [`CallFrame`] remembers how to get back to it.

use heapless::Vec;

use crate::filesystem::PathBuf;

/// Where to resume a parent file once the called file ends.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Byte offset in the parent to resume from.
    pub saved_offset: u32,
    /// Absolute path of the parent.
    pub filename: PathBuf,
    /// Call depth the parent was running at.
    pub depth: u8,
}

/// A fixed-capacity stack of [`CallFrame`]s.
#[derive(Debug, Default)]
pub struct CallStack<const N: usize> {
    frames: Vec<CallFrame, N>,
}

impl<const N: usize> CallStack<N> {
    /// An empty stack.
    pub const fn new() -> CallStack<N> {
        CallStack { frames: Vec::new() }
    }

    /// How many calls are active.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// No call is active.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Another push would be rejected.
    pub fn is_full(&self) -> bool {
        self.frames.is_full()
    }

    /// Save a parent. Gives the frame back if the stack is full.
    pub fn push(&mut self, frame: CallFrame) -> Result<(), CallFrame> {
        self.frames.push(frame)
    }

    /// Take the most recent parent.
    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    /// The most recent parent.
    pub fn top(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// Forget every call, e.g. when the job is abandoned.
    pub fn clear(&mut self) {
        self.frames.clear();
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
