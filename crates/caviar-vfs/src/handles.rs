//! Handle table.
//!
//! Slots are a `Vec<Option<Handle>>`; freed slot numbers go into a min-heap
//! so allocation always returns the lowest free number, or grows the table
//! by one. The table itself is not synchronized; [`Runtime`](crate::Runtime)
//! keeps it behind a single mutex.

use crate::tree::NodeId;
use crate::types::Fd;
use caviar_core::{Error, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Position state of an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Byte position in a file, `0..=size`.
    File {
        /// Current byte offset
        pos: u64,
    },
    /// Index of the next child to list.
    Dir {
        /// Next child index
        next: usize,
    },
}

/// State behind one [`Fd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    /// Resolved tree node
    pub node: NodeId,
    /// Read or listing position
    pub cursor: Cursor,
}

/// Table of open handles.
#[derive(Debug, Default)]
pub struct HandleTable {
    slots: Vec<Option<Handle>>,
    free: BinaryHeap<Reverse<usize>>,
}

impl HandleTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` in the lowest free slot.
    pub fn allocate(&mut self, handle: Handle) -> Fd {
        if let Some(Reverse(slot)) = self.free.pop() {
            self.slots[slot] = Some(handle);
            return Fd::new(slot);
        }
        self.slots.push(Some(handle));
        Fd::new(self.slots.len() - 1)
    }

    /// Borrows the handle behind `fd`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if `fd` is unknown or closed.
    pub fn get_mut(&mut self, fd: Fd, operation: &str) -> Result<&mut Handle> {
        self.slots
            .get_mut(fd.as_usize())
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::invalid(operation, format!("{fd} is not open")))
    }

    /// Frees the slot behind `fd`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if `fd` is unknown or already
    /// closed.
    pub fn release(&mut self, fd: Fd) -> Result<Handle> {
        let handle = self
            .slots
            .get_mut(fd.as_usize())
            .and_then(Option::take)
            .ok_or_else(|| Error::invalid("close", format!("{fd} is not open")))?;
        self.free.push(Reverse(fd.as_usize()));
        Ok(handle)
    }

    /// Number of open handles.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
