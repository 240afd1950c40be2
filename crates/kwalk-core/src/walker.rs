use std::iter::FusedIterator;

use crate::{MemoryPort, Va, WalkError};

/// Default cap on the number of nodes a single walk may visit.
///
/// Matches the default Linux `pid_max`.
pub const DEFAULT_WALK_LIMIT: usize = 32768;

/// A lazy walk over a circular, intrusive, singly-followed linked list.
///
/// The walk starts at a sentinel `head` node and follows the link stored at
/// `next_offset` inside each node until it arrives back at the head. The head
/// itself is never yielded. Each yielded address is the owning record, i.e.
/// the node address minus the [`containing`] offset.
///
/// After an error or after the head is reached the walker is exhausted and
/// yields nothing more.
///
/// [`containing`]: Self::containing
///
/// # Examples
///
/// ```no_run
/// # use kwalk_core::{ListWalker, MemoryPort, Va, WalkError};
/// # fn f(port: &impl MemoryPort, init_task: Va) -> Result<(), WalkError> {
/// let tasks = 0x3a0;
///
/// for task in ListWalker::begin(port, init_task + tasks, 0)?.containing(tasks) {
///     println!("task_struct @ {}", task?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ListWalker<Port>
where
    Port: MemoryPort,
{
    port: Port,
    head: Va,
    current: Va,
    next: Va,
    next_offset: u64,
    container_offset: u64,
    visited: usize,
    limit: usize,
    done: bool,
}

impl<Port> ListWalker<Port>
where
    Port: MemoryPort,
{
    /// Starts a walk at `head`, reading the first link immediately.
    ///
    /// Fails if the head's link cannot be read.
    pub fn begin(port: Port, head: Va, next_offset: u64) -> Result<Self, WalkError> {
        let next = port.read_va(head + next_offset)?;

        tracing::trace!(%head, next_offset, %next, "list walk started");

        Ok(Self {
            port,
            head,
            current: head,
            next,
            next_offset,
            container_offset: 0,
            visited: 0,
            limit: DEFAULT_WALK_LIMIT,
            done: false,
        })
    }

    /// Sets the offset of the link field inside the owning record.
    pub fn containing(self, container_offset: u64) -> Self {
        Self {
            container_offset,
            ..self
        }
    }

    /// Sets the maximum number of nodes the walk may visit.
    pub fn with_limit(self, limit: usize) -> Self {
        Self { limit, ..self }
    }

    /// Returns the list head.
    pub fn head(&self) -> Va {
        self.head
    }

    /// Returns the number of nodes yielded so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Returns the next owning record, or `None` once the walk is back at
    /// the head.
    pub fn advance(&mut self) -> Result<Option<Va>, WalkError> {
        if self.done {
            return Ok(None);
        }

        let result = self.step();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }

        result
    }

    fn step(&mut self) -> Result<Option<Va>, WalkError> {
        let entry = self.next;

        if entry == self.head {
            tracing::trace!(head = %self.head, visited = self.visited, "list walk finished");
            return Ok(None);
        }

        if self.visited >= self.limit {
            return Err(WalkError::WalkOverrun {
                head: self.head,
                limit: self.limit,
            });
        }

        if entry.is_null() {
            return Err(WalkError::CorruptedList { node: self.current });
        }

        self.next = self.port.read_va(entry + self.next_offset)?;
        self.current = entry;
        self.visited += 1;

        Ok(Some(entry - self.container_offset))
    }
}

impl<Port> Iterator for ListWalker<Port>
where
    Port: MemoryPort,
{
    type Item = Result<Va, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

impl<Port> FusedIterator for ListWalker<Port> where Port: MemoryPort {}
