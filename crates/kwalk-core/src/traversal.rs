use std::{cell::Cell, ops::ControlFlow};

use crate::{
    AddressSpace, DEFAULT_WALK_LIMIT, ListWalker, PauseGuard, TranslationMechanism, Va, WalkCore,
    WalkDriver, WalkError,
};

/// The phase a [`Traversal`] is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalState {
    /// The target is running; no scan is in progress.
    Unpaused,

    /// The target is paused and a scan is running.
    Scanning,

    /// The scan has ended and the target is about to be resumed.
    PausedPendingResume,
}

/// Runs scans of target memory inside a pause window.
///
/// Every call to [`run`] pauses the target, hands an [`AddressSpace`] to the
/// scan, and resumes the target exactly once when the scan ends, whether it
/// returns normally, breaks early, fails, or panics. If the target cannot be
/// paused the scan never starts.
///
/// [`run`]: Self::run
pub struct Traversal<'a, Driver>
where
    Driver: WalkDriver,
{
    core: &'a WalkCore<Driver>,
    mechanism: TranslationMechanism,
    limit: usize,
    state: Cell<TraversalState>,
}

impl<'a, Driver> Traversal<'a, Driver>
where
    Driver: WalkDriver,
{
    /// Creates a new traversal reading through `mechanism`.
    pub fn new(core: &'a WalkCore<Driver>, mechanism: TranslationMechanism) -> Self {
        Self {
            core,
            mechanism,
            limit: DEFAULT_WALK_LIMIT,
            state: Cell::new(TraversalState::Unpaused),
        }
    }

    /// Sets the node cap applied to list walks started by this traversal.
    pub fn with_limit(self, limit: usize) -> Self {
        Self { limit, ..self }
    }

    /// Returns the current state.
    pub fn state(&self) -> TraversalState {
        self.state.get()
    }

    /// Returns the node cap applied to list walks.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the address space scans read through.
    pub fn space(&self) -> AddressSpace<'a, Driver> {
        AddressSpace::new(self.core, self.mechanism)
    }

    /// Starts a list walk with this traversal's node cap.
    pub fn walk(
        &self,
        head: Va,
        next_offset: u64,
        container_offset: u64,
    ) -> Result<ListWalker<AddressSpace<'a, Driver>>, WalkError> {
        Ok(ListWalker::begin(self.space(), head, next_offset)?
            .containing(container_offset)
            .with_limit(self.limit))
    }

    /// Pauses the target, runs `scan`, and resumes the target.
    ///
    /// Returns [`WalkError::Pause`] without calling `scan` if the target
    /// cannot be paused. A failed resume is logged and does not change the
    /// result.
    pub fn run<T>(
        &self,
        scan: impl FnOnce(AddressSpace<'a, Driver>) -> Result<T, WalkError>,
    ) -> Result<T, WalkError> {
        if self.state.get() != TraversalState::Unpaused {
            return Err(WalkError::Other("traversal is already running"));
        }

        let window = ScanWindow {
            guard: Some(self.core.pause_guard()?),
            state: &self.state,
        };

        self.state.set(TraversalState::Scanning);
        tracing::debug!("scan started");

        let result = scan(self.space());
        drop(window);

        result
    }

    /// Walks a list inside a pause window, feeding every record to `visit`.
    ///
    /// Stops at the first record for which `visit` returns
    /// [`ControlFlow::Break`] and returns its value.
    pub fn for_each_record<T>(
        &self,
        head: Va,
        next_offset: u64,
        container_offset: u64,
        mut visit: impl FnMut(AddressSpace<'a, Driver>, Va) -> Result<ControlFlow<T>, WalkError>,
    ) -> Result<Option<T>, WalkError> {
        self.run(|space| {
            for record in self.walk(head, next_offset, container_offset)? {
                if let ControlFlow::Break(value) = visit(space, record?)? {
                    return Ok(Some(value));
                }
            }

            Ok(None)
        })
    }

    /// Walks a list inside a pause window and returns the first record
    /// matching `predicate`.
    pub fn find_record(
        &self,
        head: Va,
        next_offset: u64,
        container_offset: u64,
        mut predicate: impl FnMut(AddressSpace<'a, Driver>, Va) -> Result<bool, WalkError>,
    ) -> Result<Option<Va>, WalkError> {
        self.for_each_record(head, next_offset, container_offset, |space, record| {
            Ok(match predicate(space, record)? {
                true => ControlFlow::Break(record),
                false => ControlFlow::Continue(()),
            })
        })
    }
}

/// Resumes the target and resets the traversal state when dropped.
struct ScanWindow<'a, 'c, Driver>
where
    Driver: WalkDriver,
{
    guard: Option<PauseGuard<'c, Driver>>,
    state: &'a Cell<TraversalState>,
}

impl<Driver> Drop for ScanWindow<'_, '_, Driver>
where
    Driver: WalkDriver,
{
    fn drop(&mut self) {
        self.state.set(TraversalState::PausedPendingResume);
        tracing::debug!("scan finished");

        drop(self.guard.take());
        self.state.set(TraversalState::Unpaused);
    }
}
