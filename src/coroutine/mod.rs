//! Coroutine manager: suspendable invocations keyed by caller identity.
//!
//! Multi-step effect resolution runs a script function as a coroutine.
//! The caller picks a [`CoroutineId`], starts the coroutine at step 0 and
//! resumes it at later steps until it reports [`CoroutineStatus::Finish`]
//! or [`CoroutineStatus::Error`], after which the identity is free again.
//!
//! ## Phases
//!
//! ```text
//! Created -> Running -> Yielded -> Running -> ... -> Finished | Errored
//! ```
//!
//! Finished and errored coroutines are removed as soon as their result
//! is delivered; resuming them is an error like resuming an unknown id.

mod run;

pub use run::CoroutineResult;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::{BridgeError, CoroutineId, Result};

/// Outcome of one coroutine step. The discriminants are stable codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CoroutineStatus {
    Finish = 1,
    Yield = 2,
    Error = 3,
}

impl CoroutineStatus {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Lifecycle phase of a coroutine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoroutinePhase {
    Created,
    Running,
    Yielded,
    Finished,
    Errored,
}

impl CoroutinePhase {
    /// Check if the state machine allows moving to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: CoroutinePhase) -> bool {
        use CoroutinePhase::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Yielded, Running)
                | (Running, Yielded)
                | (Running, Finished)
                | (Running, Errored)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, CoroutinePhase::Finished | CoroutinePhase::Errored)
    }
}

#[derive(Clone, Debug)]
struct CoroutineEntry<T> {
    payload: T,
    phase: CoroutinePhase,
}

/// Live coroutines by identity.
///
/// The payload is the script execution context (a Lua thread in a live
/// environment).
///
/// ## Example
///
/// ```
/// use ccg_script::core::CoroutineId;
/// use ccg_script::coroutine::{CoroutinePhase, CoroutineTable};
///
/// let mut table = CoroutineTable::new();
/// let id = CoroutineId::new(1);
///
/// table.create(id, "ctx").unwrap();
/// table.begin(id).unwrap();
/// table.finish_step(id, CoroutinePhase::Yielded).unwrap();
/// assert_eq!(table.phase(id), Some(CoroutinePhase::Yielded));
///
/// table.begin(id).unwrap();
/// table.finish_step(id, CoroutinePhase::Finished).unwrap();
/// assert_eq!(table.phase(id), None);
/// ```
#[derive(Clone, Debug)]
pub struct CoroutineTable<T> {
    entries: FxHashMap<CoroutineId, CoroutineEntry<T>>,
}

impl<T> Default for CoroutineTable<T> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<T> CoroutineTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new coroutine. Fails if `id` is still live.
    pub fn create(&mut self, id: CoroutineId, payload: T) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(rejected(id, "recursive event trigger"));
        }
        self.entries.insert(
            id,
            CoroutineEntry {
                payload,
                phase: CoroutinePhase::Created,
            },
        );
        Ok(())
    }

    /// Mark a created or yielded coroutine as running and return its context.
    pub fn begin(&mut self, id: CoroutineId) -> Result<T>
    where
        T: Clone,
    {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| rejected(id, "no such coroutine"))?;
        if !entry.phase.can_transition_to(CoroutinePhase::Running) {
            return Err(rejected(id, "coroutine is already running"));
        }
        entry.phase = CoroutinePhase::Running;
        Ok(entry.payload.clone())
    }

    /// Record the end of a step. Terminal phases remove the coroutine.
    pub fn finish_step(&mut self, id: CoroutineId, phase: CoroutinePhase) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| rejected(id, "no such coroutine"))?;
        if !entry.phase.can_transition_to(phase) {
            return Err(rejected(id, "invalid phase transition"));
        }
        if phase.is_terminal() {
            self.entries.remove(&id);
        } else {
            entry.phase = phase;
        }
        Ok(())
    }

    /// Drop a coroutine regardless of phase.
    pub fn abandon(&mut self, id: CoroutineId) -> Option<T> {
        self.entries.remove(&id).map(|entry| entry.payload)
    }

    #[must_use]
    pub fn phase(&self, id: CoroutineId) -> Option<CoroutinePhase> {
        self.entries.get(&id).map(|entry| entry.phase)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn rejected(id: CoroutineId, reason: &'static str) -> BridgeError {
    BridgeError::Coroutine { id, reason }
}
