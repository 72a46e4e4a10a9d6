use mlua::{MultiValue, Thread, ThreadStatus};
use tracing::debug;

use super::{CoroutinePhase, CoroutineStatus};
use crate::core::{BridgeError, CoroutineId, Result};
use crate::depth::DepthGuard;
use crate::interpreter::{Callable, Interpreter};
use crate::invoke::to_integer;

/// Result of one coroutine step.
#[derive(Clone, Debug, PartialEq)]
pub struct CoroutineResult {
    pub status: CoroutineStatus,
    /// Last value yielded or returned by this step, as an integer.
    pub value: Option<i64>,
    /// Why the step failed, for `CoroutineStatus::Error`.
    pub error: Option<BridgeError>,
}

impl CoroutineResult {
    fn failed(err: BridgeError) -> Self {
        Self {
            status: CoroutineStatus::Error,
            value: None,
            error: Some(err),
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == CoroutineStatus::Finish
    }

    #[must_use]
    pub fn is_yield(&self) -> bool {
        self.status == CoroutineStatus::Yield
    }
}

impl<'lua> Interpreter<'lua> {
    /// Run one step of the coroutine `id`.
    ///
    /// Step 0 starts `callable` with the staged call arguments (exactly
    /// `param_count` of them). Later steps resume the suspended coroutine
    /// with the staged resume arguments; `callable` and `param_count` are
    /// then ignored. A rejected request leaves an existing coroutine as it
    /// was; a script error removes it.
    pub fn call_coroutine(
        &self,
        callable: &Callable,
        param_count: usize,
        id: CoroutineId,
        step: u16,
    ) -> CoroutineResult {
        let resuming = step > 0;
        match self.step_coroutine(callable, param_count, id, resuming) {
            Ok(result) => result,
            Err(err) => {
                if resuming {
                    self.clear_resume_params();
                } else {
                    self.clear_params();
                }
                self.report_error("call_coroutine", &err);
                CoroutineResult::failed(err)
            }
        }
    }

    /// Discard a suspended coroutine. Returns `false` for unknown ids.
    pub fn abandon_coroutine(&self, id: CoroutineId) -> bool {
        let abandoned = self
            .with_state(|state| state.coroutines.abandon(id))
            .ok()
            .flatten();
        if abandoned.is_some() {
            debug!(coroutine = %id, "abandoned");
        }
        abandoned.is_some()
    }

    #[must_use]
    pub fn coroutine_phase(&self, id: CoroutineId) -> Option<CoroutinePhase> {
        self.with_state(|state| state.coroutines.phase(id))
            .ok()
            .flatten()
    }

    /// Number of coroutines that have started and not yet finished.
    #[must_use]
    pub fn active_coroutines(&self) -> usize {
        self.with_state(|state| state.coroutines.len()).unwrap_or(0)
    }

    fn step_coroutine(
        &self,
        callable: &Callable,
        param_count: usize,
        id: CoroutineId,
        resuming: bool,
    ) -> Result<CoroutineResult> {
        let function = if resuming {
            None
        } else {
            self.check_param_count(param_count)?;
            Some(self.resolve_callable(callable)?)
        };
        let _guard = DepthGuard::enter(*self)?;

        let thread: Thread = match function {
            Some(function) => {
                let thread = self.lua().create_thread(function)?;
                self.with_state(|state| state.coroutines.create(id, thread))??;
                debug!(coroutine = %id, "started");
                self.with_state(|state| state.coroutines.begin(id))??
            }
            None => self.with_state(|state| state.coroutines.begin(id))??,
        };

        let args = match self.push_param(resuming) {
            Ok(args) => args,
            Err(err) => {
                self.end_step(id, CoroutinePhase::Errored);
                return Err(err);
            }
        };

        match thread.resume::<MultiValue>(args) {
            Ok(values) => {
                let value = values.into_iter().last().map(|value| to_integer(&value));
                if thread.status() == ThreadStatus::Resumable {
                    self.end_step(id, CoroutinePhase::Yielded);
                    Ok(CoroutineResult {
                        status: CoroutineStatus::Yield,
                        value,
                        error: None,
                    })
                } else {
                    self.end_step(id, CoroutinePhase::Finished);
                    debug!(coroutine = %id, "finished");
                    Ok(CoroutineResult {
                        status: CoroutineStatus::Finish,
                        value,
                        error: None,
                    })
                }
            }
            Err(err) => {
                self.end_step(id, CoroutinePhase::Errored);
                let err = self.script_failure("call_coroutine", err);
                Ok(CoroutineResult::failed(err))
            }
        }
    }

    fn end_step(&self, id: CoroutineId, phase: CoroutinePhase) {
        let ended = self.with_state(|state| state.coroutines.finish_step(id, phase));
        if let Ok(Err(err)) | Err(err) = ended {
            // The coroutine was abandoned while it ran
            debug!(coroutine = %id, error = %err, "step ended without a live coroutine");
        }
    }
}
