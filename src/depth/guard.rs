use tracing::warn;

use super::DepthExceeded;
use crate::core::{BridgeError, Result};
use crate::interpreter::Interpreter;

/// One active invocation level of an environment.
///
/// Leaving happens on drop, so every exit path (including `?` and script
/// errors) restores the depth.
#[must_use = "the invocation level is released when the guard drops"]
pub struct DepthGuard<'lua> {
    interp: Interpreter<'lua>,
}

impl<'lua> DepthGuard<'lua> {
    /// Enter one level, or fail without entering when the bound is reached.
    pub fn enter(interp: Interpreter<'lua>) -> Result<Self> {
        match interp.with_state(|state| state.depth.enter())? {
            Ok(_) => Ok(Self { interp }),
            Err(DepthExceeded { limit }) => {
                warn!(limit, "call depth limit reached");
                Err(BridgeError::DepthExceeded { limit })
            }
        }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        if let Ok(0) = self.interp.with_state(|state| state.depth.leave()) {
            self.interp.notify_depth_cleared();
        }
    }
}
