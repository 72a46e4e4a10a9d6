//! Call-depth guard.
//!
//! Every invocation that enters the script environment is bracketed by
//! [`CallDepth::enter`] and [`CallDepth::leave`], including invocations that
//! scripts trigger by calling back into native code. The bound turns
//! runaway mutual recursion between scripts into a reported failure
//! instead of a stack overflow.
//!
//! The counter itself is plain data; [`DepthGuard`] ties it to an
//! environment so `leave` runs on every exit path.
//!
//! ## Example
//!
//! ```
//! use ccg_script::depth::CallDepth;
//!
//! let mut depth = CallDepth::new(2);
//! assert!(depth.enter().is_ok());
//! assert!(depth.enter().is_ok());
//! assert!(depth.enter().is_err()); // third nested entry
//!
//! depth.leave();
//! depth.leave();
//! assert_eq!(depth.current(), 0);
//! ```

mod guard;

pub use guard::DepthGuard;

use serde::{Deserialize, Serialize};

/// Entry refused because the bound is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthExceeded {
    pub limit: usize,
}

/// Nested invocation counter with a fixed maximum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDepth {
    current: usize,
    max: usize,
    /// Deepest level reached since creation or the last `reset_peak`.
    peak: usize,
}

impl CallDepth {
    /// Create a counter allowing at most `max` nested invocations.
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            current: 0,
            max,
            peak: 0,
        }
    }

    /// Enter one invocation level.
    ///
    /// Fails without changing the counter when `max` levels are active.
    pub fn enter(&mut self) -> Result<usize, DepthExceeded> {
        if self.current >= self.max {
            return Err(DepthExceeded { limit: self.max });
        }
        self.current += 1;
        self.peak = self.peak.max(self.current);
        Ok(self.current)
    }

    /// Leave one invocation level. Never goes below zero.
    pub fn leave(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// Currently active invocation levels.
    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Configured maximum.
    #[must_use]
    pub fn max(&self) -> usize {
        self.max
    }

    /// Deepest level reached.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Forget the recorded peak.
    pub fn reset_peak(&mut self) {
        self.peak = self.current;
    }

    /// Check if another `enter` would fail.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.current >= self.max
    }
}
