//! Policy for numerical failures.
//!
//! In [`ErrorMode::Abort`] a failed quadrature or an out-of-domain lookup
//! panics at the point of failure, which is what a standalone run wants when
//! it should stop immediately. [`ErrorMode::Report`] turns the same
//! conditions into ordinary `Err` values.
//!
//! An [`ErrorPolicy`] is a plain value owned by the call that raises, seeded
//! from [`Parameters::error_mode`](crate::Parameters::error_mode). Concurrent
//! runs each hold their own, so one run never observes another's mode. The
//! grid driver switches its policy to `Report` for the parallel passes with
//! an [`ErrorPolicyGuard`], which puts the previous mode back when it goes
//! out of scope, including on early return and unwinding.

use crate::error::{CoffeError, Result};
use serde::{Deserialize, Serialize};

/// How numerical failures are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    Abort,
    #[default]
    Report,
}

/// Current mode of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorPolicy {
    mode: ErrorMode,
}

impl ErrorPolicy {
    pub const fn new(mode: ErrorMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// Route a numerical failure through this policy.
    ///
    /// # Panics
    /// Panics with the error message when the mode is [`ErrorMode::Abort`].
    pub fn raise<T>(&self, err: CoffeError) -> Result<T> {
        match self.mode {
            ErrorMode::Abort => panic!("numerical failure: {err}"),
            ErrorMode::Report => Err(err),
        }
    }
}

/// Scoped mode: sets `mode` on a policy and restores the prior one on drop.
#[derive(Debug)]
pub struct ErrorPolicyGuard<'a> {
    policy: &'a mut ErrorPolicy,
    previous: ErrorMode,
}

impl<'a> ErrorPolicyGuard<'a> {
    pub fn acquire(policy: &'a mut ErrorPolicy, mode: ErrorMode) -> Self {
        let previous = policy.mode;
        policy.mode = mode;
        Self { policy, previous }
    }

    pub fn previous(&self) -> ErrorMode {
        self.previous
    }

    pub fn mode(&self) -> ErrorMode {
        self.policy.mode
    }

    /// [`ErrorPolicy::raise`] under the scoped mode
    pub fn raise<T>(&self, err: CoffeError) -> Result<T> {
        self.policy.raise(err)
    }
}

impl Drop for ErrorPolicyGuard<'_> {
    fn drop(&mut self) {
        self.policy.mode = self.previous;
    }
}
