//! Per-exchange state.
//!
//! An exchange is one user submission through to its terminal resolution.
//! Its state is tracked explicitly here instead of being inferred from which
//! entries happen to be on screen. The widget only keeps exchanges that can
//! still change: `Resolved` and `Retried` are terminal and dropped once
//! reached.

use std::fmt;

use crate::view::EntryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(u64);

impl ExchangeId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Request in flight; the placeholder is on screen.
    AwaitingResponse { placeholder: EntryId },
    /// A bot reply (or the fallback apology) was shown.
    Resolved,
    /// The error message and the retry offer are on screen.
    FailedAwaitingRetry {
        error_entry: EntryId,
        retry_entry: EntryId,
    },
    /// The retry offer was used; a new exchange carries the same text.
    Retried { next: ExchangeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub id: ExchangeId,
    pub text: String,
    pub state: ExchangeState,
}

impl Exchange {
    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, ExchangeState::AwaitingResponse { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.state, ExchangeState::FailedAwaitingRetry { .. })
    }
}
