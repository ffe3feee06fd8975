use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Lifecycle of a booking.
///
/// ```text
/// pending ──► confirmed ──► completed
///    │            │
///    └──► cancelled ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Statuses a booking may be created with.
    pub fn is_initial(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Validate a move to `next`. Staying in the same non-terminal status is allowed.
    pub fn transition(self, next: BookingStatus) -> AppResult<BookingStatus> {
        use BookingStatus::*;
        match (self, next) {
            (from, to) if from == to && !from.is_terminal() => Ok(to),
            (Pending, Confirmed | Cancelled) | (Confirmed, Completed | Cancelled) => Ok(next),
            (from, to) => Err(AppError::InvalidStatusTransition { from, to }),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(AppError::validation(format!(
                "unknown booking status {other:?}"
            ))),
        }
    }
}
