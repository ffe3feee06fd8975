use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::bookings::{repo_types::Booking, status::BookingStatus};

/// Request body for a new booking. The owner is the authenticated caller.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: Uuid,
    #[serde(with = "crate::datetime::date")]
    pub date: Date,
    #[serde(with = "crate::datetime::clock")]
    pub time: Time,
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookingRequest {
    #[serde(default, with = "crate::datetime::date::option")]
    pub date: Option<Date>,
    #[serde(default, with = "crate::datetime::clock::option")]
    pub time: Option<Time>,
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    #[serde(with = "crate::datetime::date")]
    pub date: Date,
    #[serde(with = "crate::datetime::clock")]
    pub time: Time,
    pub status: BookingStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            user_id: b.user_id,
            service_id: b.service_id,
            date: b.date,
            time: b.time,
            status: b.status,
            created_at: b.created_at,
        }
    }
}
