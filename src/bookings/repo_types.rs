use sqlx::FromRow;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::{bookings::status::BookingStatus, repository::RepoError};

#[derive(Debug, FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub date: Date,
    pub time: Time,
    pub status: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub date: Date,
    pub time: Time,
    pub status: BookingStatus,
    pub created_at: OffsetDateTime,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepoError;

    fn try_from(r: BookingRow) -> Result<Self, Self::Error> {
        let status = r.status.parse::<BookingStatus>().map_err(|_| {
            RepoError::Backend(anyhow::anyhow!(
                "booking {} has unknown status {:?}",
                r.id,
                r.status
            ))
        })?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            service_id: r.service_id,
            date: r.date,
            time: r.time,
            status,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub date: Date,
    pub time: Time,
    pub status: BookingStatus,
}

#[derive(Debug, Clone)]
pub struct BookingChanges {
    pub id: Uuid,
    pub date: Date,
    pub time: Time,
    pub status: BookingStatus,
}
