use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::{error::AppError, repository::RepoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Available,
    Booked,
    Unavailable,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Available => "available",
            ScheduleStatus::Booked => "booked",
            ScheduleStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(ScheduleStatus::Available),
            "booked" => Ok(ScheduleStatus::Booked),
            "unavailable" => Ok(ScheduleStatus::Unavailable),
            other => Err(AppError::validation(format!(
                "unknown schedule status {other:?}"
            ))),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub service_id: Uuid,
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub status: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub id: Uuid,
    pub service_id: Uuid,
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub status: ScheduleStatus,
    pub created_at: OffsetDateTime,
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = RepoError;

    fn try_from(r: ScheduleRow) -> Result<Self, Self::Error> {
        let status = r.status.parse::<ScheduleStatus>().map_err(|_| {
            RepoError::Backend(anyhow::anyhow!(
                "schedule {} has unknown status {:?}",
                r.id,
                r.status
            ))
        })?;
        Ok(Self {
            id: r.id,
            service_id: r.service_id,
            date: r.date,
            start_time: r.start_time,
            end_time: r.end_time,
            status,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub service_id: Uuid,
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub status: ScheduleStatus,
}

#[derive(Debug, Clone)]
pub struct ScheduleChanges {
    pub id: Uuid,
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub status: ScheduleStatus,
}
