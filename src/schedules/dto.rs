use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::schedules::repo_types::{Schedule, ScheduleStatus};

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub service_id: Uuid,
    #[serde(with = "crate::datetime::date")]
    pub date: Date,
    #[serde(with = "crate::datetime::clock")]
    pub start_time: Time,
    #[serde(with = "crate::datetime::clock")]
    pub end_time: Time,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateScheduleRequest {
    #[serde(default, with = "crate::datetime::date::option")]
    pub date: Option<Date>,
    #[serde(default, with = "crate::datetime::clock::option")]
    pub start_time: Option<Time>,
    #[serde(default, with = "crate::datetime::clock::option")]
    pub end_time: Option<Time>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub service_id: Uuid,
    #[serde(with = "crate::datetime::date")]
    pub date: Date,
    #[serde(with = "crate::datetime::clock")]
    pub start_time: Time,
    #[serde(with = "crate::datetime::clock")]
    pub end_time: Time,
    pub status: ScheduleStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Schedule> for ScheduleResponse {
    fn from(s: Schedule) -> Self {
        Self {
            id: s.id,
            service_id: s.service_id,
            date: s.date,
            start_time: s.start_time,
            end_time: s.end_time,
            status: s.status,
            created_at: s.created_at,
        }
    }
}
