use std::{sync::Arc, time::Duration};

use time::Time;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    pagination::Pagination,
    repository::with_deadline,
    schedules::{
        dto::{CreateScheduleRequest, ScheduleResponse, UpdateScheduleRequest},
        repo::ScheduleRepository,
        repo_types::{NewSchedule, ScheduleChanges, ScheduleStatus},
    },
};

fn check_range(start: Time, end: Time) -> AppResult<()> {
    if start >= end {
        warn!(%start, %end, "schedule window is empty or inverted");
        return Err(AppError::validation("start_time must be before end_time"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ScheduleService {
    schedules: Arc<dyn ScheduleRepository>,
    timeout: Duration,
}

impl ScheduleService {
    pub fn new(schedules: Arc<dyn ScheduleRepository>, timeout: Duration) -> Self {
        Self { schedules, timeout }
    }

    pub async fn create(&self, req: CreateScheduleRequest) -> AppResult<ScheduleResponse> {
        if req.service_id.is_nil() {
            return Err(AppError::validation("service_id is required"));
        }
        check_range(req.start_time, req.end_time)?;

        let schedule = with_deadline(
            self.timeout,
            "create_schedule",
            self.schedules.create_schedule(NewSchedule {
                service_id: req.service_id,
                date: req.date,
                start_time: req.start_time,
                end_time: req.end_time,
                status: req.status.unwrap_or(ScheduleStatus::Available),
            }),
        )
        .await
        .map_err(|e| e.into_app("schedule"))?;

        info!(schedule_id = %schedule.id, service_id = %schedule.service_id, "schedule created");
        Ok(schedule.into())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ScheduleResponse> {
        let schedule = with_deadline(self.timeout, "get_schedule", self.schedules.get_schedule(id))
            .await
            .map_err(|e| e.into_app("schedule"))?;
        Ok(schedule.into())
    }

    pub async fn list(&self, page: Pagination) -> AppResult<Vec<ScheduleResponse>> {
        let (limit, offset) = page.clamped();
        let rows = with_deadline(
            self.timeout,
            "list_schedules",
            self.schedules.list_schedules(limit, offset),
        )
        .await
        .map_err(|e| e.into_app("schedule"))?;
        Ok(rows.into_iter().map(ScheduleResponse::from).collect())
    }

    pub async fn list_for_service(
        &self,
        service_id: Uuid,
        page: Pagination,
    ) -> AppResult<Vec<ScheduleResponse>> {
        let (limit, offset) = page.clamped();
        let rows = with_deadline(
            self.timeout,
            "list_schedules_by_service",
            self.schedules
                .list_schedules_by_service(service_id, limit, offset),
        )
        .await
        .map_err(|e| e.into_app("schedule"))?;
        Ok(rows.into_iter().map(ScheduleResponse::from).collect())
    }

    /// Partial update. The time range rule applies to the merged result.
    pub async fn update(
        &self,
        id: Uuid,
        req: UpdateScheduleRequest,
    ) -> AppResult<ScheduleResponse> {
        let current = with_deadline(self.timeout, "get_schedule", self.schedules.get_schedule(id))
            .await
            .map_err(|e| e.into_app("schedule"))?;

        let changes = ScheduleChanges {
            id,
            date: req.date.unwrap_or(current.date),
            start_time: req.start_time.unwrap_or(current.start_time),
            end_time: req.end_time.unwrap_or(current.end_time),
            status: req.status.unwrap_or(current.status),
        };
        check_range(changes.start_time, changes.end_time)?;

        let schedule = with_deadline(
            self.timeout,
            "update_schedule",
            self.schedules.update_schedule(changes),
        )
        .await
        .map_err(|e| e.into_app("schedule"))?;
        info!(schedule_id = %id, status = %schedule.status, "schedule updated");
        Ok(schedule.into())
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        with_deadline(
            self.timeout,
            "delete_schedule",
            self.schedules.delete_schedule(id),
        )
        .await
        .map_err(|e| e.into_app("schedule"))?;
        info!(schedule_id = %id, "schedule deleted");
        Ok(())
    }
}
