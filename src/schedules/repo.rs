use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    repository::RepoError,
    schedules::repo_types::{NewSchedule, Schedule, ScheduleChanges, ScheduleRow},
};

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create_schedule(&self, new: NewSchedule) -> Result<Schedule, RepoError>;
    async fn get_schedule(&self, id: Uuid) -> Result<Schedule, RepoError>;
    async fn list_schedules(&self, limit: i64, offset: i64) -> Result<Vec<Schedule>, RepoError>;
    async fn list_schedules_by_service(
        &self,
        service_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Schedule>, RepoError>;
    async fn update_schedule(&self, changes: ScheduleChanges) -> Result<Schedule, RepoError>;
    async fn delete_schedule(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct PgScheduleRepository {
    db: PgPool,
}

impl PgScheduleRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_schedules(rows: Vec<ScheduleRow>) -> Result<Vec<Schedule>, RepoError> {
    rows.into_iter().map(Schedule::try_from).collect()
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn create_schedule(&self, new: NewSchedule) -> Result<Schedule, RepoError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            INSERT INTO schedules (id, service_id, date, start_time, end_time, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, service_id, date, start_time, end_time, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.service_id)
        .bind(new.date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.status.as_str())
        .fetch_one(&self.db)
        .await?;
        row.try_into()
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Schedule, RepoError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, service_id, date, start_time, end_time, status, created_at
            FROM schedules
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn list_schedules(&self, limit: i64, offset: i64) -> Result<Vec<Schedule>, RepoError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, service_id, date, start_time, end_time, status, created_at
            FROM schedules
            ORDER BY date, start_time, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        into_schedules(rows)
    }

    async fn list_schedules_by_service(
        &self,
        service_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Schedule>, RepoError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, service_id, date, start_time, end_time, status, created_at
            FROM schedules
            WHERE service_id = $1
            ORDER BY date, start_time, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(service_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        into_schedules(rows)
    }

    async fn update_schedule(&self, changes: ScheduleChanges) -> Result<Schedule, RepoError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            UPDATE schedules
            SET date = $2, start_time = $3, end_time = $4, status = $5
            WHERE id = $1
            RETURNING id, service_id, date, start_time, end_time, status, created_at
            "#,
        )
        .bind(changes.id)
        .bind(changes.date)
        .bind(changes.start_time)
        .bind(changes.end_time)
        .bind(changes.status.as_str())
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
