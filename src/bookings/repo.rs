use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    bookings::repo_types::{Booking, BookingChanges, BookingRow, NewBooking},
    repository::RepoError,
};

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking, RepoError>;
    async fn get_booking(&self, id: Uuid) -> Result<Booking, RepoError>;
    async fn list_bookings(&self, limit: i64, offset: i64) -> Result<Vec<Booking>, RepoError>;
    async fn list_bookings_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, RepoError>;
    async fn update_booking(&self, changes: BookingChanges) -> Result<Booking, RepoError>;
    async fn delete_booking(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct PgBookingRepository {
    db: PgPool,
}

impl PgBookingRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, RepoError> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking, RepoError> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (id, user_id, service_id, date, time, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, service_id, date, time, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.service_id)
        .bind(new.date)
        .bind(new.time)
        .bind(new.status.as_str())
        .fetch_one(&self.db)
        .await?;
        row.try_into()
    }

    async fn get_booking(&self, id: Uuid) -> Result<Booking, RepoError> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, service_id, date, time, status, created_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn list_bookings(&self, limit: i64, offset: i64) -> Result<Vec<Booking>, RepoError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, service_id, date, time, status, created_at
            FROM bookings
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        into_bookings(rows)
    }

    async fn list_bookings_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, RepoError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, service_id, date, time, status, created_at
            FROM bookings
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        into_bookings(rows)
    }

    async fn update_booking(&self, changes: BookingChanges) -> Result<Booking, RepoError> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            UPDATE bookings
            SET date = $2, time = $3, status = $4
            WHERE id = $1
            RETURNING id, user_id, service_id, date, time, status, created_at
            "#,
        )
        .bind(changes.id)
        .bind(changes.date)
        .bind(changes.time)
        .bind(changes.status.as_str())
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn delete_booking(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
