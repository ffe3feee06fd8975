use std::{sync::Arc, time::Duration};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    bookings::{
        dto::{BookingResponse, CreateBookingRequest, UpdateBookingRequest},
        repo::BookingRepository,
        repo_types::{Booking, BookingChanges, NewBooking},
        status::BookingStatus,
    },
    error::{AppError, AppResult},
    pagination::Pagination,
    repository::with_deadline,
};

#[derive(Clone)]
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    timeout: Duration,
}

impl BookingService {
    pub fn new(bookings: Arc<dyn BookingRepository>, timeout: Duration) -> Self {
        Self { bookings, timeout }
    }

    async fn load(&self, id: Uuid) -> AppResult<Booking> {
        with_deadline(self.timeout, "get_booking", self.bookings.get_booking(id))
            .await
            .map_err(|e| e.into_app("booking"))
    }

    async fn load_owned(&self, caller: Uuid, id: Uuid) -> AppResult<Booking> {
        let booking = self.load(id).await?;
        if booking.user_id != caller {
            warn!(caller = %caller, booking_id = %id, "booking access by non-owner");
            return Err(AppError::Forbidden);
        }
        Ok(booking)
    }

    pub async fn create(
        &self,
        caller: Uuid,
        req: CreateBookingRequest,
    ) -> AppResult<BookingResponse> {
        if req.service_id.is_nil() {
            return Err(AppError::validation("service_id is required"));
        }
        let status = req.status.unwrap_or(BookingStatus::Pending);
        if !status.is_initial() {
            return Err(AppError::validation(format!(
                "a new booking cannot be {status}"
            )));
        }

        let booking = with_deadline(
            self.timeout,
            "create_booking",
            self.bookings.create_booking(NewBooking {
                user_id: caller,
                service_id: req.service_id,
                date: req.date,
                time: req.time,
                status,
            }),
        )
        .await
        .map_err(|e| e.into_app("booking"))?;

        info!(booking_id = %booking.id, user_id = %caller, service_id = %booking.service_id, "booking created");
        Ok(booking.into())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<BookingResponse> {
        Ok(self.load(id).await?.into())
    }

    pub async fn list(&self, page: Pagination) -> AppResult<Vec<BookingResponse>> {
        let (limit, offset) = page.clamped();
        let rows = with_deadline(
            self.timeout,
            "list_bookings",
            self.bookings.list_bookings(limit, offset),
        )
        .await
        .map_err(|e| e.into_app("booking"))?;
        Ok(rows.into_iter().map(BookingResponse::from).collect())
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        page: Pagination,
    ) -> AppResult<Vec<BookingResponse>> {
        let (limit, offset) = page.clamped();
        let rows = with_deadline(
            self.timeout,
            "list_bookings_by_user",
            self.bookings.list_bookings_by_user(user_id, limit, offset),
        )
        .await
        .map_err(|e| e.into_app("booking"))?;
        Ok(rows.into_iter().map(BookingResponse::from).collect())
    }

    pub async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        req: UpdateBookingRequest,
    ) -> AppResult<BookingResponse> {
        let current = self.load_owned(caller, id).await?;

        let status = match req.status {
            Some(next) => current.status.transition(next)?,
            None => current.status,
        };
        if (req.date.is_some() || req.time.is_some()) && current.status.is_terminal() {
            return Err(AppError::validation(format!(
                "a {} booking cannot be rescheduled",
                current.status
            )));
        }

        let booking = with_deadline(
            self.timeout,
            "update_booking",
            self.bookings.update_booking(BookingChanges {
                id,
                date: req.date.unwrap_or(current.date),
                time: req.time.unwrap_or(current.time),
                status,
            }),
        )
        .await
        .map_err(|e| e.into_app("booking"))?;

        if booking.status != current.status {
            info!(booking_id = %id, from = %current.status, to = %booking.status, "booking status changed");
        }
        Ok(booking.into())
    }

    pub async fn delete(&self, caller: Uuid, id: Uuid) -> AppResult<()> {
        self.load_owned(caller, id).await?;
        with_deadline(self.timeout, "delete_booking", self.bookings.delete_booking(id))
            .await
            .map_err(|e| e.into_app("booking"))?;
        info!(booking_id = %id, "booking deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, time};

    use super::*;
    use crate::memory::MemoryBookingRepository;

    fn service() -> BookingService {
        BookingService::new(
            Arc::new(MemoryBookingRepository::default()),
            Duration::from_secs(2),
        )
    }

    fn create_req(service_id: Uuid) -> CreateBookingRequest {
        CreateBookingRequest {
            service_id,
            date: date!(2024 - 07 - 01),
            time: time!(15:00),
            status: None,
        }
    }

    fn status_req(status: BookingStatus) -> UpdateBookingRequest {
        UpdateBookingRequest {
            status: Some(status),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_defaults_to_pending_for_caller() {
        let svc = service();
        let user = Uuid::new_v4();
        let booking = svc.create(user, create_req(Uuid::new_v4())).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.user_id, user);

        let mine = svc.list_for_user(user, Pagination::default()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(svc
            .list_for_user(Uuid::new_v4(), Pagination::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn create_validates_input() {
        let svc = service();
        assert!(matches!(
            svc.create(Uuid::new_v4(), create_req(Uuid::nil())).await,
            Err(AppError::Validation(_))
        ));
        let mut req = create_req(Uuid::new_v4());
        req.status = Some(BookingStatus::Completed);
        assert!(matches!(
            svc.create(Uuid::new_v4(), req).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn lifecycle_follows_transitions() {
        let svc = service();
        let user = Uuid::new_v4();
        let b = svc.create(user, create_req(Uuid::new_v4())).await.unwrap();

        let b = svc
            .update(user, b.id, status_req(BookingStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        let b = svc
            .update(user, b.id, status_req(BookingStatus::Completed))
            .await
            .unwrap();
        assert_eq!(b.status, BookingStatus::Completed);

        assert!(matches!(
            svc.update(user, b.id, status_req(BookingStatus::Cancelled)).await,
            Err(AppError::InvalidStatusTransition { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_booking_is_frozen() {
        let svc = service();
        let user = Uuid::new_v4();
        let b = svc.create(user, create_req(Uuid::new_v4())).await.unwrap();
        svc.update(user, b.id, status_req(BookingStatus::Cancelled))
            .await
            .unwrap();

        assert!(matches!(
            svc.update(user, b.id, status_req(BookingStatus::Confirmed)).await,
            Err(AppError::InvalidStatusTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Confirmed
            })
        ));
        let reschedule = UpdateBookingRequest {
            time: Some(time!(18:00)),
            ..Default::default()
        };
        assert!(matches!(
            svc.update(user, b.id, reschedule).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(
            svc.get(b.id).await.unwrap().status,
            BookingStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn reschedule_keeps_status() {
        let svc = service();
        let user = Uuid::new_v4();
        let b = svc.create(user, create_req(Uuid::new_v4())).await.unwrap();
        let moved = svc
            .update(
                user,
                b.id,
                UpdateBookingRequest {
                    date: Some(date!(2024 - 07 - 02)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.date, date!(2024 - 07 - 02));
        assert_eq!(moved.time, b.time);
        assert_eq!(moved.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn only_owner_may_modify() {
        let svc = service();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let b = svc.create(owner, create_req(Uuid::new_v4())).await.unwrap();

        assert!(matches!(
            svc.update(other, b.id, status_req(BookingStatus::Cancelled)).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            svc.delete(other, b.id).await,
            Err(AppError::Forbidden)
        ));

        svc.delete(owner, b.id).await.unwrap();
        assert!(matches!(
            svc.get(b.id).await,
            Err(AppError::NotFound("booking"))
        ));
    }
}
