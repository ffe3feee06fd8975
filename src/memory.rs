//! In-process repositories and a stub geocoder. Used by tests and by
//! `AppState::fake()`; they mirror the Postgres constraints that the
//! services depend on (unique user email/username, not-found on missing rows).

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepository,
        repo_types::{NewUser, StoredToken, User, UserChanges},
    },
    bookings::{
        repo::BookingRepository,
        repo_types::{Booking, BookingChanges, NewBooking},
    },
    catalog::{
        repo::ServiceRepository,
        repo_types::{NewService, Service, ServiceChanges},
    },
    error::DependencyError,
    maps::{Geocoder, Place},
    repository::RepoError,
    schedules::{
        repo::ScheduleRepository,
        repo_types::{NewSchedule, Schedule, ScheduleChanges},
    },
};

fn page<T>(mut rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = offset.max(0) as usize;
    let limit = limit.max(0) as usize;
    if offset >= rows.len() {
        return Vec::new();
    }
    rows.drain(..offset);
    rows.truncate(limit);
    rows
}

#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepository {
    fn check_unique(
        users: &HashMap<Uuid, User>,
        id: Uuid,
        username: &str,
        email: &str,
    ) -> Result<(), RepoError> {
        for other in users.values().filter(|u| u.id != id) {
            if other.email == email {
                return Err(RepoError::UniqueViolation("users_email_key".into()));
            }
            if other.username == username {
                return Err(RepoError::UniqueViolation("users_username_key".into()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create_user(&self, new: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        let id = Uuid::new_v4();
        Self::check_unique(&users, id, &new.username, &new.email)?;
        let user = User {
            id,
            username: new.username,
            full_name: new.full_name,
            email: new.email,
            password_hash: new.password_hash,
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<User, RepoError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, RepoError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError> {
        let mut rows: Vec<User> = self.users.read().await.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page(rows, limit, offset))
    }

    async fn update_user(&self, changes: UserChanges) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        Self::check_unique(&users, changes.id, &changes.username, &changes.email)?;
        let user = users.get_mut(&changes.id).ok_or(RepoError::NotFound)?;
        user.username = changes.username;
        user.full_name = changes.full_name;
        user.email = changes.email;
        user.password_hash = changes.password_hash;
        Ok(user.clone())
    }

    async fn update_user_token(
        &self,
        id: Uuid,
        token: Option<StoredToken>,
    ) -> Result<(), RepoError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(RepoError::NotFound)?;
        match token {
            Some(t) => {
                user.refresh_token_hash = Some(t.hash);
                user.refresh_token_expires_at = Some(t.expires_at);
            }
            None => {
                user.refresh_token_hash = None;
                user.refresh_token_expires_at = None;
            }
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

#[async_trait]
impl BookingRepository for MemoryBookingRepository {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking, RepoError> {
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            service_id: new.service_id,
            date: new.date,
            time: new.time,
            status: new.status,
            created_at: OffsetDateTime::now_utc(),
        };
        self.bookings
            .write()
            .await
            .insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Booking, RepoError> {
        self.bookings
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list_bookings(&self, limit: i64, offset: i64) -> Result<Vec<Booking>, RepoError> {
        let mut rows: Vec<Booking> = self.bookings.read().await.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page(rows, limit, offset))
    }

    async fn list_bookings_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, RepoError> {
        let mut rows: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page(rows, limit, offset))
    }

    async fn update_booking(&self, changes: BookingChanges) -> Result<Booking, RepoError> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings.get_mut(&changes.id).ok_or(RepoError::NotFound)?;
        booking.date = changes.date;
        booking.time = changes.time;
        booking.status = changes.status;
        Ok(booking.clone())
    }

    async fn delete_booking(&self, id: Uuid) -> Result<(), RepoError> {
        self.bookings
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryScheduleRepository {
    schedules: RwLock<HashMap<Uuid, Schedule>>,
}

fn sort_schedules(rows: &mut [Schedule]) {
    rows.sort_by(|a, b| {
        (a.date, a.start_time, a.id).cmp(&(b.date, b.start_time, b.id))
    });
}

#[async_trait]
impl ScheduleRepository for MemoryScheduleRepository {
    async fn create_schedule(&self, new: NewSchedule) -> Result<Schedule, RepoError> {
        let schedule = Schedule {
            id: Uuid::new_v4(),
            service_id: new.service_id,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            status: new.status,
            created_at: OffsetDateTime::now_utc(),
        };
        self.schedules
            .write()
            .await
            .insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Schedule, RepoError> {
        self.schedules
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list_schedules(&self, limit: i64, offset: i64) -> Result<Vec<Schedule>, RepoError> {
        let mut rows: Vec<Schedule> = self.schedules.read().await.values().cloned().collect();
        sort_schedules(&mut rows);
        Ok(page(rows, limit, offset))
    }

    async fn list_schedules_by_service(
        &self,
        service_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Schedule>, RepoError> {
        let mut rows: Vec<Schedule> = self
            .schedules
            .read()
            .await
            .values()
            .filter(|s| s.service_id == service_id)
            .cloned()
            .collect();
        sort_schedules(&mut rows);
        Ok(page(rows, limit, offset))
    }

    async fn update_schedule(&self, changes: ScheduleChanges) -> Result<Schedule, RepoError> {
        let mut schedules = self.schedules.write().await;
        let schedule = schedules.get_mut(&changes.id).ok_or(RepoError::NotFound)?;
        schedule.date = changes.date;
        schedule.start_time = changes.start_time;
        schedule.end_time = changes.end_time;
        schedule.status = changes.status;
        Ok(schedule.clone())
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<(), RepoError> {
        self.schedules
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryServiceRepository {
    services: RwLock<HashMap<Uuid, Service>>,
}

#[async_trait]
impl ServiceRepository for MemoryServiceRepository {
    async fn create_service(&self, new: NewService) -> Result<Service, RepoError> {
        let service = Service {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            price: new.price,
            location: new.location,
            kind: new.kind,
            created_at: OffsetDateTime::now_utc(),
        };
        self.services
            .write()
            .await
            .insert(service.id, service.clone());
        Ok(service)
    }

    async fn get_service(&self, id: Uuid) -> Result<Service, RepoError> {
        self.services
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn list_services(&self, limit: i64, offset: i64) -> Result<Vec<Service>, RepoError> {
        let mut rows: Vec<Service> = self.services.read().await.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page(rows, limit, offset))
    }

    async fn update_service(&self, changes: ServiceChanges) -> Result<Service, RepoError> {
        let mut services = self.services.write().await;
        let service = services.get_mut(&changes.id).ok_or(RepoError::NotFound)?;
        service.name = changes.name;
        service.description = changes.description;
        service.price = changes.price;
        service.location = changes.location;
        service.kind = changes.kind;
        Ok(service.clone())
    }

    async fn delete_service(&self, id: Uuid) -> Result<(), RepoError> {
        self.services
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[derive(Debug, Clone)]
enum StubMode {
    Accept,
    Reject(Vec<String>),
    Fail,
}

/// Geocoder that answers from a fixed rule instead of calling out.
#[derive(Debug, Clone)]
pub struct StubGeocoder {
    mode: StubMode,
    places: Arc<Vec<Place>>,
}

impl StubGeocoder {
    /// Every location is valid.
    pub fn accepting() -> Self {
        Self {
            mode: StubMode::Accept,
            places: Arc::new(Vec::new()),
        }
    }

    /// Every location except the listed ones is valid.
    pub fn rejecting<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: StubMode::Reject(locations.into_iter().map(Into::into).collect()),
            places: Arc::new(Vec::new()),
        }
    }

    /// Every call fails as if the upstream were down.
    pub fn failing() -> Self {
        Self {
            mode: StubMode::Fail,
            places: Arc::new(Vec::new()),
        }
    }

    pub fn with_places(mut self, places: Vec<Place>) -> Self {
        self.places = Arc::new(places);
        self
    }
}

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn validate_location(&self, location: &str) -> Result<bool, DependencyError> {
        match &self.mode {
            StubMode::Accept => Ok(true),
            StubMode::Reject(bad) => Ok(!bad.iter().any(|b| b == location)),
            StubMode::Fail => Err(DependencyError::Geocoding("stub geocoder is down".into())),
        }
    }

    async fn search_places(&self, query: &str) -> Result<Vec<Place>, DependencyError> {
        if let StubMode::Fail = self.mode {
            return Err(DependencyError::Geocoding("stub geocoder is down".into()));
        }
        let needle = query.to_lowercase();
        Ok(self
            .places
            .iter()
            .filter(|p| {
                p.formatted_address.to_lowercase().contains(&needle)
                    || p
                        .name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }
}
