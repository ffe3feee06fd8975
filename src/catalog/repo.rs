use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    catalog::repo_types::{NewService, Service, ServiceChanges, ServiceRow},
    repository::RepoError,
};

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create_service(&self, new: NewService) -> Result<Service, RepoError>;
    async fn get_service(&self, id: Uuid) -> Result<Service, RepoError>;
    async fn list_services(&self, limit: i64, offset: i64) -> Result<Vec<Service>, RepoError>;
    async fn update_service(&self, changes: ServiceChanges) -> Result<Service, RepoError>;
    async fn delete_service(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct PgServiceRepository {
    db: PgPool,
}

impl PgServiceRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ServiceRepository for PgServiceRepository {
    async fn create_service(&self, new: NewService) -> Result<Service, RepoError> {
        let row = sqlx::query_as::<_, ServiceRow>(
            r#"
            INSERT INTO services (id, name, description, price, location, service_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, description, price, location, service_type, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(&new.location)
        .bind(new.kind.as_str())
        .fetch_one(&self.db)
        .await?;
        row.try_into()
    }

    async fn get_service(&self, id: Uuid) -> Result<Service, RepoError> {
        let row = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT id, name, description, price, location, service_type, created_at
            FROM services
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn list_services(&self, limit: i64, offset: i64) -> Result<Vec<Service>, RepoError> {
        let rows = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT id, name, description, price, location, service_type, created_at
            FROM services
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Service::try_from).collect()
    }

    async fn update_service(&self, changes: ServiceChanges) -> Result<Service, RepoError> {
        let row = sqlx::query_as::<_, ServiceRow>(
            r#"
            UPDATE services
            SET name = $2, description = $3, price = $4, location = $5, service_type = $6
            WHERE id = $1
            RETURNING id, name, description, price, location, service_type, created_at
            "#,
        )
        .bind(changes.id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(&changes.location)
        .bind(changes.kind.as_str())
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(RepoError::NotFound)?.try_into()
    }

    async fn delete_service(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
