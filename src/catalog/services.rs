use std::{sync::Arc, time::Duration};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    catalog::{
        dto::{CreateServiceRequest, ServiceResponse, UpdateServiceRequest},
        repo::ServiceRepository,
        repo_types::{NewService, ServiceChanges},
    },
    error::{AppError, AppResult},
    maps::Geocoder,
    pagination::Pagination,
    repository::with_deadline,
};

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn check_price(price: f64) -> AppResult<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation(
            "price must be a non-negative number",
        ));
    }
    Ok(price)
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Bookable services. Locations are checked against the geocoder before any write.
#[derive(Clone)]
pub struct ServiceCatalog {
    services: Arc<dyn ServiceRepository>,
    geocoder: Arc<dyn Geocoder>,
    timeout: Duration,
}

impl ServiceCatalog {
    pub fn new(
        services: Arc<dyn ServiceRepository>,
        geocoder: Arc<dyn Geocoder>,
        timeout: Duration,
    ) -> Self {
        Self {
            services,
            geocoder,
            timeout,
        }
    }

    async fn ensure_location(&self, location: &str) -> AppResult<()> {
        if !self.geocoder.validate_location(location).await? {
            warn!(location = %location, "location did not geocode");
            return Err(AppError::InvalidLocation);
        }
        Ok(())
    }

    pub async fn create(&self, req: CreateServiceRequest) -> AppResult<ServiceResponse> {
        let name = required("name", &req.name)?;
        let location = required("location", &req.location)?;
        let price = check_price(req.price)?;
        self.ensure_location(&location).await?;

        let service = with_deadline(
            self.timeout,
            "create_service",
            self.services.create_service(NewService {
                name,
                description: clean_description(req.description),
                price,
                location,
                kind: req.kind,
            }),
        )
        .await
        .map_err(|e| e.into_app("service"))?;

        info!(service_id = %service.id, kind = %service.kind, "service created");
        Ok(service.into())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ServiceResponse> {
        let service = with_deadline(self.timeout, "get_service", self.services.get_service(id))
            .await
            .map_err(|e| e.into_app("service"))?;
        Ok(service.into())
    }

    pub async fn list(&self, page: Pagination) -> AppResult<Vec<ServiceResponse>> {
        let (limit, offset) = page.clamped();
        let rows = with_deadline(
            self.timeout,
            "list_services",
            self.services.list_services(limit, offset),
        )
        .await
        .map_err(|e| e.into_app("service"))?;
        Ok(rows.into_iter().map(ServiceResponse::from).collect())
    }

    pub async fn update(&self, id: Uuid, req: UpdateServiceRequest) -> AppResult<ServiceResponse> {
        let current = with_deadline(self.timeout, "get_service", self.services.get_service(id))
            .await
            .map_err(|e| e.into_app("service"))?;
        let mut changes = ServiceChanges::from(&current);

        if let Some(name) = req.name {
            changes.name = required("name", &name)?;
        }
        if let Some(description) = req.description {
            changes.description = clean_description(Some(description));
        }
        if let Some(price) = req.price {
            changes.price = check_price(price)?;
        }
        if let Some(kind) = req.kind {
            changes.kind = kind;
        }
        if let Some(location) = req.location {
            let location = required("location", &location)?;
            if location != current.location {
                self.ensure_location(&location).await?;
            }
            changes.location = location;
        }

        let service = with_deadline(
            self.timeout,
            "update_service",
            self.services.update_service(changes),
        )
        .await
        .map_err(|e| e.into_app("service"))?;
        info!(service_id = %id, "service updated");
        Ok(service.into())
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        with_deadline(self.timeout, "delete_service", self.services.delete_service(id))
            .await
            .map_err(|e| e.into_app("service"))?;
        info!(service_id = %id, "service deleted");
        Ok(())
    }
}
