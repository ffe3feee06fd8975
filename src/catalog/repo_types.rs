use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{error::AppError, repository::RepoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Hotel,
    Apartment,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Hotel => "hotel",
            ServiceKind::Apartment => "apartment",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hotel" => Ok(ServiceKind::Hotel),
            "apartment" => Ok(ServiceKind::Apartment),
            other => Err(AppError::validation(format!(
                "unknown service type {other:?}"
            ))),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ServiceRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub location: String,
    pub service_type: String,
    pub created_at: OffsetDateTime,
}

/// A bookable offering.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub location: String,
    pub kind: ServiceKind,
    pub created_at: OffsetDateTime,
}

impl TryFrom<ServiceRow> for Service {
    type Error = RepoError;

    fn try_from(r: ServiceRow) -> Result<Self, Self::Error> {
        let kind = r.service_type.parse::<ServiceKind>().map_err(|_| {
            RepoError::Backend(anyhow::anyhow!(
                "service {} has unknown type {:?}",
                r.id,
                r.service_type
            ))
        })?;
        Ok(Self {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            location: r.location,
            kind,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub location: String,
    pub kind: ServiceKind,
}

#[derive(Debug, Clone)]
pub struct ServiceChanges {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub location: String,
    pub kind: ServiceKind,
}

impl From<&Service> for ServiceChanges {
    fn from(s: &Service) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            description: s.description.clone(),
            price: s.price,
            location: s.location.clone(),
            kind: s.kind,
        }
    }
}
