//! Destination document-intake service contract.
//!
//! - `GET  /definition/template/adl1.4` liveness check
//! - `POST /definition/template/adl1.4` operational template upload
//! - `POST /ehr` creates an EHR, answering `{"ehr_id": {"value": "..."}}`
//! - `POST /ehr/{ehr_id}/composition` files one composition

mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub use http::{HttpIntake, IntakeConfig};

pub const TEMPLATE_PATH: &str = "/definition/template/adl1.4";
pub const EHR_PATH: &str = "/ehr";

pub fn composition_path(ehr_id: &str) -> String {
    format!("{EHR_PATH}/{ehr_id}/composition")
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed service response: {0}")]
    Malformed(String),
}

impl IntakeError {
    /// HTTP status when the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            IntakeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Body returned by `POST /ehr`.
#[derive(Debug, Clone, Deserialize)]
pub struct EhrCreated {
    pub ehr_id: ObjectId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectId {
    pub value: String,
}

/// Operations the dispatcher needs from a destination service.
#[async_trait]
pub trait IntakeService: Send + Sync {
    /// Create an EHR container and return its identifier.
    async fn create_ehr(&self) -> Result<String, IntakeError>;

    /// File one composition under `ehr_id`. Any 2xx is success.
    async fn submit_composition(&self, ehr_id: &str, composition: &Value)
    -> Result<(), IntakeError>;
}
