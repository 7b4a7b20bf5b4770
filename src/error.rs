use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::AppointmentStatus;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

/// First rule an appointment submission violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pet_id is required and must be a valid UUID")]
    InvalidPetId,
    #[error("vet_id must be a valid UUID when provided")]
    InvalidVetId,
    #[error("date is required and must use the DD-MM-YYYY format")]
    InvalidDateFormat,
    #[error("time is required and must use the HH:MM format")]
    InvalidTimeFormat,
    #[error("appointment date and time cannot be in the past")]
    DateTimeInPast,
    #[error("status_id {0} is not a known appointment status")]
    InvalidStatus(i64),
    #[error("weight_kg must be a non-negative number when provided")]
    InvalidWeight,
    #[error("temperature must be a non-negative number when provided")]
    InvalidTemperature,
    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
}

/// Failures raised by a persistence gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("storage call timed out after {0:?}")]
    TimedOut(Duration),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("appointment {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Persistence(#[from] GatewayError),
    #[error("appointment {0} was modified concurrently, retry the toggle")]
    StateConflict(Uuid),
    #[error("appointment {id} is {from} and cannot be toggled")]
    InvalidTransition { id: Uuid, from: AppointmentStatus },
}

impl AppointmentError {
    /// HTTP status the API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AppointmentError::Validation(_) => 400,
            AppointmentError::NotFound(_) => 404,
            AppointmentError::StateConflict(_) | AppointmentError::InvalidTransition { .. } => 409,
            AppointmentError::Persistence(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppointmentError::Validation(_) => "VALIDATION_ERROR",
            AppointmentError::NotFound(_) => "NOT_FOUND",
            AppointmentError::StateConflict(_) => "STATE_CONFLICT",
            AppointmentError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppointmentError::Persistence(_) => "INTERNAL",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorObject {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        }
    }
}
