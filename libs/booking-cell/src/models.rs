// libs/booking-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// How the caller identifies the customer: directly by id, or by the
/// human-facing insurance policy number resolved through the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerRef {
    Id(String),
    PolicyNumber(String),
}

/// One booking attempt as handed over by the UI or assistant layer. All
/// session context travels in the request; nothing ambient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub clinic_id: String,
    pub clinic_doctor_id: String,
    pub office_id: String,
    pub customer: CustomerRef,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("{which} not found")]
    NotFound { which: &'static str },

    #[error("invalid booking window: {0}")]
    InvalidWindow(String),

    #[error("requested slot is not available")]
    SlotUnavailable,

    #[error("remote service rejected the booking: {0}")]
    RemoteRejected(String),
}
