// libs/booking-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_gateway::{queries, QueryGateway};
use snapshot_cell::models::{Appointment, PolicyLookup, Snapshot, SubResource};
use snapshot_cell::services::availability::AvailabilityIndex;

use crate::models::{BookingError, BookingRequest, CustomerRef};

/// Validates booking requests against one snapshot and, only when every
/// local check passes, issues the create-appointment mutation.
///
/// The snapshot is never mutated, not even on success: the remote service is
/// the source of truth, and observing the new appointment requires a fresh
/// aggregation. Concurrent requests for the same slot are serialized by the
/// remote; the local validation is a freshness check, not a lock.
pub struct BookingService {
    gateway: Arc<dyn QueryGateway>,
    snapshot: Arc<Snapshot>,
    availability: AvailabilityIndex,
}

impl BookingService {
    /// The availability index is built once per snapshot, at construction.
    pub fn new(gateway: Arc<dyn QueryGateway>, snapshot: Arc<Snapshot>) -> Self {
        let availability = AvailabilityIndex::build(&snapshot);
        Self {
            gateway,
            snapshot,
            availability,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn availability(&self) -> &AvailabilityIndex {
        &self.availability
    }

    /// Validate and commit one booking. Fail fast: the first violation is
    /// reported and no remote write happens on any local failure.
    pub async fn book(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        debug!(
            "Booking request for clinic doctor {} in office {} ({} .. {})",
            request.clinic_doctor_id, request.office_id, request.begin, request.end
        );

        // Structurally invalid windows are rejected before any lookup.
        if request.begin >= request.end {
            return Err(BookingError::InvalidWindow(format!(
                "begin {} is not before end {}",
                request.begin, request.end
            )));
        }

        let customer_id = self.resolve_customer(&request.customer)?;
        self.verify_references(&request)?;
        self.verify_consistent(&request, &customer_id)?;

        if request.begin < Utc::now() {
            return Err(BookingError::InvalidWindow(
                "booking window starts in the past".to_string(),
            ));
        }

        // A clinic whose appointment list could not be fetched cannot be
        // conflict-checked; unknown calendars are never treated as open.
        let appointments_missing = self.snapshot.partial_failures.iter().any(|failure| {
            failure.clinic_id == request.clinic_id && failure.resource == SubResource::Appointments
        });
        if appointments_missing {
            warn!(
                "Refusing to book in clinic {}: appointment list was not fetched",
                request.clinic_id
            );
            return Err(BookingError::SlotUnavailable);
        }

        if !self.availability.is_free(
            &request.clinic_doctor_id,
            &request.office_id,
            request.begin,
            request.end,
        ) {
            info!(
                "Slot {} .. {} unavailable for clinic doctor {}",
                request.begin, request.end, request.clinic_doctor_id
            );
            return Err(BookingError::SlotUnavailable);
        }

        self.create_appointment(&request, customer_id).await
    }

    fn resolve_customer(&self, customer: &CustomerRef) -> Result<String, BookingError> {
        match customer {
            CustomerRef::Id(id) => self
                .snapshot
                .customer(id)
                .map(|c| c.id.clone())
                .ok_or(BookingError::NotFound { which: "customer" }),
            CustomerRef::PolicyNumber(policy_number) => {
                match self.snapshot.customer_by_policy(policy_number) {
                    PolicyLookup::Unique(customer) => Ok(customer.id.clone()),
                    PolicyLookup::Missing => Err(BookingError::NotFound { which: "customer" }),
                    PolicyLookup::Ambiguous => {
                        // Never pick one of several customers sharing a
                        // policy number.
                        warn!("Policy number {} is ambiguous", policy_number);
                        Err(BookingError::NotFound { which: "customer" })
                    }
                }
            }
        }
    }

    fn verify_references(&self, request: &BookingRequest) -> Result<(), BookingError> {
        if self.snapshot.clinic(&request.clinic_id).is_none() {
            return Err(BookingError::NotFound { which: "clinic" });
        }
        if self
            .snapshot
            .clinic_doctor(&request.clinic_id, &request.clinic_doctor_id)
            .is_none()
        {
            return Err(BookingError::NotFound {
                which: "clinic doctor",
            });
        }
        if self
            .snapshot
            .office(&request.clinic_id, &request.office_id)
            .is_none()
        {
            return Err(BookingError::NotFound { which: "office" });
        }
        Ok(())
    }

    /// Booking never proceeds against entities a recorded inconsistency
    /// touches; reads may still display them.
    fn verify_consistent(
        &self,
        request: &BookingRequest,
        customer_id: &str,
    ) -> Result<(), BookingError> {
        let references: [(&str, &'static str); 4] = [
            (request.clinic_id.as_str(), "clinic"),
            (request.clinic_doctor_id.as_str(), "clinic doctor"),
            (request.office_id.as_str(), "office"),
            (customer_id, "customer"),
        ];

        for (id, which) in references {
            if let Some(inconsistency) = self.snapshot.inconsistency_mentioning(id) {
                warn!("Booking blocked by inconsistency: {}", inconsistency);
                return Err(if inconsistency.is_temporal() {
                    BookingError::SlotUnavailable
                } else {
                    BookingError::NotFound { which }
                });
            }
        }
        Ok(())
    }

    async fn create_appointment(
        &self,
        request: &BookingRequest,
        customer_id: String,
    ) -> Result<Appointment, BookingError> {
        let variables = json!({
            "clinicId": request.clinic_id,
            "clinicDoctorId": request.clinic_doctor_id,
            "beginDate": request.begin.to_rfc3339(),
            "endDate": request.end.to_rfc3339(),
            "clinicOfficeId": request.office_id,
            "customerId": customer_id,
        });

        let data = self
            .gateway
            .execute(queries::CREATE_APPOINTMENT, variables)
            .await
            .map_err(|e| BookingError::RemoteRejected(e.to_string()))?;

        let id = data
            .get("packet")
            .and_then(|packet| packet.get("createClinicTable"))
            .and_then(|created| created.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BookingError::RemoteRejected("mutation response has no appointment id".to_string())
            })?
            .to_string();

        info!(
            "Appointment {} created for clinic doctor {} in office {}",
            id, request.clinic_doctor_id, request.office_id
        );

        Ok(Appointment {
            id,
            clinic_id: request.clinic_id.clone(),
            clinic_doctor_id: request.clinic_doctor_id.clone(),
            office_id: request.office_id.clone(),
            customer_id,
            begin: request.begin,
            end: request.end,
        })
    }
}
