// libs/snapshot-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use shared_gateway::GatewayError;

/// Sentinel for optional descriptive fields missing from raw data. Identity
/// and lookup fields never fall back to it.
pub const UNKNOWN: &str = "unknown";

// ==============================================================================
// CORE ENTITY MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    pub last: String,
}

impl PersonName {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first, self.last)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub id: String,
    pub clinic_id: String,
    pub office_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorType {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorTypeRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub person_name: PersonName,
    pub doctor_type: DoctorTypeRef,
}

/// The doctor data the remote embeds in an affiliation record: person and
/// specialty name only, no stand-alone doctor id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub person_name: PersonName,
    pub specialty: String,
}

/// A doctor's affiliation with one clinic. Availability and appointments
/// key on this record's id, not on the doctor's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicDoctor {
    pub id: String,
    pub clinic_id: String,
    pub doctor: DoctorProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub person_name: PersonName,
    pub insurance_policy_number: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: String,
    pub clinic_doctor_id: String,
    pub office_id: String,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub clinic_id: String,
    pub clinic_doctor_id: String,
    pub office_id: String,
    pub customer_id: String,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Appointment {
    /// Half-open interval overlap: [a,b) and [b,c) are adjacent, not
    /// overlapping.
    pub fn overlaps(&self, begin: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.begin < end && begin < self.end
    }
}

// ==============================================================================
// AGGREGATION WINDOW
// ==============================================================================

/// The date range availability is fetched for. An explicit parameter of
/// aggregation, not a default buried in a query string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn starting_now(days: i64) -> Self {
        let from = Utc::now();
        Self {
            from,
            to: from + Duration::days(days),
        }
    }

    pub fn contains(&self, begin: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.from <= begin && end <= self.to
    }
}

impl Default for DateWindow {
    fn default() -> Self {
        Self::starting_now(7)
    }
}

// ==============================================================================
// PARTIAL FAILURES AND INCONSISTENCIES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubResource {
    Offices,
    ClinicDoctors,
    Appointments,
    Availability,
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubResource::Offices => write!(f, "offices"),
            SubResource::ClinicDoctors => write!(f, "clinic_doctors"),
            SubResource::Appointments => write!(f, "appointments"),
            SubResource::Availability => write!(f, "availability"),
        }
    }
}

/// One sub-resource fetch that failed during aggregation. The owning clinic
/// stays in the snapshot with that collection empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub clinic_id: String,
    pub clinic_doctor_id: Option<String>,
    pub resource: SubResource,
    pub detail: String,
}

/// An invariant violation detected after aggregation. The data is retained
/// for display; booking against the entities involved is refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
    #[error("office {office_id} references unknown clinic {clinic_id}")]
    OrphanOffice { office_id: String, clinic_id: String },

    #[error("clinic doctor {clinic_doctor_id} references unknown clinic {clinic_id}")]
    OrphanClinicDoctor {
        clinic_doctor_id: String,
        clinic_id: String,
    },

    #[error("availability slot {slot_id} references unknown clinic doctor {clinic_doctor_id}")]
    OrphanAvailability {
        slot_id: String,
        clinic_doctor_id: String,
    },

    #[error("appointment {appointment_id} references unknown {field} {value}")]
    OrphanAppointmentRef {
        appointment_id: String,
        field: String,
        value: String,
    },

    #[error("insurance policy number {policy_number} is shared by customers {customer_ids:?}")]
    DuplicatePolicyNumber {
        policy_number: String,
        customer_ids: Vec<String>,
    },

    #[error("office number {office_number} in clinic {clinic_id} is shared by offices {office_ids:?}")]
    DuplicateOfficeNumber {
        clinic_id: String,
        office_number: String,
        office_ids: Vec<String>,
    },

    #[error("appointments {first_id} and {second_id} overlap for clinic doctor {clinic_doctor_id}")]
    OverlappingAppointments {
        clinic_doctor_id: String,
        first_id: String,
        second_id: String,
    },

    #[error("appointment {appointment_id} lies outside the availability of clinic doctor {clinic_doctor_id}")]
    AppointmentOutsideAvailability {
        appointment_id: String,
        clinic_doctor_id: String,
    },
}

impl Inconsistency {
    /// Whether the inconsistency involves the given entity id or lookup key.
    pub fn mentions(&self, id: &str) -> bool {
        match self {
            Inconsistency::OrphanOffice {
                office_id,
                clinic_id,
            } => office_id == id || clinic_id == id,
            Inconsistency::OrphanClinicDoctor {
                clinic_doctor_id,
                clinic_id,
            } => clinic_doctor_id == id || clinic_id == id,
            Inconsistency::OrphanAvailability {
                slot_id,
                clinic_doctor_id,
            } => slot_id == id || clinic_doctor_id == id,
            Inconsistency::OrphanAppointmentRef {
                appointment_id,
                value,
                ..
            } => appointment_id == id || value == id,
            Inconsistency::DuplicatePolicyNumber {
                policy_number,
                customer_ids,
            } => policy_number == id || customer_ids.iter().any(|c| c == id),
            // Only the offices sharing the number are ambiguous; bookings
            // elsewhere in the clinic are unaffected.
            Inconsistency::DuplicateOfficeNumber { office_ids, .. } => {
                office_ids.iter().any(|o| o == id)
            }
            Inconsistency::OverlappingAppointments {
                clinic_doctor_id,
                first_id,
                second_id,
            } => clinic_doctor_id == id || first_id == id || second_id == id,
            Inconsistency::AppointmentOutsideAvailability {
                appointment_id,
                clinic_doctor_id,
            } => appointment_id == id || clinic_doctor_id == id,
        }
    }

    /// Temporal inconsistencies taint a doctor's calendar; the rest taint an
    /// identity or lookup key.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Inconsistency::OverlappingAppointments { .. }
                | Inconsistency::AppointmentOutsideAvailability { .. }
        )
    }
}

// ==============================================================================
// SNAPSHOT
// ==============================================================================

/// Result of resolving a customer by insurance policy number.
#[derive(Debug)]
pub enum PolicyLookup<'a> {
    Missing,
    Unique(&'a Customer),
    Ambiguous,
}

/// The aggregate produced by one pull: all clinic data, flattened, plus the
/// failures and inconsistencies observed while building it. Immutable once
/// returned; a new pull supersedes it wholesale.
///
/// Per-clinic vectors preserve the order the gateway returned; consumers
/// must not depend on that order for correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub window: DateWindow,
    pub clinics: Vec<Clinic>,
    pub doctor_types: Vec<DoctorType>,
    pub doctors: Vec<Doctor>,
    pub customers: Vec<Customer>,
    /// clinic_id -> offices
    pub offices: HashMap<String, Vec<Office>>,
    /// clinic_id -> clinic doctors
    pub clinic_doctors: HashMap<String, Vec<ClinicDoctor>>,
    /// clinic_doctor_id -> availability slots
    pub availability: HashMap<String, Vec<AvailabilitySlot>>,
    /// clinic_id -> appointments
    pub appointments: HashMap<String, Vec<Appointment>>,
    pub partial_failures: Vec<PartialFailure>,
    pub inconsistencies: Vec<Inconsistency>,
}

impl Snapshot {
    pub fn clinic(&self, clinic_id: &str) -> Option<&Clinic> {
        self.clinics.iter().find(|c| c.id == clinic_id)
    }

    pub fn office(&self, clinic_id: &str, office_id: &str) -> Option<&Office> {
        self.offices
            .get(clinic_id)?
            .iter()
            .find(|o| o.id == office_id)
    }

    pub fn clinic_doctor(&self, clinic_id: &str, clinic_doctor_id: &str) -> Option<&ClinicDoctor> {
        self.clinic_doctors
            .get(clinic_id)?
            .iter()
            .find(|d| d.id == clinic_doctor_id)
    }

    pub fn customer(&self, customer_id: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == customer_id)
    }

    /// Resolve a customer by policy number. A number shared by more than one
    /// customer resolves to `Ambiguous`, never to an arbitrary pick.
    pub fn customer_by_policy(&self, policy_number: &str) -> PolicyLookup<'_> {
        let mut matches = self
            .customers
            .iter()
            .filter(|c| c.insurance_policy_number == policy_number);

        match (matches.next(), matches.next()) {
            (None, _) => PolicyLookup::Missing,
            (Some(customer), None) => PolicyLookup::Unique(customer),
            (Some(_), Some(_)) => PolicyLookup::Ambiguous,
        }
    }

    /// All appointments of one clinic doctor, across every office.
    pub fn appointments_for_doctor(&self, clinic_doctor_id: &str) -> Vec<&Appointment> {
        self.appointments
            .values()
            .flatten()
            .filter(|a| a.clinic_doctor_id == clinic_doctor_id)
            .collect()
    }

    /// The first recorded inconsistency involving the given id, if any.
    pub fn inconsistency_mentioning(&self, id: &str) -> Option<&Inconsistency> {
        self.inconsistencies.iter().find(|i| i.mentions(id))
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// A raw record field that is missing or malformed where an identifier,
/// temporal bound, or relationship key was required.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid field `{field}`: {reason}")]
pub struct NormalizationError {
    pub field: String,
    pub reason: String,
}

impl NormalizationError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(field, "missing")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    /// A top-level collection could not be fetched; nothing useful can be
    /// built from the rest.
    #[error("failed to fetch {collection}: {source}")]
    Fatal {
        collection: &'static str,
        #[source]
        source: GatewayError,
    },
}
