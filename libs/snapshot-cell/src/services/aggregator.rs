// libs/snapshot-cell/src/services/aggregator.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_gateway::{queries, GatewayError, QueryGateway};

use crate::models::{
    AggregationError, Appointment, AvailabilitySlot, Clinic, ClinicDoctor, Customer, DateWindow,
    Doctor, DoctorType, NormalizationError, Office, PartialFailure, Snapshot, SubResource,
};
use crate::services::{consistency, normalize};

/// Orchestrates the full fan-out of one pull: top-level collections first,
/// then per-clinic sub-resources and per-doctor availability, all through a
/// bounded worker pool. The snapshot is only appended to until the single
/// join point at the end of `build_snapshot`.
pub struct SnapshotAggregator {
    gateway: Arc<dyn QueryGateway>,
    concurrency: usize,
}

impl SnapshotAggregator {
    pub fn new(gateway: Arc<dyn QueryGateway>) -> Self {
        Self {
            gateway,
            concurrency: 4,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Build one snapshot, fetching availability inside `window`.
    ///
    /// A failed top-level collection is fatal. A failed per-clinic
    /// sub-resource keeps the clinic with that collection empty and records
    /// a partial failure; siblings are unaffected.
    pub async fn build_snapshot(&self, window: DateWindow) -> Result<Snapshot, AggregationError> {
        info!(
            "Building snapshot, availability window {} .. {}",
            window.from, window.to
        );

        let (doctor_types, doctors, customers, clinics) = futures::try_join!(
            self.fetch_top_level("doctor types", queries::SEARCH_DOCTOR_TYPES, "searchDoctorType"),
            self.fetch_top_level("doctors", queries::SEARCH_DOCTORS, "searchDoctor"),
            self.fetch_top_level("customers", queries::SEARCH_CUSTOMERS, "searchCustomer"),
            self.fetch_top_level("clinics", queries::SEARCH_CLINICS, "searchClinic"),
        )?;

        let doctor_types: Vec<DoctorType> =
            normalize_all(&doctor_types, "doctor type", normalize::normalize_doctor_type);
        let doctors: Vec<Doctor> = normalize_all(&doctors, "doctor", normalize::normalize_doctor);
        let customers: Vec<Customer> =
            normalize_all(&customers, "customer", normalize::normalize_customer);
        let clinics: Vec<Clinic> = normalize_all(&clinics, "clinic", normalize::normalize_clinic);

        let bundles: Vec<ClinicBundle> = stream::iter(clinics.clone())
            .map(|clinic| self.fetch_clinic_bundle(clinic, window))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut snapshot = Snapshot {
            fetched_at: Utc::now(),
            window,
            clinics,
            doctor_types,
            doctors,
            customers,
            offices: HashMap::new(),
            clinic_doctors: HashMap::new(),
            availability: HashMap::new(),
            appointments: HashMap::new(),
            partial_failures: Vec::new(),
            inconsistencies: Vec::new(),
        };

        for bundle in bundles {
            snapshot
                .offices
                .insert(bundle.clinic_id.clone(), bundle.offices);
            snapshot
                .clinic_doctors
                .insert(bundle.clinic_id.clone(), bundle.clinic_doctors);
            snapshot
                .appointments
                .insert(bundle.clinic_id.clone(), bundle.appointments);
            snapshot.availability.extend(bundle.availability);
            snapshot.partial_failures.extend(bundle.failures);
        }

        snapshot.inconsistencies = consistency::verify(&snapshot);

        info!(
            "Snapshot built: {} clinics, {} doctors, {} customers, {} partial failures, {} inconsistencies",
            snapshot.clinics.len(),
            snapshot.doctors.len(),
            snapshot.customers.len(),
            snapshot.partial_failures.len(),
            snapshot.inconsistencies.len(),
        );

        Ok(snapshot)
    }

    async fn fetch_top_level(
        &self,
        collection: &'static str,
        query: &str,
        root: &str,
    ) -> Result<Vec<Value>, AggregationError> {
        self.fetch_elems(query, json!({}), root)
            .await
            .map_err(|source| AggregationError::Fatal { collection, source })
    }

    async fn fetch_elems(
        &self,
        query: &str,
        variables: Value,
        root: &str,
    ) -> Result<Vec<Value>, GatewayError> {
        let data = self.gateway.execute(query, variables).await?;
        data.get(root)
            .and_then(|result| result.get("elems"))
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| GatewayError::Malformed(format!("missing {root}.elems in response")))
    }

    async fn fetch_clinic_bundle(&self, clinic: Clinic, window: DateWindow) -> ClinicBundle {
        debug!("Fetching sub-resources for clinic {}", clinic.id);

        let variables = json!({ "clinicId": clinic.id });
        let (offices, clinic_doctors, appointments) = futures::join!(
            self.fetch_elems(
                queries::SEARCH_CLINIC_OFFICES,
                variables.clone(),
                "searchClinicOffice"
            ),
            self.fetch_elems(
                queries::SEARCH_CLINIC_DOCTORS,
                variables.clone(),
                "searchClinicDoctor"
            ),
            self.fetch_elems(
                queries::SEARCH_CLINIC_APPOINTMENTS,
                variables,
                "searchClinicTable"
            ),
        );

        let mut bundle = ClinicBundle::new(clinic.id.clone());

        match offices {
            Ok(raw) => bundle.offices = normalize_all(&raw, "office", normalize::normalize_office),
            Err(e) => bundle.record_failure(None, SubResource::Offices, e),
        }
        match clinic_doctors {
            Ok(raw) => {
                bundle.clinic_doctors = normalize_all(&raw, "clinic doctor", |record| {
                    normalize::normalize_clinic_doctor(&clinic.id, record)
                })
            }
            Err(e) => bundle.record_failure(None, SubResource::ClinicDoctors, e),
        }
        match appointments {
            Ok(raw) => {
                bundle.appointments = normalize_all(&raw, "appointment", |record| {
                    normalize::normalize_appointment(&clinic.id, record)
                })
            }
            Err(e) => bundle.record_failure(None, SubResource::Appointments, e),
        }

        let doctor_ids: Vec<String> = bundle.clinic_doctors.iter().map(|d| d.id.clone()).collect();
        let availability: Vec<(String, Result<Vec<Value>, GatewayError>)> =
            stream::iter(doctor_ids)
                .map(|clinic_doctor_id| async move {
                    let result = self.fetch_availability(&clinic_doctor_id, window).await;
                    (clinic_doctor_id, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        for (clinic_doctor_id, result) in availability {
            match result {
                Ok(raw) => {
                    let slots = normalize_all(&raw, "availability slot", |record| {
                        normalize::normalize_availability_slot(&clinic_doctor_id, record)
                    });
                    bundle.availability.insert(clinic_doctor_id, slots);
                }
                Err(e) => {
                    bundle.record_failure(Some(clinic_doctor_id), SubResource::Availability, e)
                }
            }
        }

        bundle
    }

    async fn fetch_availability(
        &self,
        clinic_doctor_id: &str,
        window: DateWindow,
    ) -> Result<Vec<Value>, GatewayError> {
        let variables = json!({
            "clinicDoctorId": clinic_doctor_id,
            "dateFrom": window.from.to_rfc3339(),
            "dateTo": window.to.to_rfc3339(),
        });
        self.fetch_elems(
            queries::SEARCH_DOCTOR_AVAILABILITY,
            variables,
            "searchClinicDoctorAvailability",
        )
        .await
    }
}

struct ClinicBundle {
    clinic_id: String,
    offices: Vec<Office>,
    clinic_doctors: Vec<ClinicDoctor>,
    appointments: Vec<Appointment>,
    availability: HashMap<String, Vec<AvailabilitySlot>>,
    failures: Vec<PartialFailure>,
}

impl ClinicBundle {
    fn new(clinic_id: String) -> Self {
        Self {
            clinic_id,
            offices: Vec::new(),
            clinic_doctors: Vec::new(),
            appointments: Vec::new(),
            availability: HashMap::new(),
            failures: Vec::new(),
        }
    }

    fn record_failure(
        &mut self,
        clinic_doctor_id: Option<String>,
        resource: SubResource,
        error: GatewayError,
    ) {
        warn!(
            "Failed to fetch {} for clinic {}: {}",
            resource, self.clinic_id, error
        );
        self.failures.push(PartialFailure {
            clinic_id: self.clinic_id.clone(),
            clinic_doctor_id,
            resource,
            detail: error.to_string(),
        });
    }
}

/// Normalize a batch of raw records; a record that fails normalization is
/// logged and dropped, its siblings survive.
fn normalize_all<T>(
    raw: &[Value],
    entity: &str,
    normalize: impl Fn(&Value) -> Result<T, NormalizationError>,
) -> Vec<T> {
    raw.iter()
        .filter_map(|record| match normalize(record) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping {} record: {}", entity, e);
                None
            }
        })
        .collect()
}
