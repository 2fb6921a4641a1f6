// libs/snapshot-cell/src/services/consistency.rs
//
// Cross-entity invariant sweep run once after aggregation completes.
// Violations are reported, never repaired: the data stays in the snapshot so
// read paths keep working, while booking refuses the entities involved.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::models::{Inconsistency, Snapshot};
use crate::services::availability::AvailabilityIndex;

pub fn verify(snapshot: &Snapshot) -> Vec<Inconsistency> {
    let mut found = Vec::new();

    check_references(snapshot, &mut found);
    check_unique_policy_numbers(snapshot, &mut found);
    check_unique_office_numbers(snapshot, &mut found);
    check_appointment_calendars(snapshot, &mut found);

    for inconsistency in &found {
        warn!("Snapshot inconsistency: {}", inconsistency);
    }

    found
}

fn check_references(snapshot: &Snapshot, found: &mut Vec<Inconsistency>) {
    let clinic_ids: HashSet<&str> = snapshot.clinics.iter().map(|c| c.id.as_str()).collect();
    let customer_ids: HashSet<&str> = snapshot.customers.iter().map(|c| c.id.as_str()).collect();

    // clinic_doctor_id -> owning clinic_id
    let doctor_clinics: HashMap<&str, &str> = snapshot
        .clinic_doctors
        .values()
        .flatten()
        .map(|d| (d.id.as_str(), d.clinic_id.as_str()))
        .collect();

    for office in snapshot.offices.values().flatten() {
        if !clinic_ids.contains(office.clinic_id.as_str()) {
            found.push(Inconsistency::OrphanOffice {
                office_id: office.id.clone(),
                clinic_id: office.clinic_id.clone(),
            });
        }
    }

    for clinic_doctor in snapshot.clinic_doctors.values().flatten() {
        if !clinic_ids.contains(clinic_doctor.clinic_id.as_str()) {
            found.push(Inconsistency::OrphanClinicDoctor {
                clinic_doctor_id: clinic_doctor.id.clone(),
                clinic_id: clinic_doctor.clinic_id.clone(),
            });
        }
    }

    for slot in snapshot.availability.values().flatten() {
        if !doctor_clinics.contains_key(slot.clinic_doctor_id.as_str()) {
            found.push(Inconsistency::OrphanAvailability {
                slot_id: slot.id.clone(),
                clinic_doctor_id: slot.clinic_doctor_id.clone(),
            });
        }
    }

    for appointment in snapshot.appointments.values().flatten() {
        if !clinic_ids.contains(appointment.clinic_id.as_str()) {
            found.push(orphan_ref(appointment, "clinic", &appointment.clinic_id));
        }
        // The doctor must be affiliated with the appointment's own clinic.
        match doctor_clinics.get(appointment.clinic_doctor_id.as_str()) {
            Some(clinic_id) if *clinic_id == appointment.clinic_id => {}
            _ => found.push(orphan_ref(
                appointment,
                "clinic_doctor",
                &appointment.clinic_doctor_id,
            )),
        }
        if snapshot
            .office(&appointment.clinic_id, &appointment.office_id)
            .is_none()
        {
            found.push(orphan_ref(appointment, "office", &appointment.office_id));
        }
        if !customer_ids.contains(appointment.customer_id.as_str()) {
            found.push(orphan_ref(appointment, "customer", &appointment.customer_id));
        }
    }
}

fn orphan_ref(
    appointment: &crate::models::Appointment,
    field: &str,
    value: &str,
) -> Inconsistency {
    Inconsistency::OrphanAppointmentRef {
        appointment_id: appointment.id.clone(),
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn check_unique_policy_numbers(snapshot: &Snapshot, found: &mut Vec<Inconsistency>) {
    let mut by_policy: HashMap<&str, Vec<&str>> = HashMap::new();
    for customer in &snapshot.customers {
        by_policy
            .entry(customer.insurance_policy_number.as_str())
            .or_default()
            .push(customer.id.as_str());
    }

    for (policy_number, customers) in by_policy {
        if customers.len() > 1 {
            let mut customer_ids: Vec<String> =
                customers.into_iter().map(str::to_string).collect();
            customer_ids.sort();
            found.push(Inconsistency::DuplicatePolicyNumber {
                policy_number: policy_number.to_string(),
                customer_ids,
            });
        }
    }
}

fn check_unique_office_numbers(snapshot: &Snapshot, found: &mut Vec<Inconsistency>) {
    for (clinic_id, offices) in &snapshot.offices {
        let mut by_number: HashMap<&str, Vec<&str>> = HashMap::new();
        for office in offices {
            by_number
                .entry(office.office_number.as_str())
                .or_default()
                .push(office.id.as_str());
        }

        for (office_number, ids) in by_number {
            if ids.len() > 1 {
                let mut office_ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
                office_ids.sort();
                found.push(Inconsistency::DuplicateOfficeNumber {
                    clinic_id: clinic_id.clone(),
                    office_number: office_number.to_string(),
                    office_ids,
                });
            }
        }
    }
}

fn check_appointment_calendars(snapshot: &Snapshot, found: &mut Vec<Inconsistency>) {
    let index = AvailabilityIndex::build(snapshot);

    let mut by_doctor: HashMap<&str, Vec<&crate::models::Appointment>> = HashMap::new();
    for appointment in snapshot.appointments.values().flatten() {
        by_doctor
            .entry(appointment.clinic_doctor_id.as_str())
            .or_default()
            .push(appointment);
    }

    for (clinic_doctor_id, mut appointments) in by_doctor {
        appointments.sort_by_key(|a| a.begin);

        // Sorted sweep: an appointment overlaps iff it starts before the
        // latest end seen so far.
        let mut latest: Option<&crate::models::Appointment> = None;
        for &appointment in &appointments {
            if let Some(previous) = latest {
                if appointment.begin < previous.end {
                    found.push(Inconsistency::OverlappingAppointments {
                        clinic_doctor_id: clinic_doctor_id.to_string(),
                        first_id: previous.id.clone(),
                        second_id: appointment.id.clone(),
                    });
                }
            }
            if latest.map_or(true, |previous| appointment.end > previous.end) {
                latest = Some(appointment);
            }
        }

        // Appointments must sit inside the doctor's availability for the
        // office, but only when availability was fetched for the doctor and
        // the appointment falls inside the fetched window; anything outside
        // the window is simply unknown.
        let slots = index.slots_for(clinic_doctor_id);
        if slots.is_empty() {
            continue;
        }
        for appointment in appointments {
            if !snapshot.window.contains(appointment.begin, appointment.end) {
                continue;
            }
            let covered = slots.iter().any(|slot| {
                slot.office_id == appointment.office_id
                    && slot.begin <= appointment.begin
                    && appointment.end <= slot.end
            });
            if !covered {
                found.push(Inconsistency::AppointmentOutsideAvailability {
                    appointment_id: appointment.id.clone(),
                    clinic_doctor_id: clinic_doctor_id.to_string(),
                });
            }
        }
    }
}
