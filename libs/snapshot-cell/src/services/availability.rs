// libs/snapshot-cell/src/services/availability.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{AvailabilitySlot, Snapshot};

/// A maximal bookable interval for one clinic doctor in one office, produced
/// by coalescing overlapping and adjacent availability slots.
#[derive(Debug, Clone, PartialEq)]
pub struct CoalescedSlot {
    pub office_id: String,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Per-snapshot index over availability and existing appointments, built
/// once per snapshot and queried by the booking validator.
///
/// All interval arithmetic is half-open: [a,b) and [b,c) are adjacent, not
/// overlapping.
pub struct AvailabilityIndex {
    /// clinic_doctor_id -> coalesced free intervals, sorted by begin
    free: HashMap<String, Vec<CoalescedSlot>>,
    /// clinic_doctor_id -> appointment intervals in any office, sorted by begin
    busy: HashMap<String, Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl AvailabilityIndex {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut free = HashMap::new();
        for (clinic_doctor_id, slots) in &snapshot.availability {
            free.insert(clinic_doctor_id.clone(), coalesce(slots));
        }

        let mut busy: HashMap<String, Vec<(DateTime<Utc>, DateTime<Utc>)>> = HashMap::new();
        for appointment in snapshot.appointments.values().flatten() {
            busy.entry(appointment.clinic_doctor_id.clone())
                .or_default()
                .push((appointment.begin, appointment.end));
        }
        for intervals in busy.values_mut() {
            intervals.sort_by_key(|&(begin, _)| begin);
        }

        debug!(
            "Availability index built for {} clinic doctors ({} with appointments)",
            free.len(),
            busy.len()
        );

        Self { free, busy }
    }

    /// Coalesced availability for one clinic doctor, sorted ascending by
    /// begin. Unknown doctors have no slots.
    pub fn slots_for(&self, clinic_doctor_id: &str) -> &[CoalescedSlot] {
        self.free
            .get(clinic_doctor_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True iff [begin,end) lies inside one coalesced interval for that
    /// office and intersects no appointment of the doctor in any office.
    /// Missing availability data is never treated as open.
    pub fn is_free(
        &self,
        clinic_doctor_id: &str,
        office_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> bool {
        if begin >= end {
            return false;
        }

        let contained = self.slots_for(clinic_doctor_id).iter().any(|slot| {
            slot.office_id == office_id && slot.begin <= begin && end <= slot.end
        });
        if !contained {
            return false;
        }

        // A doctor cannot be double-booked across offices in the same clinic.
        !self.busy.get(clinic_doctor_id).map_or(false, |appointments| {
            appointments
                .iter()
                .any(|&(busy_begin, busy_end)| busy_begin < end && begin < busy_end)
        })
    }
}

/// Merge one doctor's slots into maximal per-office intervals. Overlapping
/// and back-to-back slots for the same office become one interval.
fn coalesce(slots: &[AvailabilitySlot]) -> Vec<CoalescedSlot> {
    let mut by_office: HashMap<&str, Vec<&AvailabilitySlot>> = HashMap::new();
    for slot in slots {
        by_office.entry(slot.office_id.as_str()).or_default().push(slot);
    }

    let mut merged = Vec::new();
    for (office_id, mut office_slots) in by_office {
        office_slots.sort_by_key(|slot| slot.begin);

        let mut runs = office_slots.into_iter();
        let Some(first) = runs.next() else { continue };
        let mut current = CoalescedSlot {
            office_id: office_id.to_string(),
            begin: first.begin,
            end: first.end,
        };

        for slot in runs {
            if slot.begin <= current.end {
                current.end = current.end.max(slot.end);
            } else {
                merged.push(current);
                current = CoalescedSlot {
                    office_id: office_id.to_string(),
                    begin: slot.begin,
                    end: slot.end,
                };
            }
        }
        merged.push(current);
    }

    merged.sort_by_key(|slot| slot.begin);
    merged
}
