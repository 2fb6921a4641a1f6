use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use snapshot_cell::models::{Appointment, AvailabilitySlot, DateWindow, Snapshot};
use snapshot_cell::services::availability::AvailabilityIndex;

fn t(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, hour, minute, 0).unwrap()
}

fn empty_snapshot() -> Snapshot {
    Snapshot {
        fetched_at: t(0, 0),
        window: DateWindow::new(t(0, 0), Utc.with_ymd_and_hms(2030, 6, 8, 0, 0, 0).unwrap()),
        clinics: Vec::new(),
        doctor_types: Vec::new(),
        doctors: Vec::new(),
        customers: Vec::new(),
        offices: HashMap::new(),
        clinic_doctors: HashMap::new(),
        availability: HashMap::new(),
        appointments: HashMap::new(),
        partial_failures: Vec::new(),
        inconsistencies: Vec::new(),
    }
}

fn slot(id: &str, office_id: &str, begin: DateTime<Utc>, end: DateTime<Utc>) -> AvailabilitySlot {
    AvailabilitySlot {
        id: id.to_string(),
        clinic_doctor_id: "d1".to_string(),
        office_id: office_id.to_string(),
        begin,
        end,
    }
}

fn appointment(id: &str, office_id: &str, begin: DateTime<Utc>, end: DateTime<Utc>) -> Appointment {
    Appointment {
        id: id.to_string(),
        clinic_id: "c1".to_string(),
        clinic_doctor_id: "d1".to_string(),
        office_id: office_id.to_string(),
        customer_id: "cust1".to_string(),
        begin,
        end,
    }
}

#[test]
fn overlapping_and_adjacent_slots_coalesce_per_office() {
    let mut snapshot = empty_snapshot();
    snapshot.availability.insert(
        "d1".to_string(),
        vec![
            slot("s1", "o1", t(9, 0), t(10, 0)),
            slot("s2", "o1", t(10, 0), t(11, 0)),
            slot("s3", "o1", t(10, 30), t(12, 0)),
        ],
    );

    let index = AvailabilityIndex::build(&snapshot);
    let slots = index.slots_for("d1");

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].begin, t(9, 0));
    assert_eq!(slots[0].end, t(12, 0));
}

#[test]
fn slots_in_different_offices_stay_separate() {
    let mut snapshot = empty_snapshot();
    snapshot.availability.insert(
        "d1".to_string(),
        vec![
            slot("s2", "o2", t(10, 0), t(11, 0)),
            slot("s1", "o1", t(9, 0), t(10, 0)),
        ],
    );

    let index = AvailabilityIndex::build(&snapshot);
    let slots = index.slots_for("d1");

    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].office_id, "o1");
    assert_eq!(slots[1].office_id, "o2");
}

#[test]
fn slots_for_is_sorted_and_pairwise_disjoint() {
    let mut snapshot = empty_snapshot();
    snapshot.availability.insert(
        "d1".to_string(),
        vec![
            slot("s3", "o1", t(15, 0), t(16, 0)),
            slot("s1", "o1", t(9, 0), t(10, 30)),
            slot("s2", "o1", t(9, 30), t(11, 0)),
            slot("s4", "o1", t(12, 0), t(13, 0)),
        ],
    );

    let index = AvailabilityIndex::build(&snapshot);
    let slots = index.slots_for("d1");

    for pair in slots.windows(2) {
        assert!(pair[0].begin < pair[1].begin);
        assert!(pair[0].end <= pair[1].begin);
    }
}

#[test]
fn is_free_requires_containment_in_one_interval() {
    let mut snapshot = empty_snapshot();
    snapshot.availability.insert(
        "d1".to_string(),
        vec![
            slot("s1", "o1", t(9, 0), t(10, 0)),
            slot("s2", "o1", t(11, 0), t(12, 0)),
        ],
    );

    let index = AvailabilityIndex::build(&snapshot);

    assert!(index.is_free("d1", "o1", t(9, 15), t(9, 45)));
    // Spans the gap between two intervals.
    assert!(!index.is_free("d1", "o1", t(9, 30), t(11, 30)));
    // Entirely outside availability.
    assert!(!index.is_free("d1", "o1", t(14, 0), t(15, 0)));
    // Right office hours, wrong office.
    assert!(!index.is_free("d1", "o2", t(9, 15), t(9, 45)));
}

#[test]
fn adjacent_appointment_does_not_block() {
    let mut snapshot = empty_snapshot();
    snapshot
        .availability
        .insert("d1".to_string(), vec![slot("s1", "o1", t(9, 0), t(12, 0))]);
    snapshot.appointments.insert(
        "c1".to_string(),
        vec![appointment("a1", "o1", t(10, 0), t(11, 0))],
    );

    let index = AvailabilityIndex::build(&snapshot);

    // [9:30,10:00) touches [10:00,11:00) but does not overlap it.
    assert!(index.is_free("d1", "o1", t(9, 30), t(10, 0)));
    assert!(!index.is_free("d1", "o1", t(9, 30), t(10, 1)));
}

#[test]
fn appointment_in_another_office_still_blocks() {
    let mut snapshot = empty_snapshot();
    snapshot.availability.insert(
        "d1".to_string(),
        vec![
            slot("s1", "o1", t(9, 0), t(12, 0)),
            slot("s2", "o2", t(9, 0), t(12, 0)),
        ],
    );
    snapshot.appointments.insert(
        "c1".to_string(),
        vec![appointment("a1", "o2", t(9, 30), t(10, 0))],
    );

    let index = AvailabilityIndex::build(&snapshot);

    assert!(!index.is_free("d1", "o1", t(9, 45), t(10, 15)));
}

#[test]
fn unknown_availability_is_never_open() {
    let mut snapshot = empty_snapshot();
    // d2 has an explicit empty slot list; d3 was never fetched at all.
    snapshot.availability.insert("d2".to_string(), Vec::new());

    let index = AvailabilityIndex::build(&snapshot);

    assert!(!index.is_free("d2", "o1", t(9, 0), t(10, 0)));
    assert!(!index.is_free("d3", "o1", t(9, 0), t(10, 0)));
    assert!(index.slots_for("d3").is_empty());
}

#[test]
fn inverted_request_window_is_not_free() {
    let mut snapshot = empty_snapshot();
    snapshot
        .availability
        .insert("d1".to_string(), vec![slot("s1", "o1", t(9, 0), t(12, 0))]);

    let index = AvailabilityIndex::build(&snapshot);

    assert!(!index.is_free("d1", "o1", t(10, 0), t(9, 0)));
}
