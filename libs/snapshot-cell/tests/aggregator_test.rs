use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;

use shared_gateway::queries;
use shared_utils::test_utils::{MockGatewayResponses as Raw, RecordingGateway, ScriptedFailure};
use snapshot_cell::models::{
    AggregationError, DateWindow, Inconsistency, Snapshot, SubResource,
};
use snapshot_cell::services::aggregator::SnapshotAggregator;

/// One clinic with an office, an affiliated doctor, one availability slot
/// and one existing appointment.
fn script_world(gateway: &RecordingGateway) {
    gateway.respond(
        queries::SEARCH_DOCTOR_TYPES,
        Raw::search_result(
            "searchDoctorType",
            vec![Raw::doctor_type("t1", "Therapist", "General medicine")],
        ),
    );
    gateway.respond(
        queries::SEARCH_DOCTORS,
        Raw::search_result(
            "searchDoctor",
            vec![Raw::doctor("doc1", "Anna", "Ivanova", "t1", "Therapist")],
        ),
    );
    gateway.respond(
        queries::SEARCH_CUSTOMERS,
        Raw::search_result(
            "searchCustomer",
            vec![Raw::customer(
                "cust1",
                "Pyotr",
                "Petrov",
                "POL-1",
                "+7-900-000-00-01",
            )],
        ),
    );
    gateway.respond(
        queries::SEARCH_CLINICS,
        Raw::search_result("searchClinic", vec![Raw::clinic("c1", "Clinic N1")]),
    );
    gateway.respond_where(
        queries::SEARCH_CLINIC_OFFICES,
        json!({ "clinicId": "c1" }),
        Raw::search_result("searchClinicOffice", vec![Raw::office("o1", "c1", "101")]),
    );
    gateway.respond_where(
        queries::SEARCH_CLINIC_DOCTORS,
        json!({ "clinicId": "c1" }),
        Raw::search_result(
            "searchClinicDoctor",
            vec![Raw::clinic_doctor("d1", "Anna", "Ivanova", "Therapist")],
        ),
    );
    gateway.respond_where(
        queries::SEARCH_CLINIC_APPOINTMENTS,
        json!({ "clinicId": "c1" }),
        Raw::search_result(
            "searchClinicTable",
            vec![Raw::appointment(
                "a1",
                "d1",
                "o1",
                "cust1",
                "2024-06-01T09:00:00",
                "2024-06-01T09:30:00",
            )],
        ),
    );
    gateway.respond_where(
        queries::SEARCH_DOCTOR_AVAILABILITY,
        json!({ "clinicDoctorId": "d1" }),
        Raw::search_result(
            "searchClinicDoctorAvailability",
            vec![Raw::availability_slot(
                "s1",
                "o1",
                "2024-06-01T09:00:00",
                "2024-06-01T12:00:00",
            )],
        ),
    );
}

async fn build(gateway: Arc<RecordingGateway>) -> Result<Snapshot, AggregationError> {
    SnapshotAggregator::new(gateway)
        .build_snapshot(DateWindow::starting_now(7))
        .await
}

#[tokio::test]
async fn full_snapshot_is_assembled() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);

    let snapshot = build(gateway).await.unwrap();

    assert_eq!(snapshot.clinics.len(), 1);
    assert_eq!(snapshot.doctor_types.len(), 1);
    assert_eq!(snapshot.doctors.len(), 1);
    assert_eq!(snapshot.customers.len(), 1);
    assert_eq!(snapshot.offices["c1"].len(), 1);
    assert_eq!(snapshot.clinic_doctors["c1"].len(), 1);
    assert_eq!(snapshot.availability["d1"].len(), 1);
    assert_eq!(snapshot.appointments["c1"].len(), 1);
    assert!(snapshot.partial_failures.is_empty());
    assert!(snapshot.inconsistencies.is_empty());
}

#[tokio::test]
async fn clinics_keep_gateway_order() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);
    gateway.respond(
        queries::SEARCH_CLINICS,
        Raw::search_result(
            "searchClinic",
            vec![Raw::clinic("c1", "Clinic N1"), Raw::clinic("c2", "Clinic N2")],
        ),
    );
    // The second clinic has nothing in it.
    gateway.respond_where(
        queries::SEARCH_CLINIC_OFFICES,
        json!({ "clinicId": "c2" }),
        Raw::search_result("searchClinicOffice", vec![]),
    );
    gateway.respond_where(
        queries::SEARCH_CLINIC_DOCTORS,
        json!({ "clinicId": "c2" }),
        Raw::search_result("searchClinicDoctor", vec![]),
    );
    gateway.respond_where(
        queries::SEARCH_CLINIC_APPOINTMENTS,
        json!({ "clinicId": "c2" }),
        Raw::search_result("searchClinicTable", vec![]),
    );

    let snapshot = build(gateway).await.unwrap();

    let ids: Vec<&str> = snapshot.clinics.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2"]);
}

#[tokio::test]
async fn timed_out_sub_resource_becomes_partial_failure() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);
    gateway.respond(
        queries::SEARCH_CLINICS,
        Raw::search_result(
            "searchClinic",
            vec![Raw::clinic("c1", "Clinic N1"), Raw::clinic("c2", "Clinic N2")],
        ),
    );
    gateway.fail_where(
        queries::SEARCH_CLINIC_OFFICES,
        json!({ "clinicId": "c2" }),
        ScriptedFailure::Timeout,
    );
    gateway.respond_where(
        queries::SEARCH_CLINIC_DOCTORS,
        json!({ "clinicId": "c2" }),
        Raw::search_result("searchClinicDoctor", vec![]),
    );
    gateway.respond_where(
        queries::SEARCH_CLINIC_APPOINTMENTS,
        json!({ "clinicId": "c2" }),
        Raw::search_result("searchClinicTable", vec![]),
    );

    let snapshot = build(gateway).await.unwrap();

    // The healthy clinic is untouched.
    assert_eq!(snapshot.offices["c1"].len(), 1);
    assert_eq!(snapshot.availability["d1"].len(), 1);
    // The failed one stays, with an empty office list and a recorded marker.
    assert!(snapshot.offices["c2"].is_empty());
    assert_eq!(snapshot.partial_failures.len(), 1);
    let failure = &snapshot.partial_failures[0];
    assert_eq!(failure.clinic_id, "c2");
    assert_eq!(failure.resource, SubResource::Offices);
    assert_eq!(failure.clinic_doctor_id, None);
}

#[tokio::test]
async fn availability_failure_is_recorded_per_doctor() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);
    gateway.fail_where(
        queries::SEARCH_DOCTOR_AVAILABILITY,
        json!({ "clinicDoctorId": "d1" }),
        ScriptedFailure::Http {
            status: 502,
            body: "bad gateway".to_string(),
        },
    );

    let snapshot = build(gateway).await.unwrap();

    assert!(!snapshot.availability.contains_key("d1"));
    assert_eq!(snapshot.partial_failures.len(), 1);
    let failure = &snapshot.partial_failures[0];
    assert_eq!(failure.resource, SubResource::Availability);
    assert_eq!(failure.clinic_doctor_id.as_deref(), Some("d1"));
}

#[tokio::test]
async fn top_level_failure_is_fatal() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);
    gateway.fail(
        queries::SEARCH_CLINICS,
        ScriptedFailure::Http {
            status: 500,
            body: "server error".to_string(),
        },
    );

    let error = build(gateway).await.unwrap_err();

    assert_matches!(error, AggregationError::Fatal { collection: "clinics", .. });
}

#[tokio::test]
async fn malformed_record_is_dropped_not_fatal() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);
    gateway.respond(
        queries::SEARCH_DOCTORS,
        Raw::search_result(
            "searchDoctor",
            vec![
                Raw::doctor("doc1", "Anna", "Ivanova", "t1", "Therapist"),
                json!({ "person": { "entity": { "firstName": "No", "lastName": "Id" } } }),
            ],
        ),
    );

    let snapshot = build(gateway).await.unwrap();

    assert_eq!(snapshot.doctors.len(), 1);
    assert_eq!(snapshot.doctors[0].id, "doc1");
}

#[tokio::test]
async fn duplicate_policy_numbers_are_flagged() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);
    gateway.respond(
        queries::SEARCH_CUSTOMERS,
        Raw::search_result(
            "searchCustomer",
            vec![
                Raw::customer("cust1", "Pyotr", "Petrov", "POL-1", "+7-900-000-00-01"),
                Raw::customer("cust2", "Ivan", "Sidorov", "POL-1", "+7-900-000-00-02"),
            ],
        ),
    );

    let snapshot = build(gateway).await.unwrap();

    assert_eq!(snapshot.customers.len(), 2);
    assert_matches!(
        &snapshot.inconsistencies[..],
        [Inconsistency::DuplicatePolicyNumber { policy_number, customer_ids }]
            if policy_number == "POL-1" && customer_ids == &vec!["cust1".to_string(), "cust2".to_string()]
    );
}

#[tokio::test]
async fn dangling_appointment_reference_is_flagged() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);
    gateway.respond_where(
        queries::SEARCH_CLINIC_APPOINTMENTS,
        json!({ "clinicId": "c1" }),
        Raw::search_result(
            "searchClinicTable",
            vec![Raw::appointment(
                "a1",
                "d1",
                "o1",
                "ghost",
                "2024-06-01T09:00:00",
                "2024-06-01T09:30:00",
            )],
        ),
    );

    let snapshot = build(gateway).await.unwrap();

    assert_matches!(
        &snapshot.inconsistencies[..],
        [Inconsistency::OrphanAppointmentRef { field, value, .. }]
            if field == "customer" && value == "ghost"
    );
}

#[tokio::test]
async fn snapshot_round_trips_through_a_file() {
    let gateway = Arc::new(RecordingGateway::new());
    script_world(&gateway);

    let snapshot = build(gateway).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let file = std::fs::File::create(&path).unwrap();
    serde_json::to_writer_pretty(file, &snapshot).unwrap();

    let restored: Snapshot =
        serde_json::from_reader(std::fs::File::open(&path).unwrap()).unwrap();

    assert_eq!(restored, snapshot);
}
