// libs/snapshot-cell/src/services/normalize.rs
//
// Pure transforms from the gateway's loosely-typed responses into the typed
// entity records. Identifier, temporal-bound, and relationship-key fields
// must be present and well-formed; optional descriptive fields fall back to
// the explicit `unknown` sentinel. Nothing past this boundary handles an
// untyped mapping.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::models::{
    Appointment, AvailabilitySlot, Clinic, ClinicDoctor, Customer, Doctor, DoctorProfile,
    DoctorType, DoctorTypeRef, NormalizationError, Office, PersonName, UNKNOWN,
};

type Result<T> = std::result::Result<T, NormalizationError>;

fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(raw, |value, key| value.get(key))
}

fn required_str(raw: &Value, path: &str) -> Result<String> {
    lookup(raw, path)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| NormalizationError::missing(path))
}

/// Absent or empty optional fields become the sentinel, never an empty
/// string that could collide with a real value.
fn optional_str(raw: &Value, path: &str) -> String {
    lookup(raw, path)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// The service emits RFC 3339 as well as bare `YYYY-MM-DDTHH:MM:SS`
/// timestamps; the bare form is taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn required_datetime(raw: &Value, path: &str) -> Result<DateTime<Utc>> {
    let text = required_str(raw, path)?;
    parse_timestamp(&text)
        .ok_or_else(|| NormalizationError::new(path, format!("unparsable timestamp `{text}`")))
}

fn required_window(raw: &Value) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let begin = required_datetime(raw, "beginDate")?;
    let end = required_datetime(raw, "endDate")?;
    if begin >= end {
        return Err(NormalizationError::new(
            "endDate",
            format!("must be after beginDate ({begin} >= {end})"),
        ));
    }
    Ok((begin, end))
}

fn person_name(raw: &Value, base: &str) -> PersonName {
    PersonName {
        first: optional_str(raw, &format!("{base}.firstName")),
        last: optional_str(raw, &format!("{base}.lastName")),
    }
}

pub fn normalize_clinic(raw: &Value) -> Result<Clinic> {
    Ok(Clinic {
        id: required_str(raw, "id")?,
        name: optional_str(raw, "name"),
    })
}

pub fn normalize_doctor_type(raw: &Value) -> Result<DoctorType> {
    Ok(DoctorType {
        id: required_str(raw, "id")?,
        name: optional_str(raw, "name"),
        description: optional_str(raw, "description"),
    })
}

pub fn normalize_doctor(raw: &Value) -> Result<Doctor> {
    Ok(Doctor {
        id: required_str(raw, "id")?,
        person_name: person_name(raw, "person.entity"),
        doctor_type: DoctorTypeRef {
            id: required_str(raw, "doctorType.id")?,
            name: optional_str(raw, "doctorType.name"),
        },
    })
}

pub fn normalize_customer(raw: &Value) -> Result<Customer> {
    Ok(Customer {
        id: required_str(raw, "id")?,
        person_name: person_name(raw, "person.entity"),
        // The human-facing lookup key; a sentinel here could shadow a real
        // policy number.
        insurance_policy_number: required_str(raw, "insurancePolicyNumber")?,
        phone_number: optional_str(raw, "phoneNumber"),
    })
}

pub fn normalize_office(raw: &Value) -> Result<Office> {
    Ok(Office {
        id: required_str(raw, "id")?,
        clinic_id: required_str(raw, "clinic.id")?,
        office_number: required_str(raw, "officeNumber")?,
    })
}

/// The affiliation record is fetched scoped to a clinic; the remote omits
/// the clinic id from the nested shape, so the scope is passed in.
pub fn normalize_clinic_doctor(clinic_id: &str, raw: &Value) -> Result<ClinicDoctor> {
    Ok(ClinicDoctor {
        id: required_str(raw, "id")?,
        clinic_id: clinic_id.to_string(),
        doctor: DoctorProfile {
            person_name: person_name(raw, "doctor.entity.person.entity"),
            specialty: optional_str(raw, "doctor.entity.doctorType.name"),
        },
    })
}

pub fn normalize_availability_slot(clinic_doctor_id: &str, raw: &Value) -> Result<AvailabilitySlot> {
    let (begin, end) = required_window(raw)?;
    Ok(AvailabilitySlot {
        id: required_str(raw, "id")?,
        clinic_doctor_id: clinic_doctor_id.to_string(),
        office_id: required_str(raw, "clinicOffice.id")?,
        begin,
        end,
    })
}

pub fn normalize_appointment(clinic_id: &str, raw: &Value) -> Result<Appointment> {
    let (begin, end) = required_window(raw)?;
    Ok(Appointment {
        id: required_str(raw, "id")?,
        clinic_id: clinic_id.to_string(),
        clinic_doctor_id: required_str(raw, "clinicDoctor.id")?,
        office_id: required_str(raw, "clinicOffice.id")?,
        customer_id: required_str(raw, "customer.entityId")?,
        begin,
        end,
    })
}
