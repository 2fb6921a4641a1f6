//! Query and mutation texts for the clinic service.
//!
//! Every runtime value is a bound variable; scoped searches bind their
//! condition operands through `@strExpr`.

pub const SEARCH_DOCTOR_TYPES: &str = r#"
query {
  searchDoctorType(cond: "it.isDel == false") {
    elems {
      id
      name
      description
    }
  }
}
"#;

pub const SEARCH_DOCTORS: &str = r#"
query {
  searchDoctor {
    elems {
      id
      doctorType {
        id
        name
      }
      person {
        entityId
        entity {
          firstName
          lastName
        }
      }
    }
  }
}
"#;

pub const SEARCH_CUSTOMERS: &str = r#"
query {
  searchCustomer(cond: "1==1") {
    elems {
      id
      insurancePolicyNumber
      phoneNumber
      person {
        entityId
        entity {
          firstName
          lastName
        }
      }
    }
  }
}
"#;

pub const SEARCH_CLINICS: &str = r#"
query {
  searchClinic {
    elems {
      id
      name
    }
  }
}
"#;

pub const SEARCH_CLINIC_OFFICES: &str = r#"
query searchClinicOffice($clinicId: String!) {
  searchClinicOffice(
    cond: "it.clinic.id == ${clinicId}"
  ) @strExpr(string: $clinicId) {
    elems {
      id
      clinic {
        id
        name
      }
      officeNumber
    }
  }
}
"#;

pub const SEARCH_CLINIC_DOCTORS: &str = r#"
query searchClinicDoctor($clinicId: String!) {
  searchClinicDoctor(
    cond: "it.clinic.id == ${clinicId}"
  ) @strExpr(string: $clinicId) {
    elems {
      id
      doctor {
        entity {
          person {
            entity {
              firstName
              lastName
            }
          }
          doctorType {
            name
          }
        }
      }
    }
  }
}
"#;

pub const SEARCH_DOCTOR_AVAILABILITY: &str = r#"
query searchClinicDoctorAvailability($clinicDoctorId: String!, $dateFrom: _DateTime!, $dateTo: _DateTime!) {
  searchClinicDoctorAvailability(
    cond: "it.clinicDoctor.id == ${clinicDoctorId} && it.endDate >= ${dateFrom} && it.beginDate <= ${dateTo}"
  ) @strExpr(string: $clinicDoctorId, dateTimes: [$dateFrom, $dateTo]) {
    elems {
      id
      beginDate
      endDate
      clinicOffice {
        id
        officeNumber
      }
    }
  }
}
"#;

pub const SEARCH_CLINIC_APPOINTMENTS: &str = r#"
query searchClinicTable($clinicId: String!) {
  searchClinicTable(
    cond: "it.clinic.id == ${clinicId}"
  ) @strExpr(string: $clinicId) {
    elems {
      id
      beginDate
      endDate
      clinicOffice {
        id
      }
      customer {
        entityId
      }
      clinicDoctor {
        id
      }
    }
  }
}
"#;

pub const CREATE_APPOINTMENT: &str = r#"
mutation createClinicTable(
  $clinicId: ID!,
  $clinicDoctorId: ID!,
  $beginDate: _DateTime!,
  $endDate: _DateTime!,
  $clinicOfficeId: ID!,
  $customerId: String!
) {
  packet {
    createClinicTable(input: {
      clinic: $clinicId,
      clinicDoctor: $clinicDoctorId,
      clinicOffice: $clinicOfficeId,
      customer: { entityId: $customerId },
      beginDate: $beginDate,
      endDate: $endDate
    }) {
      id
    }
  }
}
"#;
