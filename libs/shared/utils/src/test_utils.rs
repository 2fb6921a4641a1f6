//! Shared test support: a scriptable gateway and canned raw records shaped
//! like the remote service's responses.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use shared_gateway::{queries, GatewayError, QueryGateway};

/// Failure to inject from a scripted rule. `GatewayError` is not `Clone`,
/// so rules keep a description and mint the error per call.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    Timeout,
    Http { status: u16, body: String },
    Malformed(String),
}

impl ScriptedFailure {
    fn to_error(&self) -> GatewayError {
        match self {
            ScriptedFailure::Timeout => GatewayError::Timeout,
            ScriptedFailure::Http { status, body } => GatewayError::Http {
                status: *status,
                body: body.clone(),
            },
            ScriptedFailure::Malformed(detail) => GatewayError::Malformed(detail.clone()),
        }
    }
}

struct Rule {
    query: String,
    variables_subset: Option<Value>,
    response: Result<Value, ScriptedFailure>,
}

/// A gateway scripted entirely in the test: responses are matched on query
/// text plus an optional subset of variables, and every executed call is
/// logged. Later rules win over earlier ones, so a broad rule can be
/// overridden by a more specific one registered afterwards.
#[derive(Default)]
pub struct RecordingGateway {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to every execution of `query` with `data` (the `data` field
    /// of a GraphQL response).
    pub fn respond(&self, query: &str, data: Value) {
        self.push_rule(query, None, Ok(data));
    }

    /// Like `respond`, but only when the executed variables contain
    /// `variables` as a subset.
    pub fn respond_where(&self, query: &str, variables: Value, data: Value) {
        self.push_rule(query, Some(variables), Ok(data));
    }

    pub fn fail(&self, query: &str, failure: ScriptedFailure) {
        self.push_rule(query, None, Err(failure));
    }

    pub fn fail_where(&self, query: &str, variables: Value, failure: ScriptedFailure) {
        self.push_rule(query, Some(variables), Err(failure));
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn executions_of(&self, query: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(executed, _)| executed == query)
            .count()
    }

    /// How many create-appointment mutations the gateway received.
    pub fn mutation_count(&self) -> usize {
        self.executions_of(queries::CREATE_APPOINTMENT)
    }

    fn push_rule(
        &self,
        query: &str,
        variables_subset: Option<Value>,
        response: Result<Value, ScriptedFailure>,
    ) {
        self.rules.lock().unwrap().push(Rule {
            query: query.to_string(),
            variables_subset,
            response,
        });
    }
}

#[async_trait]
impl QueryGateway for RecordingGateway {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), variables.clone()));

        let rules = self.rules.lock().unwrap();
        for rule in rules.iter().rev() {
            if rule.query != query {
                continue;
            }
            if let Some(subset) = &rule.variables_subset {
                if !subset_matches(subset, &variables) {
                    continue;
                }
            }
            return match &rule.response {
                Ok(data) => Ok(data.clone()),
                Err(failure) => Err(failure.to_error()),
            };
        }

        Err(GatewayError::Malformed(format!(
            "no scripted response for query starting `{}`",
            query.trim().lines().next().unwrap_or_default()
        )))
    }
}

fn subset_matches(subset: &Value, variables: &Value) -> bool {
    match subset.as_object() {
        Some(fields) => fields
            .iter()
            .all(|(key, expected)| variables.get(key) == Some(expected)),
        None => subset == variables,
    }
}

/// Canned raw records in the nesting the remote service returns.
pub struct MockGatewayResponses;

impl MockGatewayResponses {
    pub fn search_result(root: &str, elems: Vec<Value>) -> Value {
        json!({ root: { "elems": elems } })
    }

    pub fn clinic(id: &str, name: &str) -> Value {
        json!({ "id": id, "name": name })
    }

    pub fn doctor_type(id: &str, name: &str, description: &str) -> Value {
        json!({ "id": id, "name": name, "description": description })
    }

    pub fn doctor(id: &str, first: &str, last: &str, type_id: &str, type_name: &str) -> Value {
        json!({
            "id": id,
            "doctorType": { "id": type_id, "name": type_name },
            "person": {
                "entityId": format!("{id}-person"),
                "entity": { "firstName": first, "lastName": last }
            }
        })
    }

    pub fn customer(id: &str, first: &str, last: &str, policy: &str, phone: &str) -> Value {
        json!({
            "id": id,
            "insurancePolicyNumber": policy,
            "phoneNumber": phone,
            "person": {
                "entityId": format!("{id}-person"),
                "entity": { "firstName": first, "lastName": last }
            }
        })
    }

    pub fn office(id: &str, clinic_id: &str, office_number: &str) -> Value {
        json!({
            "id": id,
            "clinic": { "id": clinic_id, "name": "Clinic" },
            "officeNumber": office_number
        })
    }

    pub fn clinic_doctor(id: &str, first: &str, last: &str, specialty: &str) -> Value {
        json!({
            "id": id,
            "doctor": {
                "entity": {
                    "person": { "entity": { "firstName": first, "lastName": last } },
                    "doctorType": { "name": specialty }
                }
            }
        })
    }

    pub fn availability_slot(id: &str, office_id: &str, begin: &str, end: &str) -> Value {
        json!({
            "id": id,
            "beginDate": begin,
            "endDate": end,
            "clinicOffice": { "id": office_id, "officeNumber": "101" }
        })
    }

    pub fn appointment(
        id: &str,
        clinic_doctor_id: &str,
        office_id: &str,
        customer_id: &str,
        begin: &str,
        end: &str,
    ) -> Value {
        json!({
            "id": id,
            "beginDate": begin,
            "endDate": end,
            "clinicOffice": { "id": office_id },
            "customer": { "entityId": customer_id },
            "clinicDoctor": { "id": clinic_doctor_id }
        })
    }

    pub fn created_appointment(id: &str) -> Value {
        json!({ "packet": { "createClinicTable": { "id": id } } })
    }
}
