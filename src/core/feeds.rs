use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A member currently responding to a call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterEntry {
    pub member_name: String,
    pub category: String,
    pub station: String,
    pub calling_time: String,
    pub eta: String,
    pub caller_number: String,
    pub called_number: String,
    pub user_input: String,
}

/// A member on the duty schedule
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub member_name: String,
    pub category: String,
    pub in_station_or_home: String,
    pub station: String,
    pub until_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchMessage {
    pub id: i64,
    pub body: String,
    pub destination_email: String,
    pub subject: String,
    pub verified_status: String,
    pub arrived_on: String,

    /// Street address recovered from the body's `" * "`-delimited segments,
    /// empty when the body has no delimiter.
    pub address: String,
}

/// One incident as reported by the incidents dashboard service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all(deserialize = "PascalCase"))]
pub struct IncidentInfo {
    #[serde(rename(deserialize = "__type"))]
    pub type_name: String,
    pub id: i64,
    pub arrived_on: String,
    pub subscriber_id: i64,
    pub body: String,
    pub subject: String,
    pub message_subject: String,
    pub address: String,
    pub override_bounds: bool,
    pub verified_address_status: i64,
    pub verified_address_id: i64,
    pub verified_address_added_by: String,
    pub updated_on: String,
    pub updated_on_to_show: String,
    #[serde(rename(deserialize = "longDirection"))]
    pub long_direction: String,
}

/// A calendar reminder for the agency
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReminderEvent {
    pub id: i64,
    pub subject: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub recurrence_id: i64,
    pub subscriber_id: i64,
}

/// Personnel and apparatus status for one agency, as shown on the
/// dispatcher screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all(deserialize = "PascalCase"))]
pub struct DispatcherStatus {
    pub agency_id: i64,
    #[serde(rename(deserialize = "OnDuties"))]
    pub on_duty: Vec<PersonnelStatus>,
    #[serde(rename(deserialize = "NowRespondings"))]
    pub now_responding: Vec<RespondingMember>,
    #[serde(rename(deserialize = "OutOfServiceApparatuses"))]
    pub out_of_service_apparatus: Vec<Map<String, Value>>,
    #[serde(rename(deserialize = "InServiceApparatuses"))]
    pub in_service_apparatus: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all(deserialize = "PascalCase"))]
pub struct PersonnelStatus {
    pub name: String,
    pub id: i64,
    pub position: String,
    pub on_duty_for: String,
    pub station_form: String,
    pub until_at: String,
    pub until_at_string: String,
    pub subscriber_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all(deserialize = "PascalCase"))]
pub struct RespondingMember {
    pub calling_time: String,
    pub id: i64,
    pub name: String,
    pub position: String,
    pub responding_to: String,
    #[serde(rename(deserialize = "ETA"))]
    pub eta: String,
    pub caller_number: String,
    pub called_number: String,
    pub user_input: String,
    pub calling_time_string: String,
    #[serde(rename(deserialize = "ETAString"))]
    pub eta_string: String,
}
