//! Turns raw feed payloads into typed records.
//!
//! The portal's services disagree on encoding: some return indented XML
//! datasets, some return JSON wrapped in `{"d": ...}`, and a few HTML-escape
//! that JSON. Each quirk is cleaned up before the structural decode; after
//! that point nothing here fails; missing or blank fields become empty values.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::feeds::{
    DispatchMessage, DispatcherStatus, IncidentInfo, ReminderEvent, RosterEntry, ScheduleEntry,
};
use crate::error::{PortalError, Result};

/// Indentation some XML responses embed between elements
const INDENT_ARTIFACT: &str = "\n    ";

/// Line-break markup left in dispatch message bodies
const BREAK_ARTIFACT: &str = "\n<br />";

const ADDRESS_DELIMITER: &str = " * ";

const PORTAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One element of an XML dataset, keyed by lower-cased child element name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, String>,
}

impl Row {
    /// Trimmed text of a child element, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    }

    /// Integer value of a child element, zero when absent or not a number.
    pub fn int(&self, name: &str) -> i64 {
        self.fields
            .get(name)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn time(&self, name: &str) -> Option<NaiveDateTime> {
        parse_portal_time(&self.text(name))
    }
}

/// Remove the `"\n    "` indentation that breaks decoding of some responses.
pub fn strip_indentation(body: &str) -> String {
    body.replace(INDENT_ARTIFACT, "")
}

/// Undo HTML entity encoding applied on top of a JSON payload.
///
/// Handles decimal and hex numeric references plus the common named
/// entities; `&amp;` is replaced last so it cannot create new entities.
pub fn unescape_entities(body: &str) -> String {
    static NUMERIC: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let numeric = NUMERIC.get_or_init(|| {
        Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").expect("entity regex is valid")
    });

    let decoded = numeric.replace_all(body, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    decoded
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Read every `row_tag` element of an XML document into a [`Row`].
///
/// Element names are matched on their local part, ignoring namespace
/// prefixes and case.
pub fn read_rows(xml: &str, row_tag: &str, what: &'static str) -> Result<Vec<Row>> {
    let cleaned = strip_indentation(xml);
    let mut reader = Reader::from_str(&cleaned);
    reader.config_mut().trim_text(true);

    let mut rows = Vec::new();
    let mut current: Option<Row> = None;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if name == row_tag {
                    current = Some(Row::default());
                    field = None;
                } else if let Some(row) = current.as_mut() {
                    row.fields.entry(name.clone()).or_default();
                    field = Some(name);
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if let Some(row) = current.as_mut() {
                    row.fields.entry(name).or_default();
                } else if name == row_tag {
                    rows.push(Row::default());
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(row), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = e
                        .unescape()
                        .map_err(|err| PortalError::decode(what, err, xml))?;
                    row.fields.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(row), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = String::from_utf8_lossy(&e);
                    row.fields.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if name == row_tag {
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                } else {
                    field = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PortalError::decode(what, e, xml)),
            _ => {}
        }
    }

    debug!("Read {} {what} rows", rows.len());
    Ok(rows)
}

/// Decode a JSON payload and return the value under the `"d"` key.
///
/// `null` members are removed so that `#[serde(default)]` fills them in.
pub fn decode_envelope<T: DeserializeOwned>(body: &str, what: &'static str) -> Result<T> {
    let inner = envelope(body, what)?;
    serde_json::from_value(inner).map_err(|e| PortalError::decode(what, e, body))
}

/// [`decode_envelope`] for list payloads, where a `null` `"d"` means no rows.
pub fn decode_list_envelope<T: DeserializeOwned>(
    body: &str,
    what: &'static str,
) -> Result<Vec<T>> {
    match envelope(body, what)? {
        Value::Null => Ok(Vec::new()),
        inner => serde_json::from_value(inner).map_err(|e| PortalError::decode(what, e, body)),
    }
}

/// The `"d"` member of a payload, `Value::Null` when it is `null`.
///
/// A body that is not JSON as sent is retried after HTML unescaping. A body
/// that is, keeps its JSON intact and only has entities in string values
/// unescaped.
fn envelope(body: &str, what: &'static str) -> Result<Value> {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(mut value) => {
            unescape_strings(&mut value);
            value
        }
        Err(_) => serde_json::from_str(&unescape_entities(body))
            .map_err(|e| PortalError::decode(what, e, body))?,
    };

    let mut inner = match value {
        Value::Object(mut map) => map
            .remove("d")
            .ok_or_else(|| PortalError::decode(what, "missing \"d\" envelope", body))?,
        _ => return Err(PortalError::decode(what, "expected a JSON object", body)),
    };
    drop_nulls(&mut inner);
    Ok(inner)
}

fn unescape_strings(value: &mut Value) {
    match value {
        Value::String(text) if text.contains('&') => *text = unescape_entities(text),
        Value::Object(map) => map.values_mut().for_each(unescape_strings),
        Value::Array(items) => items.iter_mut().for_each(unescape_strings),
        _ => {}
    }
}

fn drop_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(drop_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(drop_nulls),
        _ => {}
    }
}

pub fn parse_portal_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match NaiveDateTime::parse_from_str(value, PORTAL_TIME_FORMAT) {
        Ok(time) => Some(time),
        Err(e) => {
            warn!("Ignoring unparseable portal time {value:?}: {e}");
            None
        }
    }
}

/// Second `" * "`-delimited segment of a dispatch body, or `""`.
pub fn address_from_body(body: &str) -> String {
    body.split(ADDRESS_DELIMITER)
        .nth(1)
        .map(|address| address.trim().to_string())
        .unwrap_or_default()
}

pub fn roster(body: &str) -> Result<Vec<RosterEntry>> {
    let rows = read_rows(body, "nowresponding", "roster")?;
    Ok(rows
        .iter()
        .map(|row| RosterEntry {
            member_name: row.text("memberfname"),
            category: row.text("membercat"),
            station: row.text("memberstation"),
            calling_time: row.text("callingtime"),
            eta: row.text("eta"),
            caller_number: row.text("callerno"),
            called_number: row.text("calledno"),
            user_input: row.text("userinput"),
        })
        .filter(|entry| !entry.member_name.is_empty())
        .collect())
}

pub fn schedule(body: &str) -> Result<Vec<ScheduleEntry>> {
    let rows = read_rows(body, "onschedule", "schedule")?;
    Ok(rows
        .iter()
        .map(|row| ScheduleEntry {
            member_name: row.text("membername"),
            category: row.text("membercat"),
            in_station_or_home: row.text("instationorhome"),
            station: row.text("memberstation"),
            until_at: row.text("untilat"),
        })
        .filter(|entry| !entry.member_name.is_empty())
        .collect())
}

pub fn dispatch_messages(body: &str) -> Result<Vec<DispatchMessage>> {
    let rows = read_rows(body, "dispatchmessages", "dispatch messages")?;
    Ok(rows
        .iter()
        .map(|row| {
            let body = row.text("messagebody").replace(BREAK_ARTIFACT, "");
            DispatchMessage {
                id: row.int("id"),
                address: address_from_body(&body),
                body,
                destination_email: row.text("destinationemailaddress"),
                subject: row.text("messagesubject"),
                verified_status: row.text("verifiedstatus"),
                arrived_on: row.text("arrivedonstring"),
            }
        })
        .collect())
}

pub fn reminders(body: &str) -> Result<Vec<ReminderEvent>> {
    let rows = read_rows(body, "event", "reminders")?;
    Ok(rows
        .iter()
        .map(|row| ReminderEvent {
            id: row.int("eventid"),
            subject: row.text("subject"),
            start: row.time("eventstart"),
            end: row.time("eventend"),
            recurrence_id: row.int("eventsrecurrenceid"),
            subscriber_id: row.int("subscriberid"),
        })
        .filter(|event| !event.subject.is_empty())
        .collect())
}

/// Single incident lookup. An empty `"d"` array means the portal has nothing
/// for `incident_id`.
pub fn incident(body: &str, incident_id: i64) -> Result<IncidentInfo> {
    let mut incidents: Vec<IncidentInfo> = decode_list_envelope(body, "incident")?;
    if incidents.is_empty() {
        return Err(PortalError::EmptyResult(incident_id));
    }
    Ok(incidents.swap_remove(0))
}

pub fn incidents(body: &str) -> Result<Vec<IncidentInfo>> {
    decode_list_envelope(body, "latest incidents")
}

pub fn dispatcher_status(body: &str) -> Result<DispatcherStatus> {
    let mut status: DispatcherStatus = decode_envelope(body, "dispatcher status")?;
    status.on_duty.retain(|person| !person.name.trim().is_empty());
    Ok(status)
}
