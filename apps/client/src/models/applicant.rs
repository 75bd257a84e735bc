use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An applicant record exactly as the backend returned it.
///
/// The client never validates field contents. Field order is the order of the
/// backend's JSON document (`serde_json` is built with `preserve_order`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Applicant(Map<String, Value>);

impl Applicant {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The identifier rendered as a string, so `7` and `"7"` compare equal.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id().as_deref() == Some(id)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn raw_status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// Parsed status; `None` when missing or not one of the known stages.
    pub fn status(&self) -> Option<ApplicantStatus> {
        self.raw_status().and_then(|raw| raw.parse().ok())
    }

    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    pub fn full_name(&self) -> Option<String> {
        match (self.str_field("first_name"), self.str_field("last_name")) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        }
    }

    pub fn hr_notes(&self) -> Option<&str> {
        self.str_field("hr_notes")
    }

    pub fn hr_rating(&self) -> Option<i64> {
        self.0.get("hr_rating").and_then(Value::as_i64)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.str_field("created_at")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

impl From<Map<String, Value>> for Applicant {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Hiring pipeline stage. Wire values are the backend's German slugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicantStatus {
    #[serde(rename = "beworben")]
    Applied,
    #[serde(rename = "geprueft")]
    Reviewed,
    #[serde(rename = "vorstellungsgespräch")]
    Interview,
    #[serde(rename = "eingestellt")]
    Hired,
    #[serde(rename = "abgelehnt")]
    Rejected,
}

impl ApplicantStatus {
    pub const ALL: [ApplicantStatus; 5] = [
        ApplicantStatus::Applied,
        ApplicantStatus::Reviewed,
        ApplicantStatus::Interview,
        ApplicantStatus::Hired,
        ApplicantStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicantStatus::Applied => "beworben",
            ApplicantStatus::Reviewed => "geprueft",
            ApplicantStatus::Interview => "vorstellungsgespräch",
            ApplicantStatus::Hired => "eingestellt",
            ApplicantStatus::Rejected => "abgelehnt",
        }
    }

    /// Display label used by the HR dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            ApplicantStatus::Applied => "Beworben",
            ApplicantStatus::Reviewed => "Geprüft",
            ApplicantStatus::Interview => "Vorstellungsgespräch",
            ApplicantStatus::Hired => "Eingestellt",
            ApplicantStatus::Rejected => "Abgelehnt",
        }
    }
}

impl fmt::Display for ApplicantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicantStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim();
        ApplicantStatus::ALL
            .into_iter()
            .find(|status| {
                status.as_str() == needle || status.label().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| format!("unknown applicant status '{raw}'"))
    }
}

/// Partial update sent by HR. Unset fields are left off the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicantStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr_rating: Option<i32>,
}

impl ApplicantPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.hr_notes.is_none() && self.hr_rating.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn applicant(value: Value) -> Applicant {
        serde_json::from_value(value).expect("applicant object")
    }

    #[test]
    fn test_numeric_and_string_ids_compare_as_strings() {
        assert!(applicant(json!({ "id": 7 })).has_id("7"));
        assert!(applicant(json!({ "id": "7" })).has_id("7"));
        assert!(!applicant(json!({ "id": "70" })).has_id("7"));
        assert_eq!(applicant(json!({ "name": "x" })).id(), None);
    }

    #[test]
    fn test_field_order_follows_document_order() {
        let a = applicant(json!({ "zeta": 1, "alpha": 2, "id": "1" }));
        let keys: Vec<&str> = a.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "id"]);
    }

    #[test]
    fn test_typed_accessors() {
        let a = applicant(json!({
            "id": "3",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "status": "vorstellungsgespräch",
            "hr_rating": 4,
            "hr_notes": "strong",
            "created_at": "2025-03-01T09:30:00+01:00"
        }));

        assert_eq!(a.full_name().as_deref(), Some("Ada Lovelace"));
        assert_eq!(a.email(), Some("ada@example.com"));
        assert_eq!(a.status(), Some(ApplicantStatus::Interview));
        assert_eq!(a.hr_rating(), Some(4));
        assert_eq!(a.hr_notes(), Some("strong"));
        let created = a.created_at().expect("timestamp parses");
        assert_eq!(created.to_rfc3339(), "2025-03-01T08:30:00+00:00");
    }

    #[test]
    fn test_unknown_status_stays_readable_raw() {
        let a = applicant(json!({ "id": "1", "status": "archiviert" }));
        assert_eq!(a.status(), None);
        assert_eq!(a.raw_status(), Some("archiviert"));
    }

    #[test]
    fn test_status_parses_wire_value_and_label() {
        assert_eq!(
            "geprueft".parse::<ApplicantStatus>(),
            Ok(ApplicantStatus::Reviewed)
        );
        assert_eq!(
            "Abgelehnt".parse::<ApplicantStatus>(),
            Ok(ApplicantStatus::Rejected)
        );
        assert!("hired".parse::<ApplicantStatus>().is_err());
    }

    #[test]
    fn test_patch_omits_unset_fields() {
        let patch = ApplicantPatch {
            status: Some(ApplicantStatus::Hired),
            ..ApplicantPatch::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "status": "eingestellt" })
        );
        assert!(ApplicantPatch::default().is_empty());
    }
}
