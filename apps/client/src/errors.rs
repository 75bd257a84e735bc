//! Error normalization: turns whatever the backend sent back into the single
//! message the user sees.
//!
//! Precedence:
//! 1. no body → network message
//! 2. `detail` → verbatim
//! 3. field-error object → `"<field>: <first message>"` for the FIRST field only
//! 4. anything else → invalid-data message
//!
//! "First field" is document order: `serde_json` is built with `preserve_order`, so
//! `Map` iterates in the order the backend wrote the keys. When several fields fail
//! at once only one is surfaced; callers render a single message.

use std::borrow::Cow;

use serde_json::Value;

pub const LOAD_APPLICANTS_FAILED: &str = "Failed to load applicants.";
pub const LOAD_DETAILS_FAILED: &str = "Failed to load applicant details.";
pub const SAVE_FAILED: &str = "Failed to save changes.";

/// Which flow produced the failure. Only wording and field labelling differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    Login,
    Submission,
}

impl ErrorContext {
    pub fn network_message(self) -> &'static str {
        match self {
            ErrorContext::Login => "Network error. Please try again.",
            ErrorContext::Submission => "Network error. Unable to reach the server.",
        }
    }

    pub fn invalid_message(self) -> &'static str {
        match self {
            ErrorContext::Login => "Invalid credentials.",
            ErrorContext::Submission => "An error occurred. Please check your inputs.",
        }
    }

    /// A field-error object with no fields in it.
    fn empty_fields_message(self) -> &'static str {
        match self {
            ErrorContext::Login => self.invalid_message(),
            ErrorContext::Submission => "Invalid data provided.",
        }
    }

    fn field_label(self, key: &str) -> Cow<'_, str> {
        match self {
            ErrorContext::Login => Cow::Borrowed(key),
            ErrorContext::Submission => Cow::Owned(prettify_field(key)),
        }
    }
}

/// Normalize a failure body into a user-facing message.
pub fn normalize(body: Option<&Value>, context: ErrorContext) -> String {
    let Some(body) = body.filter(|b| is_truthy(b)) else {
        return context.network_message().to_string();
    };

    let Value::Object(fields) = body else {
        return context.invalid_message().to_string();
    };

    if let Some(detail) = fields.get("detail").filter(|d| is_truthy(d)) {
        return render(detail);
    }

    let Some((key, value)) = fields.iter().next() else {
        return context.empty_fields_message().to_string();
    };

    let message = match value {
        Value::Array(messages) => match messages.first() {
            Some(first) => render(first),
            None => return context.invalid_message().to_string(),
        },
        other => render(other),
    };

    format!("{}: {}", context.field_label(key), message)
}

/// `resume_file` → `Resume file`. Only the first underscore after the first
/// character is replaced.
pub fn prettify_field(key: &str) -> String {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = chars.as_str().replacen('_', " ", 1);
    first.to_uppercase().chain(rest.chars()).collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
