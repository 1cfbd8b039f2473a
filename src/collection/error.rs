use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// Field-level validation messages keyed by wire field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "must not be empty");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(|v| v.as_slice())
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for m in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{field} {m}")?;
            }
        }
        Ok(())
    }
}

/// A non-success result from the collection service. Always surfaced to the
/// user as one notification; never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestFailure {
    #[error("{message}")]
    Rejected { code: String, message: String },
    #[error("validation failed: {0}")]
    Invalid(FieldErrors),
}

impl RequestFailure {
    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        RequestFailure::Rejected {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::rejected("not_found", format!("{kind} {id} not found"))
    }

    pub fn read_only(kind: &str) -> Self {
        Self::rejected("read_only", format!("{kind} is read-only"))
    }

    pub fn code(&self) -> &str {
        match self {
            RequestFailure::Rejected { code, .. } => code,
            RequestFailure::Invalid(_) => "validation_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            RequestFailure::Rejected { .. } => None,
            RequestFailure::Invalid(fields) => Some(json!({ "fields": fields })),
        }
    }
}

impl From<FieldErrors> for RequestFailure {
    fn from(fields: FieldErrors) -> Self {
        RequestFailure::Invalid(fields)
    }
}

impl From<rusqlite::Error> for RequestFailure {
    fn from(e: rusqlite::Error) -> Self {
        let code = match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => "constraint_failed",
            _ => "db_query_failed",
        };
        RequestFailure::rejected(code, e.to_string())
    }
}

/// Caller mistakes: arguments that do not match the loaded state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("page numbers start at 1, got {0}")]
    PageOutOfRange(u32),
    #[error("row {index} is not loaded (page holds {len} rows)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0} is not on the loaded page")]
    UnknownId(String),
    #[error("nothing selected")]
    EmptySelection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_render_per_field() {
        let mut f = FieldErrors::new();
        f.require("name", "  ");
        f.add("code", "already in use");
        assert_eq!(f.to_string(), "code already in use; name must not be empty");
        let failure = RequestFailure::from(f);
        assert_eq!(failure.code(), "validation_failed");
        let details = failure.details().expect("details");
        assert_eq!(details["fields"]["code"][0], "already in use");
    }
}
