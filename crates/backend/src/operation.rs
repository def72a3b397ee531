use {
    serde_json::{Map, Value, json},
    sheetbot_common::ResourceId,
};

use crate::error::{BackendError, Result};

/// Something the bot asks the automation endpoint to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Read the date currently stored in the sheet.
    GetDate,
    /// Read status counters.
    GetStatus,
    /// Store a new date (`DD.MM.YYYY`, passed through verbatim).
    SetDate(String),
    /// Recompute intervals across the sheet.
    UpdateIntervals,
    /// Clear the working range.
    Clear,
}

/// How heavy an operation is; selects its timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationWeight {
    Read,
    Write,
    Bulk,
}

impl Operation {
    /// Stable name for logs and metric labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetDate => "get_date",
            Self::GetStatus => "get_status",
            Self::SetDate(_) => "set_date",
            Self::UpdateIntervals => "update_intervals",
            Self::Clear => "clear",
        }
    }

    #[must_use]
    pub fn weight(&self) -> OperationWeight {
        match self {
            Self::GetDate | Self::GetStatus => OperationWeight::Read,
            Self::SetDate(_) | Self::Clear => OperationWeight::Write,
            Self::UpdateIntervals => OperationWeight::Bulk,
        }
    }

    #[must_use]
    pub fn is_read(&self) -> bool {
        self.weight() == OperationWeight::Read
    }

    /// Query parameters for a GET request.
    pub(crate) fn query(&self, resource: Option<&ResourceId>) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if matches!(self, Self::GetStatus) {
            query.push(("action", "status".to_string()));
        }
        if let Some(resource) = resource {
            query.push(("resourceId", resource.as_str().to_string()));
        }
        query
    }

    /// JSON body for a POST request.
    pub(crate) fn payload(&self, resource: Option<&ResourceId>) -> Value {
        let mut body = match self {
            Self::SetDate(date) => json!({ "new_date": date }),
            Self::UpdateIntervals => json!({ "update_intervals": true }),
            Self::Clear => json!({ "clear": true }),
            Self::GetDate | Self::GetStatus => json!({}),
        };
        if let (Some(resource), Some(obj)) = (resource, body.as_object_mut()) {
            obj.insert("resourceId".into(), Value::String(resource.as_str().to_string()));
        }
        body
    }

    /// Interpret a decoded JSON body for this operation.
    pub(crate) fn interpret(&self, body: Value) -> Result<BackendResponse> {
        let Value::Object(mut fields) = body else {
            return Err(BackendError::malformed("response is not a JSON object"));
        };
        let status = fields.remove("status");
        let message = match fields.remove("message") {
            Some(Value::String(m)) if !m.trim().is_empty() => Some(m),
            _ => None,
        };
        let status = match status {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.to_ascii_lowercase()),
            Some(other) => {
                return Err(BackendError::malformed(format!(
                    "unexpected 'status' value {other}"
                )));
            },
        };

        if status.as_deref() == Some("error") {
            return Err(BackendError::application(
                message.unwrap_or_else(|| "backend reported an error".into()),
            ));
        }

        match self {
            Self::GetDate => match fields.remove("date") {
                Some(Value::String(date)) if !date.trim().is_empty() => {
                    Ok(BackendResponse::Date(date.trim().to_string()))
                },
                _ => Err(BackendError::malformed("missing 'date' field")),
            },
            Self::GetStatus => {
                if status.is_none() && fields.is_empty() {
                    return Err(BackendError::malformed("empty status response"));
                }
                Ok(BackendResponse::Status(StatusReport::from_fields(fields)))
            },
            Self::SetDate(_) | Self::UpdateIntervals | Self::Clear => match status.as_deref() {
                Some("ok") => Ok(BackendResponse::Done { message }),
                Some(_) => Err(BackendError::application(
                    message.unwrap_or_else(|| "backend did not confirm the change".into()),
                )),
                None => Err(BackendError::malformed("missing 'status' field")),
            },
        }
    }
}

/// Successful backend answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendResponse {
    /// Current date string, as stored in the sheet.
    Date(String),
    /// Status counters.
    Status(StatusReport),
    /// Write acknowledged, with an optional confirmation message.
    Done { message: Option<String> },
}

/// Named counters reported by the status read, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub counters: Vec<(String, String)>,
}

impl StatusReport {
    fn from_fields(fields: Map<String, Value>) -> Self {
        let mut counters: Vec<(String, String)> = fields
            .into_iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s,
                    Value::Null => "—".to_string(),
                    other => other.to_string(),
                };
                (key, rendered)
            })
            .collect();
        counters.sort_by(|a, b| a.0.cmp(&b.0));
        Self { counters }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
