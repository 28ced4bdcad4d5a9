#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Wire model for the Redfish Lifecycle log collection.
//!
//! The controller returns heterogeneous payloads for the same condition
//! depending on firmware, so every raw reply is funnelled through
//! [`classify_response`] before the CLI looks at it. That function is the only
//! place that knows the server's end-of-log wording.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of entries the controller returns per page.
pub const PAGE_SIZE: usize = 50;

/// Highest `$skip` offset the walker will request.
pub const MAX_SKIP: usize = 100_000;

/// Error message fragments the controller uses to say "nothing left to read".
pub const END_OF_LOG_MARKERS: &[&str] = &["query parameter $skip is out of range", "internal error"];

/// One Lifecycle log record, kept as the raw field map the controller sent.
///
/// Field order is preserved so that rendered output matches the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry(Map<String, Value>);

impl LogEntry {
    /// Wrap an already-decoded field map.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Iterate over top-level fields in server order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Look up a top-level string field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Human-readable event text.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.text("Message")
    }

    /// Registry message identifier (e.g. `WRK0001` or `IDRAC.2.8.WRK0001`).
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.text("MessageId")
    }

    /// Creation timestamp as reported by the controller.
    #[must_use]
    pub fn created(&self) -> Option<&str> {
        self.text("Created")
    }

    /// Severity string (`OK`, `Warning`, `Critical`).
    #[must_use]
    pub fn severity(&self) -> Option<&str> {
        self.text("Severity")
    }

    /// Vendor category from `Oem.Dell.Category`.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.0
            .get("Oem")
            .and_then(|oem| oem.get("Dell"))
            .and_then(|dell| dell.get("Category"))
            .and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for LogEntry {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Entries returned by a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    entries: Vec<LogEntry>,
}

impl Page {
    /// Build a page from decoded entries.
    #[must_use]
    pub const fn new(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    /// Entries in server order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Consume the page, yielding its entries in server order.
    #[must_use]
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    /// Number of entries on the page.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the page carried no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another page may follow this one. An empty page ends the log.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Result of one page fetch after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page of entries.
    Ok(Page),
    /// Empty member list or an out-of-range style error message.
    EndOfLog,
    /// HTTP 500: the controller closed the cursor.
    TransientServerError,
    /// Any other non-200 reply, carried verbatim.
    Fatal {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

/// Shape of the collection document the controller returns.
#[derive(Debug, Deserialize)]
struct LogCollection {
    #[serde(rename = "Members", default)]
    members: Option<Vec<LogEntry>>,
}

/// Redfish error envelope (`{"error": {...}}`).
#[derive(Debug, Clone, Deserialize)]
pub struct RedfishErrorBody {
    /// Error details.
    pub error: RedfishError,
}

/// Error details inside the Redfish envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedfishError {
    /// Short error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Top-level message.
    #[serde(default)]
    pub message: Option<String>,
    /// Per-condition messages.
    #[serde(rename = "@Message.ExtendedInfo", default)]
    pub extended_info: Vec<ExtendedInfo>,
}

/// One `@Message.ExtendedInfo` element.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendedInfo {
    /// Human-readable message.
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    /// Registry identifier of the message.
    #[serde(rename = "MessageId", default)]
    pub message_id: Option<String>,
}

impl RedfishError {
    /// All human-readable messages, extended info first.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.extended_info
            .iter()
            .filter_map(|info| info.message.as_deref())
            .chain(self.message.as_deref())
    }
}

/// Decode a Redfish error envelope, if the body carries one.
#[must_use]
pub fn parse_error_body(body: &str) -> Option<RedfishError> {
    serde_json::from_str::<RedfishErrorBody>(body)
        .ok()
        .map(|envelope| envelope.error)
}

/// Whether an error body says the log has been read to the end.
#[must_use]
pub fn signals_end_of_log(body: &str) -> bool {
    parse_error_body(body).is_some_and(|error| {
        error.messages().any(|message| {
            let lowered = message.to_ascii_lowercase();
            END_OF_LOG_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker))
        })
    })
}

/// Classify a raw reply from the log collection endpoint.
#[must_use]
pub fn classify_response(status: u16, body: &str) -> FetchOutcome {
    match status {
        200 => match serde_json::from_str::<LogCollection>(body) {
            Ok(LogCollection {
                members: Some(members),
            }) if !members.is_empty() => FetchOutcome::Ok(Page::new(members)),
            Ok(_) => FetchOutcome::EndOfLog,
            Err(_) => FetchOutcome::Fatal {
                status,
                body: body.to_string(),
            },
        },
        500 => FetchOutcome::TransientServerError,
        _ if signals_end_of_log(body) => FetchOutcome::EndOfLog,
        _ => FetchOutcome::Fatal {
            status,
            body: body.to_string(),
        },
    }
}
