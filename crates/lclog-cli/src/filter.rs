//! Client-side entry predicates and the value types behind filter flags.

use anyhow::anyhow;
use lclog_api_models::LogEntry;

use crate::client::{CliError, CliResult};

/// Firmware version (dots stripped) from which message IDs are dotted.
const NEW_ID_FIRMWARE_THRESHOLD: u64 = 6_000_000;

const FAIL_KEYWORDS: [&str; 3] = ["unable", "fail", "error"];

/// Severity levels accepted by `--get-severity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Informational,
    Warning,
    Critical,
}

impl Severity {
    pub(crate) fn parse(value: &str) -> CliResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "informational" => Ok(Self::Informational),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            _ => Err(CliError::validation(format!(
                "invalid value '{value}' for --get-severity (supported: informational, warning, critical)"
            ))),
        }
    }

    /// Value the controller stores in the `Severity` field.
    pub(crate) const fn redfish_value(self) -> &'static str {
        match self {
            Self::Informational => "OK",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Vendor categories accepted by `--get-category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Category {
    Audit,
    Configuration,
    Updates,
    SystemHealth,
    Storage,
}

impl Category {
    pub(crate) fn parse(value: &str) -> CliResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "audit" => Ok(Self::Audit),
            "configuration" => Ok(Self::Configuration),
            "updates" => Ok(Self::Updates),
            "systemhealth" => Ok(Self::SystemHealth),
            "storage" => Ok(Self::Storage),
            _ => Err(CliError::validation(format!(
                "invalid value '{value}' for --get-category (supported: audit, configuration, updates, systemhealth, storage)"
            ))),
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Configuration => "configuration",
            Self::Updates => "updates",
            Self::SystemHealth => "systemhealth",
            Self::Storage => "storage",
        }
    }
}

/// Message-ID encoding used by the controller firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdConvention {
    /// IDs are bare (`WRK0001`) and used verbatim.
    Old,
    /// IDs are dotted (`IDRAC.2.8.WRK0001`); the last segment is canonical.
    New,
}

impl IdConvention {
    pub(crate) fn from_firmware_version(version: &str) -> CliResult<Self> {
        let digits: String = version.trim().chars().filter(|ch| *ch != '.').collect();
        let numeric = digits.parse::<u64>().map_err(|err| {
            CliError::failure(anyhow!("unrecognised iDRAC firmware version '{version}': {err}"))
        })?;
        Ok(if numeric >= NEW_ID_FIRMWARE_THRESHOLD {
            Self::New
        } else {
            Self::Old
        })
    }

    pub(crate) fn normalize(self, raw: &str) -> &str {
        match self {
            Self::Old => raw,
            Self::New => raw.rsplit('.').next().unwrap_or(raw),
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }
}

/// Predicate applied to every fetched entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryFilter {
    All,
    Category(Category),
    FailKeyword,
    /// Lowercased comma-separated ID list; matched by substring containment.
    MessageIds(String),
}

impl EntryFilter {
    pub(crate) fn message_ids(list: &str) -> CliResult<Self> {
        let trimmed = list.trim();
        if trimmed.is_empty() {
            return Err(CliError::validation("--get-message-id requires at least one ID"));
        }
        Ok(Self::MessageIds(trimmed.to_lowercase()))
    }

    pub(crate) fn matches(&self, entry: &LogEntry, convention: IdConvention) -> bool {
        match self {
            Self::All => true,
            Self::Category(category) => entry
                .category()
                .is_some_and(|value| value.eq_ignore_ascii_case(category.as_str())),
            Self::FailKeyword => entry.message().is_some_and(|message| {
                let lowered = message.to_lowercase();
                FAIL_KEYWORDS
                    .iter()
                    .any(|keyword| lowered.contains(keyword))
            }),
            Self::MessageIds(list) => entry.message_id().is_some_and(|raw| {
                list.contains(&convention.normalize(raw).to_lowercase())
            }),
        }
    }
}
