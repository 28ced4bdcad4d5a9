use std::path::{Path, PathBuf};

use anyhow::anyhow;
use chrono::Local;

use crate::client::{CliError, CliResult, SessionContext};
use crate::commands::walk::{LogQuery, StopReason, walk};
use crate::filter::{Category, EntryFilter, Severity};
use crate::output::{OutputFormat, Sink, SinkOutcome, collection_timestamp, notice};

/// The single retrieval mode selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RetrievalMode {
    All,
    Severity(Severity),
    Category(Category),
    DateRange { start: String, end: String },
    Fail,
    MessageId(String),
}

impl RetrievalMode {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Self::All => "get_all",
            Self::Severity(_) => "get_severity",
            Self::Category(_) => "get_category",
            Self::DateRange { .. } => "get_date_range",
            Self::Fail => "get_fail",
            Self::MessageId(_) => "get_message_id",
        }
    }

    fn query(&self) -> LogQuery {
        match self {
            Self::Severity(level) => LogQuery::Severity(*level),
            Self::DateRange { start, end } => LogQuery::DateRange {
                start: start.clone(),
                end: end.clone(),
            },
            Self::All | Self::Category(_) | Self::Fail | Self::MessageId(_) => LogQuery::All,
        }
    }

    fn filter(&self) -> CliResult<EntryFilter> {
        match self {
            Self::All | Self::Severity(_) | Self::DateRange { .. } => Ok(EntryFilter::All),
            Self::Category(category) => Ok(EntryFilter::Category(*category)),
            Self::Fail => Ok(EntryFilter::FailKeyword),
            Self::MessageId(ids) => EntryFilter::message_ids(ids),
        }
    }

    /// Artifact file name; server-side filtered modes print to the console only.
    const fn artifact(&self) -> Option<&'static str> {
        match self {
            Self::All => Some("lc_logs.txt"),
            Self::Fail => Some("lc_log_failures.txt"),
            Self::MessageId(_) => Some("message_id_entries.txt"),
            Self::Category(_) => Some("category_entries.txt"),
            Self::Severity(_) | Self::DateRange { .. } => None,
        }
    }

    /// Full dumps keep their file even when the log is empty.
    const fn keeps_empty_artifact(&self) -> bool {
        matches!(self, Self::All)
    }

    fn scan_notice(&self) -> Option<String> {
        let subject = match self {
            Self::Fail => "failed entries".to_string(),
            Self::MessageId(ids) => format!("message ID(s) {ids}"),
            Self::Category(category) => format!("category \"{}\"", category.as_str()),
            Self::All | Self::Severity(_) | Self::DateRange { .. } => return None,
        };
        Some(format!(
            "\n- INFO, checking iDRAC LC logs for {subject}, this may take up to 1 minute to complete depending on log size -\n"
        ))
    }

    fn empty_notice(&self) -> String {
        match self {
            Self::All => "no entries detected in iDRAC LC logs".to_string(),
            Self::Severity(level) => {
                format!("no \"{}\" severity detected in iDRAC LC logs", level.as_str())
            }
            Self::Category(category) => format!(
                "no {} category entries detected in LC logs",
                category.as_str()
            ),
            Self::DateRange { .. } => {
                "no iDRAC LC logs detected within the date range specified".to_string()
            }
            Self::Fail => "no failed entries detected in LC logs".to_string(),
            Self::MessageId(ids) => format!("no entries detected in LC logs for message id(s): {ids}"),
        }
    }
}

/// Console and artifact settings for a retrieval.
#[derive(Debug, Clone)]
pub(crate) struct LogsOptions {
    pub(crate) output_dir: PathBuf,
    pub(crate) format: OutputFormat,
}

/// Run the selected retrieval: walk the log, collect matches, finalize the artifact.
pub(crate) async fn handle_logs(
    ctx: &SessionContext,
    mode: &RetrievalMode,
    options: &LogsOptions,
) -> CliResult<()> {
    let filter = mode.filter()?;
    let query = mode.query();

    if let Some(message) = mode.scan_notice() {
        notice(options.format, &message);
    }

    let mut sink = open_sink(mode, &options.output_dir, options.format)?;
    let walked = walk(ctx, &query, &filter, &mut sink).await;
    let outcome = sink.finalize()?;
    let report = walked?;

    tracing::info!(
        mode = mode.label(),
        pages = report.pages,
        seen = report.seen,
        stop = ?report.stop,
        "walk finished"
    );

    match &outcome {
        SinkOutcome::Written { path, count } => {
            notice(
                options.format,
                &format!(
                    "\n- INFO, {count} Lifecycle log entries also captured in \"{}\" file",
                    path.display()
                ),
            );
        }
        SinkOutcome::Removed { path } => {
            tracing::debug!(path = %path.display(), "removed empty artifact");
            notice(options.format, &format!("- WARNING, {}", mode.empty_notice()));
        }
        SinkOutcome::ConsoleOnly { count: 0 } => {
            notice(options.format, &format!("- WARNING, {}", mode.empty_notice()));
        }
        SinkOutcome::ConsoleOnly { count } => {
            notice(
                options.format,
                &format!("\n- INFO, {count} Lifecycle log entries returned"),
            );
        }
    }

    match report.stop {
        StopReason::Fatal { status, body } => Err(CliError::failure(anyhow!(
            "GET request failed using skip query parameter, status code {status} returned. Detailed error results: \n{body}"
        ))),
        StopReason::EndOfLog | StopReason::ServerClosed | StopReason::PageLimit => Ok(()),
    }
}

fn open_sink(mode: &RetrievalMode, output_dir: &Path, format: OutputFormat) -> CliResult<Sink> {
    match mode.artifact() {
        Some(name) => {
            let header = collection_timestamp(&Local::now());
            Sink::with_artifact(
                &output_dir.join(name),
                format,
                mode.keeps_empty_artifact(),
                &header,
            )
        }
        None => Ok(Sink::console(format)),
    }
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use crate::client::{Credentials, LCLOG_ENTRIES_PATH, LCLOG_PATH};
    use crate::filter::IdConvention;
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::{Value, json};
    use std::fs;

    fn context(server: &MockServer, convention: IdConvention) -> SessionContext {
        SessionContext {
            client: Client::new(),
            base_url: server.base_url().parse().expect("valid URL"),
            credentials: Credentials::Token("token".into()),
            verify_tls: false,
            convention,
        }
    }

    fn options(dir: &Path) -> LogsOptions {
        LogsOptions {
            output_dir: dir.to_path_buf(),
            format: OutputFormat::Table,
        }
    }

    fn members(entries: Value) -> Value {
        json!({ "Members": entries })
    }

    fn mock_single_page(server: &MockServer, entries: Value) {
        server.mock(|when, then| {
            when.method(GET).path(LCLOG_PATH).query_param_missing("$skip");
            then.status(200).json_body(members(entries));
        });
        server.mock(|when, then| {
            when.method(GET).path(LCLOG_PATH).query_param("$skip", "50");
            then.status(400).json_body(json!({
                "error": {"@Message.ExtendedInfo": [
                    {"Message": "The query parameter $skip is out of range."}
                ]}
            }));
        });
    }

    #[test]
    fn artifacts_follow_mode() {
        assert_eq!(RetrievalMode::All.artifact(), Some("lc_logs.txt"));
        assert_eq!(RetrievalMode::Fail.artifact(), Some("lc_log_failures.txt"));
        assert_eq!(
            RetrievalMode::MessageId("WRK0001".into()).artifact(),
            Some("message_id_entries.txt")
        );
        assert_eq!(
            RetrievalMode::Category(Category::Audit).artifact(),
            Some("category_entries.txt")
        );
        assert_eq!(RetrievalMode::Severity(Severity::Warning).artifact(), None);
        assert!(RetrievalMode::All.keeps_empty_artifact());
        assert!(!RetrievalMode::Fail.keeps_empty_artifact());
    }

    #[test]
    fn scan_notice_only_for_client_side_scans() {
        assert!(RetrievalMode::Fail.scan_notice().is_some());
        assert!(RetrievalMode::All.scan_notice().is_none());
        assert!(
            RetrievalMode::Category(Category::Storage)
                .scan_notice()
                .is_some_and(|notice| notice.contains("\"storage\""))
        );
    }

    #[tokio::test]
    async fn fail_scan_without_matches_removes_artifact() -> CliResult<()> {
        let server = MockServer::start_async().await;
        mock_single_page(
            &server,
            json!([{"Id": "1", "Message": "Configuration applied successfully"}]),
        );
        let dir = tempfile::tempdir().map_err(CliError::failure)?;

        handle_logs(
            &context(&server, IdConvention::New),
            &RetrievalMode::Fail,
            &options(dir.path()),
        )
        .await?;

        assert!(!dir.path().join("lc_log_failures.txt").exists());
        Ok(())
    }

    #[tokio::test]
    async fn message_id_scan_writes_matching_entries() -> CliResult<()> {
        let server = MockServer::start_async().await;
        mock_single_page(
            &server,
            json!([
                {"Id": "1", "MessageId": "IDRAC.2.8.WRK0001", "Message": "job done"},
                {"Id": "2", "MessageId": "IDRAC.2.8.USR0030", "Message": "login"}
            ]),
        );
        let dir = tempfile::tempdir().map_err(CliError::failure)?;

        handle_logs(
            &context(&server, IdConvention::New),
            &RetrievalMode::MessageId("wrk0001,sys1003".into()),
            &options(dir.path()),
        )
        .await?;

        let contents = fs::read_to_string(dir.path().join("message_id_entries.txt"))
            .map_err(CliError::failure)?;
        assert!(contents.starts_with("- Data collection timestamp: "));
        assert!(contents.contains("Id: 1\nMessageId: IDRAC.2.8.WRK0001\nMessage: job done\n\n"));
        assert!(!contents.contains("USR0030"));
        Ok(())
    }

    #[tokio::test]
    async fn full_dump_keeps_artifact_and_is_repeatable() -> CliResult<()> {
        let server = MockServer::start_async().await;
        mock_single_page(
            &server,
            json!([
                {"Id": "1", "Message": "first", "Oem": {"Dell": {"Category": "Audit"}}},
                {"Id": "2", "Message": "second"}
            ]),
        );
        let ctx = context(&server, IdConvention::Old);
        let first = tempfile::tempdir().map_err(CliError::failure)?;
        let second = tempfile::tempdir().map_err(CliError::failure)?;

        handle_logs(&ctx, &RetrievalMode::All, &options(first.path())).await?;
        handle_logs(&ctx, &RetrievalMode::All, &options(second.path())).await?;

        let read_body = |dir: &Path| -> CliResult<String> {
            let contents =
                fs::read_to_string(dir.join("lc_logs.txt")).map_err(CliError::failure)?;
            Ok(contents
                .split_once('\n')
                .map(|(_, rest)| rest.to_string())
                .unwrap_or_default())
        };
        let body = read_body(first.path())?;
        assert_eq!(body, read_body(second.path())?);
        assert!(body.contains(r#"Oem: {"Dell":{"Category":"Audit"}}"#));
        Ok(())
    }

    #[tokio::test]
    async fn date_range_uses_entries_collection_without_artifact() -> CliResult<()> {
        let server = MockServer::start_async().await;
        let first = server.mock(|when, then| {
            when.method(GET)
                .path(LCLOG_ENTRIES_PATH)
                .query_param(
                    "$filter",
                    "Created ge '2023-03-15T14:55:10-05:00' and Created le '2023-03-15T14:57:07-05:00'",
                )
                .query_param_missing("$skip");
            then.status(200)
                .json_body(members(json!([{"Id": "7", "Created": "2023-03-15T14:56:00-05:00"}])));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path(LCLOG_ENTRIES_PATH)
                .query_param("$skip", "50");
            then.status(200).json_body(members(json!([])));
        });
        let dir = tempfile::tempdir().map_err(CliError::failure)?;

        handle_logs(
            &context(&server, IdConvention::New),
            &RetrievalMode::DateRange {
                start: "2023-03-15T14:55:10-05:00".into(),
                end: "2023-03-15T14:57:07-05:00".into(),
            },
            &options(dir.path()),
        )
        .await?;

        first.assert();
        assert_eq!(fs::read_dir(dir.path()).map_err(CliError::failure)?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn fatal_stop_finalizes_artifact_and_reports_failure() -> CliResult<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(LCLOG_PATH).query_param_missing("$skip");
            then.status(200)
                .json_body(members(json!([{"Id": "1", "Message": "Unable to reach NIC"}])));
        });
        server.mock(|when, then| {
            when.method(GET).path(LCLOG_PATH).query_param("$skip", "50");
            then.status(403).body("forbidden");
        });
        let dir = tempfile::tempdir().map_err(CliError::failure)?;

        let err = handle_logs(
            &context(&server, IdConvention::New),
            &RetrievalMode::Fail,
            &options(dir.path()),
        )
        .await
        .expect_err("403 mid-walk should fail");

        assert!(err.display_message().contains("status code 403"));
        assert!(err.display_message().contains("forbidden"));
        let contents = fs::read_to_string(dir.path().join("lc_log_failures.txt"))
            .map_err(CliError::failure)?;
        assert!(contents.contains("Message: Unable to reach NIC"));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_message_id_list_fails_before_requests() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(200);
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let err = handle_logs(
            &context(&server, IdConvention::New),
            &RetrievalMode::MessageId("  ".into()),
            &options(dir.path()),
        )
        .await
        .expect_err("empty list should fail");
        assert!(matches!(err, CliError::Validation(_)));
        assert_eq!(mock.hits(), 0);
    }
}
