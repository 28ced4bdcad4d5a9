//! Paginated retrieval of the Lifecycle log.
//!
//! The first request goes to the bare endpoint (offset 0 is implicit), every
//! later request adds `$skip` in steps of [`PAGE_SIZE`] up to [`MAX_SKIP`].
//! Each reply is classified once and the walk stops on the first terminal
//! outcome. Requests are strictly sequential.

use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use lclog_api_models::{FetchOutcome, MAX_SKIP, PAGE_SIZE, classify_response};
use url::Url;

use crate::client::{CliResult, LCLOG_ENTRIES_PATH, LCLOG_PATH, SessionContext};
use crate::filter::{EntryFilter, Severity};
use crate::output::Sink;

/// Endpoint template the walker pages through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogQuery {
    /// Unfiltered Lifecycle log.
    All,
    /// Server-side `Severity eq` filter.
    Severity(Severity),
    /// Server-side `Created ge/le` filter on the entries collection.
    DateRange { start: String, end: String },
}

impl LogQuery {
    const fn path(&self) -> &'static str {
        match self {
            Self::All | Self::Severity(_) => LCLOG_PATH,
            Self::DateRange { .. } => LCLOG_ENTRIES_PATH,
        }
    }

    fn filter_expression(&self) -> Option<String> {
        match self {
            Self::All => None,
            Self::Severity(level) => Some(format!("Severity eq '{}'", level.redfish_value())),
            Self::DateRange { start, end } => {
                Some(format!("Created ge '{start}' and Created le '{end}'"))
            }
        }
    }

    /// URL for the page at `skip`; `None` is the first page.
    pub(crate) fn url(&self, ctx: &SessionContext, skip: Option<usize>) -> CliResult<Url> {
        let mut url = ctx.endpoint(self.path())?;
        let params: Vec<String> = self
            .filter_expression()
            .map(|filter| format!("$filter={}", escape_query_value(&filter)))
            .into_iter()
            .chain(skip.map(|offset| format!("$skip={offset}")))
            .collect();
        if !params.is_empty() {
            url.set_query(Some(&params.join("&")));
        }
        Ok(url)
    }
}

/// Escape the characters `set_query` leaves literal but a query decoder would
/// reinterpret, so `+hh:mm` offsets survive intact.
fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '+' => escaped.push_str("%2B"),
            '&' => escaped.push_str("%26"),
            '=' => escaped.push_str("%3D"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Why the walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StopReason {
    EndOfLog,
    /// HTTP 500 mid-walk; the controller dropped the cursor.
    ServerClosed,
    PageLimit,
    Fatal { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WalkReport {
    pub(crate) pages: usize,
    pub(crate) seen: usize,
    pub(crate) stop: StopReason,
}

/// Page offsets in request order: the implicit first page, then every `$skip`
/// up to `max_skip`.
fn offsets(max_skip: usize) -> impl Iterator<Item = Option<usize>> {
    std::iter::once(None).chain((PAGE_SIZE..=max_skip).step_by(PAGE_SIZE).map(Some))
}

/// Fetch every page for `query`, feeding entries accepted by `filter` into `sink`.
pub(crate) async fn walk(
    ctx: &SessionContext,
    query: &LogQuery,
    filter: &EntryFilter,
    sink: &mut Sink,
) -> CliResult<WalkReport> {
    walk_until(ctx, query, filter, sink, MAX_SKIP).await
}

async fn walk_until(
    ctx: &SessionContext,
    query: &LogQuery,
    filter: &EntryFilter,
    sink: &mut Sink,
    max_skip: usize,
) -> CliResult<WalkReport> {
    let progress = Progress::start();
    let mut pages = 0;
    let mut seen = 0;

    for skip in offsets(max_skip) {
        let url = query.url(ctx, skip)?;
        let reply = ctx.get(url).await?;
        let outcome = classify_response(reply.status, &reply.body);
        tracing::debug!(skip = skip.unwrap_or(0), status = reply.status, "classified page");

        let stop = match outcome {
            FetchOutcome::Ok(page) if page.has_more() => {
                pages += 1;
                for entry in page.into_entries() {
                    seen += 1;
                    if filter.matches(&entry, ctx.convention) {
                        progress.suspend(|| sink.record(entry))?;
                    }
                }
                progress.update(pages, seen, sink.count());
                continue;
            }
            FetchOutcome::Ok(_) | FetchOutcome::EndOfLog => StopReason::EndOfLog,
            FetchOutcome::TransientServerError => StopReason::ServerClosed,
            FetchOutcome::Fatal { status, body } => StopReason::Fatal { status, body },
        };
        return Ok(WalkReport { pages, seen, stop });
    }

    tracing::warn!(max_skip, "stopped at the page limit before the end of the log");
    Ok(WalkReport {
        pages,
        seen,
        stop: StopReason::PageLimit,
    })
}

/// Spinner on stderr; hidden when stderr is not a terminal.
struct Progress {
    bar: ProgressBar,
}

impl Progress {
    fn start() -> Self {
        let bar = if io::stderr().is_terminal() {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]")
        {
            bar.set_style(style);
        }
        bar.set_message("fetching Lifecycle log");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    fn update(&self, pages: usize, seen: usize, matched: usize) {
        self.bar
            .set_message(format!("{pages} pages, {seen} entries read, {matched} matched"));
    }

    fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}
