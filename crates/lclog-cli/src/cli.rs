//! Argument parsing and command dispatch.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser};
use lclog_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::client::{
    CliError, CliResult, SessionContext, build_http_client, parse_ssl, parse_url,
    resolve_base_url, resolve_credentials,
};
use crate::commands::logs::{LogsOptions, RetrievalMode, handle_logs};
use crate::commands::probe::{detect_convention, probe};
use crate::filter::{Category, EntryFilter, IdConvention, Severity};
use crate::output::OutputFormat;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SCRIPT_EXAMPLES: &str = "\
- lclog --ip 192.168.0.120 -u root -p calvin --get-all
    get the complete iDRAC LC logs.

- lclog --ip 192.168.0.120 -u root -p calvin --get-fail
    get only failed entries from LC logs.

- lclog --ip 192.168.0.120 -u root -p calvin --get-message-id WRK0001
    get only entries with message ID WRK0001.

- lclog --ip 192.168.0.120 -u root -p calvin --get-severity critical
    return only critical entries detected.

- lclog --ip 192.168.0.120 -u root -p calvin --get-category systemhealth
    return only system health category entries detected.

- lclog --ip 192.168.0.120 -u root -p calvin --get-date-range \\
      --start-date 2023-03-15T14:55:10-05:00 --end-date 2023-03-15T14:57:07-05:00
    return only LC log entries within this start and end date range.";

#[derive(Parser, Debug)]
#[command(
    name = "lclog",
    version,
    about = "Get iDRAC Lifecycle Controller (LC) logs over Redfish: all entries or a filtered subset"
)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args([
            "get_all",
            "get_severity",
            "get_category",
            "get_date_range",
            "get_fail",
            "get_message_id",
            "script_examples",
        ])
))]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct Cli {
    #[arg(short = 'i', long = "ip", env = "IDRAC_HOST", help = "iDRAC IP address or hostname")]
    host: Option<String>,
    #[arg(long, env = "IDRAC_BASE_URL", value_parser = parse_url, hide = true)]
    base_url: Option<Url>,
    #[arg(short = 'u', long, env = "IDRAC_USERNAME", help = "iDRAC username")]
    username: Option<String>,
    #[arg(
        short = 'p',
        long,
        env = "IDRAC_PASSWORD",
        hide_env_values = true,
        help = "iDRAC password; prompted for without echo when omitted"
    )]
    password: Option<String>,
    #[arg(
        short = 'x',
        long = "token",
        env = "IDRAC_X_AUTH_TOKEN",
        hide_env_values = true,
        help = "X-Auth session token used instead of username/password"
    )]
    token: Option<String>,
    #[arg(
        long,
        env = "IDRAC_SSL",
        value_name = "true|false",
        value_parser = parse_ssl,
        action = ArgAction::Set,
        default_value = "false",
        help = "Verify the controller TLS certificate"
    )]
    ssl: bool,
    #[arg(long, env = "IDRAC_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Console format for matched entries"
    )]
    output: OutputFormat,
    #[arg(
        long,
        env = "IDRAC_OUTPUT_DIR",
        default_value = ".",
        help = "Directory for the exported text artifacts"
    )]
    output_dir: PathBuf,
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, help = "Diagnostics level (RUST_LOG overrides)")]
    log_level: String,
    #[arg(long, value_parser = parse_log_format, help = "Diagnostics format: pretty or json")]
    log_format: Option<LogFormat>,
    #[arg(
        long,
        env = "IDRAC_STRICT_EXIT",
        help = "Exit non-zero on failures (default always exits 0)"
    )]
    strict_exit: bool,

    #[arg(long, help = "Get all iDRAC LC logs")]
    get_all: bool,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Only entries of one severity: informational, warning or critical"
    )]
    get_severity: Option<String>,
    #[arg(
        long,
        value_name = "CATEGORY",
        help = "Only entries of one category: audit, configuration, updates, systemhealth or storage"
    )]
    get_category: Option<String>,
    #[arg(
        long,
        requires_all = ["start_date", "end_date"],
        help = "Only entries between --start-date and --end-date"
    )]
    get_date_range: bool,
    #[arg(
        long,
        requires = "get_date_range",
        value_name = "TIMESTAMP",
        help = "Range start, e.g. 2023-03-14T10:10:10-05:00"
    )]
    start_date: Option<String>,
    #[arg(
        long,
        requires = "get_date_range",
        value_name = "TIMESTAMP",
        help = "Range end, e.g. 2023-03-15T14:55:10-05:00"
    )]
    end_date: Option<String>,
    #[arg(long, help = "Only failed entries (keywords: unable, fail, error)")]
    get_fail: bool,
    #[arg(
        long,
        value_name = "IDS",
        help = "Only entries for the given message ID(s), comma separated"
    )]
    get_message_id: Option<String>,
    #[arg(long, help = "Print usage examples and exit")]
    script_examples: bool,
}

impl Cli {
    /// Resolve the selected mode, validating filter values before any request.
    fn retrieval_mode(&self) -> CliResult<RetrievalMode> {
        if self.get_all {
            return Ok(RetrievalMode::All);
        }
        if let Some(level) = &self.get_severity {
            return Ok(RetrievalMode::Severity(Severity::parse(level)?));
        }
        if let Some(category) = &self.get_category {
            return Ok(RetrievalMode::Category(Category::parse(category)?));
        }
        if self.get_date_range {
            return match (&self.start_date, &self.end_date) {
                (Some(start), Some(end)) => Ok(RetrievalMode::DateRange {
                    start: start.trim().to_string(),
                    end: end.trim().to_string(),
                }),
                _ => Err(CliError::validation(
                    "--get-date-range requires --start-date and --end-date",
                )),
            };
        }
        if self.get_fail {
            return Ok(RetrievalMode::Fail);
        }
        if let Some(ids) = &self.get_message_id {
            EntryFilter::message_ids(ids)?;
            return Ok(RetrievalMode::MessageId(ids.trim().to_string()));
        }
        Err(CliError::validation(
            "no retrieval mode selected; see --help or --script-examples",
        ))
    }
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    lclog_telemetry::log_format_from_str(input).map_err(|err| err.to_string())
}

/// Parses process arguments and executes the requested retrieval. Returns the
/// process exit code.
pub async fn run() -> i32 {
    run_from(std::env::args_os()).await
}

/// Parses `args` (including the binary name) and executes the requested
/// retrieval. Returns the process exit code: always `0` after argument
/// parsing unless `--strict-exit` is set.
pub async fn run_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let code = err.exit_code();
            let _ = err.print();
            return code;
        }
    };

    install_logging(&cli);
    let strict_exit = cli.strict_exit;

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            if strict_exit { err.exit_code() } else { 0 }
        }
    }
}

fn logging_config(cli: &Cli) -> LoggingConfig<'_> {
    LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_sha: env!("CARGO_PKG_VERSION"),
    }
}

fn install_logging(cli: &Cli) {
    if let Err(err) = init_logging(&logging_config(cli)) {
        tracing::debug!(error = %err, "keeping previously installed subscriber");
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    if cli.script_examples {
        println!("{SCRIPT_EXAMPLES}");
        return Ok(());
    }

    let mode = cli.retrieval_mode()?;
    let options = LogsOptions {
        output_dir: cli.output_dir,
        format: cli.output,
    };
    let base_url = resolve_base_url(cli.base_url, cli.host.as_deref())?;
    let credentials = resolve_credentials(cli.username, cli.password, cli.token)?;
    let ctx = SessionContext {
        client: build_http_client(cli.ssl, cli.timeout)?,
        base_url,
        credentials,
        verify_tls: cli.ssl,
        convention: IdConvention::New,
    };

    let span = tracing::info_span!(
        "retrieval",
        trace_id = %Uuid::new_v4(),
        build = lclog_telemetry::build_sha(),
        mode = mode.label()
    );
    async move {
        probe(&ctx).await?;
        let convention = detect_convention(&ctx).await?;
        let ctx = ctx.with_convention(convention);
        handle_logs(&ctx, &mode, &options).await
    }
    .instrument(span)
    .await
}
