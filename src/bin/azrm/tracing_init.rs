// Initializes the tracing subscriber for the CLI binary.

use std::env;
use std::fmt;
use std::io::IsTerminal;

use chrono::SecondsFormat;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FmtSpan, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use azrm_rs::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";

const RESET: &str = "\x1b[0m";

/// `<timestamp> <level padded to 7>: <message> <fields>`, the level colored
/// when the writer accepts ANSI escapes.
struct LevelPaddedFormat {
    show_target: bool,
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        Level::TRACE => "trace",
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "",
        Level::DEBUG | Level::TRACE => "\x1b[32m",
    }
}

impl<S, N> FormatEvent<S, N> for LevelPaddedFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let timestamp = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let label = level_label(*metadata.level());

        if writer.has_ansi_escapes() {
            let color = level_color(*metadata.level());
            write!(writer, "{timestamp} {color}{label:>7}{RESET}: ")?;
        } else {
            write!(writer, "{timestamp} {label:>7}: ")?;
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}: ", span.name())?;
            }
        }
        if self.show_target {
            write!(writer, "{}: ", metadata.target())?;
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn init_tracing(config: &TracingConfig) {
    let fmt_span = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_ansi(!config.disable_color_tracing && std::io::stdout().is_terminal())
        .with_span_events(fmt_span);

    let mut show_target = true;
    let tracing_level = config.tracing_level;
    let event_filter = if config.http_tracing {
        format!(
            "azrm_rs={tracing_level},azrm={tracing_level},reqwest={tracing_level},hyper_util={tracing_level}"
        )
    } else if let Ok(filter) = env::var(EVENT_FILTER_ENV_VAR) {
        filter
    } else {
        show_target = false;
        format!("azrm_rs={tracing_level},azrm={tracing_level}")
    };

    let subscriber_builder = subscriber_builder.with_env_filter(event_filter);
    if config.json_tracing {
        subscriber_builder.with_target(show_target).json().init();
    } else {
        subscriber_builder
            .event_format(LevelPaddedFormat { show_target })
            .init();
    }
}
