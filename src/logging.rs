use colored::*;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// A custom tracing event formatter for colorizing log output based on level.
///
/// Provides clean, user-facing output where the entire log line is colored
/// according to its severity level, without timestamps or level prefixes.
pub struct ColorizedFormatter;

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
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
        let mut buffer = String::new();
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let colored_output = match *event.metadata().level() {
            Level::INFO => buffer.white(),
            Level::WARN => buffer.yellow(),
            Level::ERROR => buffer.red(),
            Level::DEBUG => buffer.blue(),
            Level::TRACE => buffer.purple(),
        };

        writeln!(writer, "{}", colored_output)
    }
}

/// Initializes the global tracing subscriber: a colorized stdout layer
/// (suppressed by `-q`) plus a plain stderr layer that always receives
/// diagnostics at the level selected by `-v`.
///
/// Returns a guard; dropping it flushes any buffered output. Callers must
/// keep the guard alive for the life of the process.
pub fn init(verbose: u8, quiet: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let (stderr_writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let diagnostic_layer = tracing_subscriber::fmt::layer()
        .with_writer(stderr_writer)
        .with_filter(EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(diagnostic_layer);

    if quiet {
        registry.init();
    } else {
        let human_layer = tracing_subscriber::fmt::layer()
            .event_format(ColorizedFormatter)
            .with_writer(std::io::stdout)
            .with_filter(EnvFilter::new(Level::INFO.to_string()));
        registry.with(human_layer).init();
    }

    guard
}
