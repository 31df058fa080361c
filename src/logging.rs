//! tracing-subscriber setup for the binary.
//!
//! Console events go to stderr so stdout stays usable for `--json` output.
//! A configured log file gets a second, non-blocking layer with the same format.

use anyhow::Result;
use chrono::Local;
use part_move::output as out;
use part_move::platform::open_log_file_secure_append;
use part_move::{LogLevel, path_has_symlink_ancestor};
use std::fmt as stdfmt;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Local wall-clock time, `DD/MM/YY HH:MM:SS`.
struct LocalStamp;

impl FormatTime for LocalStamp {
    fn format_time(&self, w: &mut tsfmt::format::Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Local::now().format("%d/%m/%y %H:%M:%S"))
    }
}

fn level_filter(lvl: LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::INFO,
        LogLevel::Info => LevelFilter::DEBUG,
        LogLevel::Debug => LevelFilter::TRACE,
    }
}

fn fmt_layer<W>(writer: W, json: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tsfmt::layer()
        .with_writer(writer)
        .with_timer(LocalStamp)
        .with_target(true)
        .with_thread_names(true);
    match json {
        true => layer.json().boxed(),
        false => layer.compact().boxed(),
    }
}

fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), String> {
    match path_has_symlink_ancestor(path) {
        Ok(false) => {}
        Ok(true) => return Err("a parent directory is a symlink".to_string()),
        Err(e) => return Err(format!("could not inspect the path: {e}")),
    }
    open_log_file_secure_append(path)
        .map(tracing_appender::non_blocking)
        .map_err(|e| format!("could not open it: {e}"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file layer when dropped. A log file that
/// cannot be used is reported and skipped; console logging still starts.
pub fn init_tracing(
    lvl: LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(std::io::stderr, json)];
    let mut guard = None;

    if let Some(path) = log_file {
        match file_writer(path) {
            Ok((writer, g)) => {
                layers.push(fmt_layer(writer, json));
                guard = Some(g);
            }
            Err(reason) => out::print_warn(&format!(
                "file logging to '{}' disabled, {reason}; logging to stderr only",
                path.display()
            )),
        }
    }

    let filter = EnvFilter::default().add_directive(level_filter(lvl).into());
    registry().with(layers).with(filter).try_init()?;
    Ok(guard)
}
