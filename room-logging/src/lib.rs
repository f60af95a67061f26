//! Process-wide tracing setup, driven by environment variables:
//!
//! - `LOG_LEVEL`: filter directive, default `info` (`RUST_LOG` wins when set)
//! - `LOG_FORMAT`: `human` or `json`
//! - `LOG_OUTPUT`: `console`, `file`, `both` or `none`; anything else logs to the console
//! - `LOG_FILE_PATH`: daily-rotated log file, default `/tmp/rooms.log`

use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::MakeWriter, prelude::*, registry, EnvFilter};

const DEFAULT_LOG_FILE: &str = "/tmp/rooms.log";

/// Writes every line to both sinks.
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    /// Events are filtered but not written anywhere.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file_path: PathBuf,
    /// Unrecognized `LOG_OUTPUT` value, reported once logging is up.
    pub unknown_output: Option<String>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup; unknown values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };
        let raw_output = lookup("LOG_OUTPUT");
        let output = match raw_output.as_deref() {
            None | Some("console") => LogOutput::Console,
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            Some("none") => LogOutput::None,
            Some(_) => LogOutput::Console,
        };
        let unknown_output = raw_output
            .filter(|v| !matches!(v.as_str(), "console" | "file" | "both" | "none"));

        Self {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format,
            output,
            file_path: lookup("LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            unknown_output,
        }
    }

    fn file_location(&self) -> (&Path, &Path) {
        let dir = self
            .file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("/tmp"));
        let name = self
            .file_path
            .file_name()
            .map(Path::new)
            .unwrap_or_else(|| Path::new("rooms.log"));
        (dir, name)
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        for noisy in ["tokio=warn", "hyper=warn", "reqwest=warn"] {
            if let Ok(directive) = noisy.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }
}

/// Initializes the global tracing subscriber from `LOG_*` environment variables.
///
/// Keep the returned guard alive for the life of the process when logging to a
/// file; dropping it flushes and stops the background writer.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogSettings::from_env())
}

pub fn init_with(settings: &LogSettings) -> Option<WorkerGuard> {
    let subscriber = registry().with(settings.env_filter());
    let is_json = settings.format == LogFormat::Json;

    let file_writer = || {
        let (dir, name) = settings.file_location();
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name))
    };

    macro_rules! install {
        ($writer:expr, ansi = $ansi:expr) => {{
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi($ansi)
                .with_writer($writer);
            if is_json {
                subscriber.with(fmt_layer.json()).init();
            } else {
                subscriber.with(fmt_layer).init();
            }
        }};
    }

    let guard = match settings.output {
        LogOutput::Console => {
            install!(io::stdout, ansi = true);
            None
        }
        LogOutput::File => {
            let (writer, guard) = file_writer();
            install!(writer, ansi = false);
            Some(guard)
        }
        LogOutput::Both => {
            let (writer, guard) = file_writer();
            install!(MakeTee {
                make_a: io::stdout,
                make_b: writer,
            }, ansi = false);
            Some(guard)
        }
        LogOutput::None => {
            subscriber.init();
            None
        }
    };

    if let Some(value) = &settings.unknown_output {
        tracing::warn!(value = %value, "Unknown LOG_OUTPUT, logging to console");
    }
    guard
}
