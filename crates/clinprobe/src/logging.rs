//! Log formatting and sinks.
//!
//! Every event becomes one line `YYYY-mm-dd HH:MM:SS <tag> <message>`. The
//! tag comes from a `tag = "..."` field, or from the level when absent, and is
//! rendered as an emoji or as an ASCII bracket tag depending on what the
//! console can display. The same line goes to stdout and to the log file; the
//! file is opened, appended and closed for every line.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::result::{ProbeError, ProbeResult};

/// Timestamp layout of every line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// TAGS
// =============================================================================

/// Severity or activity tag carried by a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Success
    Ok,
    /// Warning
    Alert,
    /// Failure
    Error,
    /// Waiting or timing
    Waiting,
    /// Something is starting
    Starting,
    /// A check is running
    Checking,
    /// Environment setup
    Configuring,
    /// Extracted data
    Data,
    /// Plain information
    Info,
    /// Diagnostics
    Debug,
}

impl Tag {
    /// Parse the value of a `tag` field
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "ok" => Self::Ok,
            "alert" | "warn" => Self::Alert,
            "error" => Self::Error,
            "waiting" => Self::Waiting,
            "starting" => Self::Starting,
            "checking" => Self::Checking,
            "configuring" => Self::Configuring,
            "data" => Self::Data,
            "info" => Self::Info,
            "debug" => Self::Debug,
            _ => return None,
        })
    }

    /// Tag used when an event carries none
    #[must_use]
    pub fn for_level(level: Level) -> Self {
        match level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Alert,
            Level::INFO => Self::Info,
            Level::DEBUG | Level::TRACE => Self::Debug,
        }
    }
}

/// How tags are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagStyle {
    /// Emoji such as ✅
    #[default]
    Emoji,
    /// Bracket tags such as `[OK]`
    Ascii,
}

impl TagStyle {
    /// Pick a style from the locale the console declares (`LC_ALL`, then
    /// `LC_CTYPE`, then `LANG`).
    #[must_use]
    pub fn detect() -> Self {
        let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|v| !v.is_empty());
        Self::from_locale(locale.as_deref())
    }

    /// Emoji only when the locale names a UTF-8 codeset
    #[must_use]
    pub fn from_locale(locale: Option<&str>) -> Self {
        let utf8 = locale.is_some_and(|l| {
            let l = l.to_ascii_lowercase();
            l.contains("utf-8") || l.contains("utf8")
        });
        if utf8 {
            Self::Emoji
        } else {
            Self::Ascii
        }
    }

    /// Text for `tag` in this style
    #[must_use]
    pub const fn render(self, tag: Tag) -> &'static str {
        match self {
            Self::Emoji => match tag {
                Tag::Ok => "✅",
                Tag::Alert => "⚠️",
                Tag::Error => "❌",
                Tag::Waiting => "⏳",
                Tag::Starting => "🚀",
                Tag::Checking => "🔍",
                Tag::Configuring => "🔧",
                Tag::Data => "📋",
                Tag::Info => "ℹ️",
                Tag::Debug => "🐛",
            },
            Self::Ascii => match tag {
                Tag::Ok => "[OK]",
                Tag::Alert => "[ALERTA]",
                Tag::Error => "[ERRO]",
                Tag::Waiting => "[AGUARDANDO]",
                Tag::Starting => "[INICIANDO]",
                Tag::Checking => "[VERIFICANDO]",
                Tag::Configuring => "[CONFIGURANDO]",
                Tag::Data => "[DADOS]",
                Tag::Info => "[INFO]",
                Tag::Debug => "[DEBUG]",
            },
        }
    }
}

// =============================================================================
// FORMATTER
// =============================================================================

#[derive(Default)]
struct LineVisitor {
    message: String,
    tag: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "tag" => self.tag = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.fields.push((name, value.to_string())),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "tag" => self.tag = Some(format!("{value:?}").trim_matches('"').to_string()),
            name => self.fields.push((name, format!("{value:?}"))),
        }
    }
}

/// Event formatter producing tagged lines
#[derive(Debug, Clone, Copy, Default)]
pub struct TagFormatter {
    style: TagStyle,
}

impl TagFormatter {
    /// Formatter rendering tags in `style`
    #[must_use]
    pub const fn new(style: TagStyle) -> Self {
        Self { style }
    }
}

impl<S, N> FormatEvent<S, N> for TagFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let tag = visitor
            .tag
            .as_deref()
            .and_then(Tag::parse)
            .unwrap_or_else(|| Tag::for_level(*event.metadata().level()));

        write!(
            writer,
            "{} {} {}",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            self.style.render(tag),
            visitor.message
        )?;
        for (name, value) in &visitor.fields {
            write!(writer, " {name}={value}")?;
        }
        writeln!(writer)
    }
}

// =============================================================================
// FILE SINK
// =============================================================================

/// Writer factory appending each line to a file, opening it per line
#[derive(Debug, Clone)]
pub struct AppendFile {
    path: PathBuf,
}

impl AppendFile {
    /// Sink for `path`; the file is created on the first line
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Buffered line written to the file on drop
#[derive(Debug)]
pub struct AppendLine {
    path: PathBuf,
    buf: Vec<u8>,
}

impl Write for AppendLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for AppendLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(&self.buf));
        if let Err(err) = appended {
            eprintln!("cannot append to log file '{}': {err}", self.path.display());
        }
    }
}

impl<'a> MakeWriter<'a> for AppendFile {
    type Writer = AppendLine;

    fn make_writer(&'a self) -> Self::Writer {
        AppendLine {
            path: self.path.clone(),
            buf: Vec::new(),
        }
    }
}

/// Install the global subscriber: tagged lines to stdout and `log_file`.
///
/// The level filter comes from `RUST_LOG`, defaulting to `info`.
///
/// # Errors
///
/// `InvalidInput` if a global subscriber is already installed
pub fn init_logging(log_file: &Path, style: TagStyle) -> ProbeResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sink = io::stdout.and(AppendFile::new(log_file));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(TagFormatter::new(style))
                .with_ansi(false)
                .with_writer(sink),
        )
        .try_init()
        .map_err(|e| ProbeError::invalid_input(format!("logging already initialised: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::writer::BoxMakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn with_capture(style: TagStyle, file: Option<&Path>, f: impl FnOnce()) -> Captured {
        let captured = Captured::default();
        let console = captured.clone();
        let writer = match file {
            Some(path) => BoxMakeWriter::new((move || console.clone()).and(AppendFile::new(path))),
            None => BoxMakeWriter::new(move || console.clone()),
        };
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .event_format(TagFormatter::new(style))
                .with_ansi(false)
                .with_writer(writer),
        );
        tracing::subscriber::with_default(subscriber, f);
        captured
    }

    mod style_tests {
        use super::*;

        #[test]
        fn test_utf8_locales_get_emoji() {
            assert_eq!(TagStyle::from_locale(Some("pt_BR.UTF-8")), TagStyle::Emoji);
            assert_eq!(TagStyle::from_locale(Some("C.utf8")), TagStyle::Emoji);
        }

        #[test]
        fn test_other_locales_get_ascii() {
            assert_eq!(TagStyle::from_locale(Some("C")), TagStyle::Ascii);
            assert_eq!(TagStyle::from_locale(Some("pt_BR.ISO-8859-1")), TagStyle::Ascii);
            assert_eq!(TagStyle::from_locale(None), TagStyle::Ascii);
        }

        #[test]
        fn test_ascii_tags() {
            assert_eq!(TagStyle::Ascii.render(Tag::Ok), "[OK]");
            assert_eq!(TagStyle::Ascii.render(Tag::Alert), "[ALERTA]");
            assert_eq!(TagStyle::Ascii.render(Tag::Error), "[ERRO]");
            assert_eq!(TagStyle::Ascii.render(Tag::Waiting), "[AGUARDANDO]");
            assert_eq!(TagStyle::Ascii.render(Tag::Starting), "[INICIANDO]");
            assert_eq!(TagStyle::Ascii.render(Tag::Checking), "[VERIFICANDO]");
            assert_eq!(TagStyle::Ascii.render(Tag::Configuring), "[CONFIGURANDO]");
        }

        #[test]
        fn test_level_defaults() {
            assert_eq!(Tag::for_level(Level::ERROR), Tag::Error);
            assert_eq!(Tag::for_level(Level::WARN), Tag::Alert);
            assert_eq!(Tag::parse("waiting"), Some(Tag::Waiting));
            assert_eq!(Tag::parse("nonsense"), None);
        }
    }

    #[test]
    fn test_tag_field_overrides_level() {
        let captured = with_capture(TagStyle::Ascii, None, || {
            tracing::info!(tag = "waiting", "Action 'Login' finished in 1.00 seconds");
            tracing::warn!("Panel still closed");
        });

        let lines = captured.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[AGUARDANDO] Action 'Login' finished in 1.00 seconds"));
        assert!(lines[1].ends_with("[ALERTA] Panel still closed"));
    }

    #[test]
    fn test_emoji_style() {
        let captured = with_capture(TagStyle::Emoji, None, || {
            tracing::error!("Login failed");
        });
        assert!(captured.lines()[0].ends_with("❌ Login failed"));
    }

    #[test]
    fn test_extra_fields_are_appended() {
        let captured = with_capture(TagStyle::Ascii, None, || {
            tracing::info!(patient = "42", "Deleting");
        });
        assert!(captured.lines()[0].ends_with("[INFO] Deleting patient=42"));
    }

    #[test]
    fn test_console_and_file_lines_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let captured = with_capture(TagStyle::Ascii, Some(&path), || {
            tracing::info!(tag = "ok", "Patient registered");
            tracing::error!("Timeout");
        });

        let file = std::fs::read_to_string(&path).unwrap();
        let file_lines: Vec<&str> = file.lines().collect();
        assert_eq!(file_lines[0], "previous run");
        let captured_owned = captured.lines();
        let captured_lines: Vec<&str> = captured_owned.iter().map(String::as_str).collect();
        assert_eq!(&file_lines[1..], captured_lines);
    }
}
