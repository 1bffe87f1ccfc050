use std::io::Write;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Sends log lines to stderr so command output on stdout stays machine
/// readable. `muted` drops everything.
#[derive(Clone)]
pub(crate) struct StderrMakeWriter {
    pub muted: bool,
}

impl<'a> MakeWriter<'a> for StderrMakeWriter {
    type Writer = StderrWriter;

    fn make_writer(&'a self) -> Self::Writer {
        StderrWriter { muted: self.muted }
    }
}

pub(crate) struct StderrWriter {
    muted: bool,
}

impl Write for StderrWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if !self.muted {
            std::io::stderr().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.muted {
            std::io::stderr().flush()?;
        }
        Ok(())
    }
}

/// Unknown names fall back to `info`; "off" mutes output.
pub(crate) fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => None,
        other => Some(Level::from_str(other).unwrap_or(Level::INFO)),
    }
}

pub(crate) fn init(level: &str, verbose: bool) {
    let level = if verbose {
        Some(Level::DEBUG)
    } else {
        parse_level(level)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level.unwrap_or(Level::ERROR))
        .with_writer(StderrMakeWriter {
            muted: level.is_none(),
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
