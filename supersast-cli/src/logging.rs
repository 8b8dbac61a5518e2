//! Log and tool output go to stdout and, unless disabled, to the transcript file.

use anyhow::Context;
use camino::Utf8Path;
use fs_err as fs;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Handle to the shared output destinations.
#[derive(Debug, Clone, Default)]
pub struct Output {
    transcript: Option<Arc<std::fs::File>>,
}

impl Output {
    /// Create (truncate) the transcript file if one is requested.
    pub fn open(transcript: Option<&Utf8Path>) -> anyhow::Result<Self> {
        let transcript = match transcript {
            Some(path) => {
                let file = fs::File::create(path)
                    .with_context(|| format!("create transcript {}", path))?;
                Some(Arc::new(file.into_parts().0))
            }
            None => None,
        };
        Ok(Self { transcript })
    }

    /// Writer for tool output.
    pub fn sink(&self) -> TeeSink {
        TeeSink {
            transcript: self.transcript.clone(),
        }
    }

    /// Install the global subscriber. `RUST_LOG` overrides the `info` default.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false);
        match &self.transcript {
            Some(file) => builder
                .with_writer(io::stdout.and(Arc::clone(file)))
                .init(),
            None => builder.with_writer(io::stdout).init(),
        }
    }
}

/// Copies every write to stdout and the transcript.
#[derive(Debug, Clone)]
pub struct TeeSink {
    transcript: Option<Arc<std::fs::File>>,
}

impl Write for TeeSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = &self.transcript {
            let mut file: &std::fs::File = file;
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = &self.transcript {
            let mut file: &std::fs::File = file;
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sink_writes_to_transcript() {
        let dir = TempDir::new().expect("temp dir");
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("t.log")).expect("utf8");
        let output = Output::open(Some(&path)).expect("open");
        let mut sink = output.sink();
        sink.write_all(b"tool says hi\n").expect("write");
        sink.flush().expect("flush");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "tool says hi\n"
        );
    }

    #[test]
    fn no_transcript_creates_nothing() {
        let output = Output::open(None).expect("open");
        let mut sink = output.sink();
        sink.write_all(b"").expect("write");
    }
}
