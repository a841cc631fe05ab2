use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

use crate::error::{BenchError, Result};

/// Buffered file sink for one scenario's gateway logs
///
/// Cloning is cheap; all clones write to the same file. After [`LogSink::close`]
/// further writes are accepted and discarded, so late events from draining
/// connections cannot fail the logging pipeline.
#[derive(Clone, Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl LogSink {
    /// Create the sink, replacing any file left at `path` by a previous run
    pub fn create(path: &Path) -> Result<Self> {
        let to_sink_error = |source| BenchError::Sink {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(to_sink_error)?;
        }
        if path.exists() {
            fs::remove_file(path).map_err(to_sink_error)?;
        }
        let file = File::create(path).map_err(to_sink_error)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the sink still accepts output
    pub fn is_open(&self) -> bool {
        self.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Flush buffered output, sync it to disk and detach the file
    pub fn close(&self) -> Result<()> {
        let to_sink_error = |source| BenchError::Sink {
            path: self.path.clone(),
            source,
        };

        let mut guard = self.lock().map_err(to_sink_error)?;
        if let Some(mut writer) = guard.take() {
            writer.flush().map_err(to_sink_error)?;
            writer.get_ref().sync_all().map_err(to_sink_error)?;
        }
        Ok(())
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Option<BufWriter<File>>>> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink lock poisoned"))
    }
}

/// Writer handed to the `fmt` layer for a single event
pub struct SinkWriter<'a> {
    sink: &'a LogSink,
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.sink.lock()?.as_mut() {
            Some(writer) => writer.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.lock()?.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter { sink: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sink.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale contents from a previous run").unwrap();

        let sink = LogSink::create(&path).unwrap();
        sink.close().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_close_flushes_buffered_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sink.log");
        let sink = LogSink::create(&path).unwrap();

        sink.make_writer().write_all(b"hello sink\n").unwrap();
        assert!(sink.is_open());
        sink.close().unwrap();
        assert!(!sink.is_open());

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello sink\n");
    }

    #[test]
    fn test_close_is_idempotent_and_discards_late_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sink.log");
        let sink = LogSink::create(&path).unwrap();

        sink.close().unwrap();
        sink.close().unwrap();
        sink.make_writer().write_all(b"too late").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
