use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::Level;

pub struct DelegatingWriter {
    inner: DelegatingInner,
}

enum DelegatingInner {
    File(Arc<Mutex<File>>),
    Stderr(io::Stderr),
}

impl DelegatingWriter {
    fn new(file: Option<Arc<Mutex<File>>>) -> Self {
        match file {
            Some(file) => DelegatingWriter {
                inner: DelegatingInner::File(file),
            },
            None => DelegatingWriter {
                inner: DelegatingInner::Stderr(io::stderr()),
            },
        }
    }
}

fn poisoned() -> io::Error {
    io::Error::other("log file lock poisoned")
}

impl Write for DelegatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            DelegatingInner::File(f) => f.lock().map_err(|_| poisoned())?.write(buf),
            DelegatingInner::Stderr(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            DelegatingInner::File(f) => f.lock().map_err(|_| poisoned())?.flush(),
            DelegatingInner::Stderr(s) => s.flush(),
        }
    }
}

/// Hands out writers to the log file when one is configured, stderr otherwise.
/// The terminal host owns the screen, so it always logs to a file.
#[derive(Clone, Debug, Default)]
pub struct SubscriberMakeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl SubscriberMakeWriter {
    pub fn stderr() -> Self {
        Self::default()
    }

    /// Append to `path`, creating it if needed.
    pub fn file(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SubscriberMakeWriter {
    type Writer = DelegatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DelegatingWriter::new(self.file.clone())
    }
}

/// Install the global subscriber at `level`, writing to `log_file` when given.
/// Safe to call multiple times; later calls leave the first subscriber in
/// place. Only opening the log file can fail.
pub fn init(level: Level, log_file: Option<&Path>) -> io::Result<()> {
    let writer = match log_file {
        Some(path) => SubscriberMakeWriter::file(path)?,
        None => SubscriberMakeWriter::stderr(),
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_target(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}

/// Debug-level logging to stderr.
pub fn init_default() {
    let _ = init(Level::DEBUG, None);
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[test]
    fn file_writer_appends() {
        let path = std::env::temp_dir().join(format!("shell-wm-log-{}.txt", std::process::id()));
        let _ = fs::remove_file(&path);
        let make = SubscriberMakeWriter::file(&path).unwrap();
        make.make_writer().write_all(b"first\n").unwrap();
        make.make_writer().write_all(b"second\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        let _ = fs::remove_file(&path);
    }
}
