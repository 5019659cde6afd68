use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const DEFAULT_CAPACITY: usize = 64;

/// The most recent log lines, for an on-screen overlay.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        let Ok(mut lines) = self.lines.lock() else {
            return;
        };
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|lines| lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Forwards to env_logger and keeps a copy of every line it lets through.
pub struct BufferedLogger {
    inner: env_logger::Logger,
    buffer: LogBuffer,
}

impl BufferedLogger {
    pub fn new(inner: env_logger::Logger, buffer: LogBuffer) -> Self {
        Self { inner, buffer }
    }
}

impl Log for BufferedLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.inner.matches(record) {
            return;
        }
        self.buffer
            .push(format!("[{}] {}", record.level(), record.args()));
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Installs the logger at `Trace`; callers narrow it with `log::set_max_level`
/// once the config is known.
pub fn init(capacity: usize) -> Result<LogBuffer, log::SetLoggerError> {
    let inner = env_logger::builder()
        .filter_level(LevelFilter::Trace)
        .build();
    let buffer = LogBuffer::new(capacity);
    log::set_boxed_logger(Box::new(BufferedLogger::new(inner, buffer.clone())))?;
    log::set_max_level(LevelFilter::Trace);
    Ok(buffer)
}
