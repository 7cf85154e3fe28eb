use parking_lot::Mutex;
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Severe,
}

/// Fire-and-forget sink for loader and runtime messages.
pub trait ScriptLogger: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn severe(&self, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ScriptLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "script", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "script", "{message}");
    }

    fn severe(&self, message: &str) {
        tracing::error!(target: "script", "{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Keeps every message so a host can replay or inspect them.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message.clone())
            .collect()
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.entries.lock().push(LogEntry { level, message: message.to_string() });
    }
}

impl ScriptLogger for MemoryLogger {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn severe(&self, message: &str) {
        self.push(LogLevel::Severe, message);
    }
}

pub fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt().with_max_level(level).with_target(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_logger_filters_by_level_and_drains() {
        let logger = MemoryLogger::new();
        logger.warn("plugins/ghost.rhai not found");
        logger.severe("Error evaluating plugins/bad.rhai");
        logger.info("hello");
        assert_eq!(logger.messages(LogLevel::Warn), vec!["plugins/ghost.rhai not found".to_string()]);
        assert_eq!(logger.take().len(), 3);
        assert!(logger.take().is_empty(), "take should drain entries");
    }
}
