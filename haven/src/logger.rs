use std::sync::Arc;

/// Sink for library components that log through an injected handle
trait HavenLogger: Send + Sync {
    fn info(&self, msg: &str);
    fn debug(&self, msg: &str);
    fn warn(&self, msg: &str);
}

/// Discards everything (tests, embedding without a subscriber)
struct NullLogger;

impl HavenLogger for NullLogger {
    fn info(&self, _msg: &str) {}
    fn debug(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
}

/// Forwards to the global tracing subscriber
struct TracingLogger {
    component: &'static str,
}

impl HavenLogger for TracingLogger {
    fn info(&self, msg: &str) {
        tracing::info!(component = self.component, "{}", msg);
    }
    fn debug(&self, msg: &str) {
        tracing::debug!(component = self.component, "{}", msg);
    }
    fn warn(&self, msg: &str) {
        tracing::warn!(component = self.component, "{}", msg);
    }
}

#[derive(Clone)]
pub struct LoggerHandle {
    logger: Arc<dyn HavenLogger>,
}

impl LoggerHandle {
    pub fn null() -> Self {
        LoggerHandle {
            logger: Arc::new(NullLogger),
        }
    }

    /// Tracing-backed logger tagging every event with `component`.
    pub fn tracing(component: &'static str) -> Self {
        LoggerHandle {
            logger: Arc::new(TracingLogger { component }),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        self.logger.info(msg);
    }

    pub(crate) fn debug(&self, msg: &str) {
        self.logger.debug(msg);
    }

    pub(crate) fn warn(&self, msg: &str) {
        self.logger.warn(msg);
    }
}

impl std::fmt::Debug for LoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LoggerHandle")
    }
}

/// Convenient macros for logging with format arguments
macro_rules! linfo {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
    };
}

macro_rules! ldebug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
    };
}

macro_rules! lwarn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
    };
}

pub(crate) use ldebug;
pub(crate) use linfo;
pub(crate) use lwarn;
