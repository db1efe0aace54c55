//! Version-tagged diagnostic sink for the worker.
//!
//! Every line carries the `version` of the worker generation that produced
//! it. Debug lines are dropped unless the generation was configured with
//! `debug = true`, independent of the global subscriber filter.

use serde_json::Value;

/// Logger shared by every worker component.
#[derive(Debug, Clone)]
pub struct Logger {
    version: String,
    debug: bool,
}

impl Logger {
    pub fn new(version: impl Into<String>, debug: bool) -> Self {
        Self { version: version.into(), debug }
    }

    pub fn info(&self, message: &str, context: Option<&Value>) {
        tracing::info!(version = %self.version, context = %render(context), "{message}");
    }

    pub fn error(&self, message: &str, context: Option<&Value>) {
        tracing::error!(version = %self.version, context = %render(context), "{message}");
    }

    pub fn debug(&self, message: &str, context: Option<&Value>) {
        if self.debug {
            tracing::debug!(version = %self.version, context = %render(context), "{message}");
        }
    }
}

fn render(context: Option<&Value>) -> String {
    context.map(Value::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_lines_are_version_tagged() {
        let logger = Logger::new("2.2.2", false);
        let out = capture(|| logger.info("installed", Some(&serde_json::json!({"cached": 6}))));
        assert!(out.contains("installed"));
        assert!(out.contains("version=2.2.2"));
        assert!(out.contains("cached"));
    }

    #[test]
    fn test_debug_gated_by_flag() {
        let quiet = Logger::new("2.2.2", false);
        let out = capture(|| quiet.debug("cache hit", None));
        assert!(!out.contains("cache hit"));

        let verbose = Logger::new("2.2.2", true);
        let out = capture(|| verbose.debug("cache hit", None));
        assert!(out.contains("cache hit"));
    }

    #[test]
    fn test_errors_always_emitted() {
        let logger = Logger::new("2.2.2", false);
        let out = capture(|| logger.error("precache failed", None));
        assert!(out.contains("precache failed"));
    }
}
