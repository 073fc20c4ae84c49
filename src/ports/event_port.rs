//! Reporting sink injected into the feature builder, engine and driver.

/// Receives progress and diagnostic events from domain components.
///
/// Components never log through a process-wide logger; callers choose the
/// sink, so tests can capture output deterministically.
pub trait EventSink: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
