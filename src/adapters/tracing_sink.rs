//! Event sink that forwards to `tracing`.

use crate::ports::event_port::EventSink;

/// Emits each event as a `tracing` record tagged with the component name.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    component: &'static str,
}

impl TracingSink {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new("cotrader")
    }
}

impl EventSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!(component = self.component, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(component = self.component, "{}", message);
    }
}

/// Install the stderr subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
