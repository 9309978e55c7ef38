// Logging module - routes tracing events into the dashboard scrollback
//
// While the dashboard owns the terminal, anything printed to stdout would
// garble the display. This layer formats each event as a delimited line
// (`time|LEVEL|target|message|`) and stages it like any other producer
// output, so log lines scroll with the rest of the history and show the
// module name as their class prefix.

use crate::engine::DashboardWriter;
use chrono::Local;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Tracing layer that writes events into a dashboard
pub struct DashboardLayer {
    writer: Mutex<DashboardWriter>,
    timestamp_format: String,
}

impl DashboardLayer {
    pub fn new(writer: DashboardWriter) -> Self {
        Self {
            writer: Mutex::new(writer),
            timestamp_format: "%H:%M:%S%.3f".to_string(),
        }
    }

    /// chrono format for the leading time field
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }
}

impl<S> Layer<S> for DashboardLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut line = String::new();
        // chrono reports a bad format string through fmt::Error
        if write!(line, "{}", Local::now().format(&self.timestamp_format)).is_err() {
            line.clear();
        }
        let _ = write!(
            line,
            "|{}|{}|{}|",
            metadata.level(),
            metadata.target(),
            visitor.finish()
        );
        line.push('\n');

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writer.write_all(line.as_bytes());
    }
}

/// Collects the message plus any extra fields as `key=value`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        // The delimiter and newlines would split the line
        let clean = |s: &str| s.replace(['|', '\n', '\r'], " ");
        if self.fields.is_empty() {
            clean(&self.message)
        } else if self.message.is_empty() {
            clean(&self.fields)
        } else {
            clean(&format!("{} {}", self.message, self.fields))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field, value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field, &format!("{:?}", value));
        }
    }
}

impl MessageVisitor {
    fn push_field(&mut self, field: &Field, value: &str) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Dashboard;
    use crate::input::ScriptedInput;
    use crate::surface::MemorySurface;
    use tracing_subscriber::layer::SubscriberExt;

    fn dashboard() -> Dashboard {
        Dashboard::builder(Config::default())
            .surface(MemorySurface::new(80, 10))
            .input(ScriptedInput::new())
            .without_builtin_components()
            .build()
            .unwrap()
    }

    #[test]
    fn test_events_become_history_lines() {
        let dashboard = dashboard();
        let subscriber =
            tracing_subscriber::registry().with(DashboardLayer::new(dashboard.writer()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app::net::server", "listening on {}", 8080);
            tracing::warn!(target: "app::db", retries = 3, "slow query");
        });
        dashboard.flush();

        assert_eq!(
            dashboard.history_lines(),
            vec!["[server] listening on 8080", "[db] slow query retries=3"]
        );
    }

    #[test]
    fn test_delimiters_in_messages_are_neutralised() {
        let dashboard = dashboard();
        let subscriber =
            tracing_subscriber::registry().with(DashboardLayer::new(dashboard.writer()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app", "a|b\nc");
        });
        dashboard.flush();

        assert_eq!(dashboard.history_lines(), vec!["[app] a b c"]);
    }
}
