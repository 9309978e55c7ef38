// Demo mode: a dashboard fed by a fake service log
//
// A producer thread emits log lines through tracing (so they pick up the
// `[module]` prefix) and occasionally writes raw lines directly. The rows
// show every built-in component plus a closure component counting lines.
//
// Run with: cargo run --release -- --line-delay-ms 50

use crate::cli::DemoArgs;
use crossterm::style::Color;
use headsup::components::FnComponent;
use headsup::engine::{names, Dashboard, DashboardBuilder, Shutdown};
use headsup::layout::{RowContentItem, RowSpec};
use headsup::render::OutputMode;
use headsup::text::TextBlock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const LINES_COMPONENT: &str = "lines";

/// Declare the demo rows and components on `builder`
pub fn declare(builder: DashboardBuilder, produced: Arc<AtomicU64>) -> DashboardBuilder {
    let mut help = TextBlock::new();
    help.line("The log below is generated; nothing is running.");

    builder
        .component(LINES_COMPONENT, move || {
            FnComponent::new(5, move |_| {
                format!("{} produced", produced.load(Ordering::Relaxed))
            })
        })
        .help_screen(help)
        .row(RowSpec::top("title", 0))
        .item(
            "title",
            RowContentItem::text("headsup demo").fg(Color::Cyan),
        )
        .item("title", RowContentItem::component(names::VERSION))
        .item(
            "title",
            RowContentItem::component(names::CLOCK)
                .param("%Y-%m-%d %H:%M:%S")
                .right(),
        )
        .row(RowSpec::bottom("status", 0))
        .item("status", RowContentItem::component(names::SCROLLBACK))
        .item("status", RowContentItem::component(names::SEARCH).center())
        .item(
            "status",
            RowContentItem::component(names::UPTIME).label("up ").right(),
        )
        .item(
            "status",
            RowContentItem::component(LINES_COMPONENT).right(),
        )
}

/// Fake service log line number `i`
fn emit(i: u64) {
    match i % 11 {
        0 => info!(target: "demo::net::gateway", request = i, "GET /api/items 200"),
        1 | 5 => debug!(target: "demo::cache", key = i % 97, "cache hit"),
        2 => info!(target: "demo::db::pool", "checked out connection"),
        3 => info!(target: "demo::net::gateway", request = i, "POST /api/orders 201"),
        4 => warn!(target: "demo::db::pool", waited_ms = 40 + i % 300, "slow checkout"),
        6 => info!(target: "demo::worker", job = i / 11, "job finished"),
        7 => debug!(target: "demo::cache", "evicted 12 entries"),
        8 if i % 3 == 0 => error!(target: "demo::net::upstream", "connection reset by peer"),
        _ => info!(target: "demo::worker", job = i / 11, "job queued"),
    }
}

/// Generate lines until `stop` fires or the line limit is reached
pub fn spawn_producer(
    dashboard: Arc<Dashboard>,
    args: DemoArgs,
    produced: Arc<AtomicU64>,
    stop: Arc<Shutdown>,
) -> std::io::Result<JoinHandle<()>> {
    let delay = Duration::from_millis(args.line_delay_ms.max(1));
    std::thread::Builder::new()
        .name("headsup-demo".to_string())
        .spawn(move || {
            let mut i = 0u64;
            while !stop.wait_timeout(delay) {
                if args.lines.is_some_and(|limit| i as usize >= limit) {
                    break;
                }
                if i % 25 == 24 {
                    dashboard.write_line(&format!("-- {} lines so far --", i + 1));
                } else {
                    emit(i);
                }
                if i % 50 == 0 {
                    dashboard.write_at(
                        2,
                        2,
                        &format!("batch {}", i / 50),
                        OutputMode::ClearOnChange,
                    );
                }
                i += 1;
                produced.store(i, Ordering::Relaxed);
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use headsup::config::Config;
    use headsup::input::ScriptedInput;
    use headsup::logging::DashboardLayer;
    use headsup::surface::MemorySurface;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_demo_declaration_is_valid() {
        let produced = Arc::new(AtomicU64::new(0));
        let builder = Dashboard::builder(Config::default())
            .surface(MemorySurface::new(80, 20))
            .input(ScriptedInput::new());
        let dashboard = declare(builder, produced).build().unwrap();
        assert!(dashboard.scheduler().contains(LINES_COMPONENT));
        assert!(dashboard.scheduler().contains(names::UPTIME));
    }

    #[test]
    fn test_emitted_lines_carry_module_prefix() {
        let produced = Arc::new(AtomicU64::new(0));
        let builder = Dashboard::builder(Config::default())
            .surface(MemorySurface::new(80, 20))
            .input(ScriptedInput::new());
        let dashboard = declare(builder, produced).build().unwrap();
        let subscriber =
            tracing_subscriber::registry().with(DashboardLayer::new(dashboard.writer()));

        tracing::subscriber::with_default(subscriber, || emit(2));
        dashboard.flush();

        assert_eq!(dashboard.history_lines(), vec!["[pool] checked out connection"]);
    }
}
