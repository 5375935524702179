//! Minimal end-to-end flow: wire a presenter, attach a view, run one task.
//!
//! Run with: `cargo run --example basic_flow`

use std::sync::Arc;
use std::time::Duration;

use viewvisor::{
    sources, Callbacks, Presenter, PresenterCache, PresenterFactory, PresenterProvider,
    TaskRegistry,
};

/// The "display surface": here, just a labelled stdout sink.
#[derive(Clone)]
struct ConsoleView {
    label: &'static str,
}

impl ConsoleView {
    fn show(&self, line: &str) {
        println!("[{}] {line}", self.label);
    }
}

struct WeatherPresenter {
    tasks: TaskRegistry<ConsoleView>,
}

impl WeatherPresenter {
    fn new() -> Self {
        Self {
            tasks: TaskRegistry::new(),
        }
    }

    fn load_forecast(&self) {
        self.tasks.start(
            "forecast",
            sources::value(|_ctx| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok("sunny, 23°C".to_string())
            }),
            Callbacks::new()
                .on_next(|view: &ConsoleView, forecast: &String| {
                    view.show(&format!("forecast: {forecast}"))
                })
                .on_error(|view: &ConsoleView, err| view.show(&format!("failed: {err}")))
                .on_completed(|view: &ConsoleView| view.show("done")),
        );
    }
}

impl Presenter for WeatherPresenter {
    type View = ConsoleView;

    fn tasks(&self) -> Option<&TaskRegistry<ConsoleView>> {
        Some(&self.tasks)
    }
}

#[tokio::main]
async fn main() -> Result<(), viewvisor::PresenterError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "viewvisor=debug".into()),
        )
        .init();

    let cache = Arc::new(PresenterCache::new());
    let mut factory = PresenterFactory::new();
    factory.register(WeatherPresenter::new);
    let factory = Arc::new(factory);

    let mut provider = PresenterProvider::<WeatherPresenter>::new(cache, factory);
    provider.prepare()?;
    provider.attach_view(ConsoleView { label: "main" })?;

    provider.presenter()?.lock().presenter().load_forecast();
    tokio::time::sleep(Duration::from_millis(300)).await;

    provider.detach_view(true);
    Ok(())
}
