//! View churn under a running task: the "rotation" scenario.
//!
//! A slow multi-value task starts against one view; the view is destroyed
//! mid-stream and a new one attaches later. The new view receives the full
//! history before going live — nothing is lost, nothing runs twice.
//!
//! Run with: `cargo run --example view_churn`

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use viewvisor::{
    Callbacks, Emitter, Presenter, PresenterCache, PresenterFactory, PresenterProvider, SourceFn,
    TaskRegistry,
};

#[derive(Clone)]
struct ConsoleView {
    label: &'static str,
}

impl ConsoleView {
    fn show(&self, line: &str) {
        println!("[{}] {line}", self.label);
    }
}

struct DownloadPresenter {
    tasks: TaskRegistry<ConsoleView>,
}

impl DownloadPresenter {
    fn new() -> Self {
        Self {
            tasks: TaskRegistry::new(),
        }
    }

    fn download(&self) {
        self.tasks.start(
            "download",
            SourceFn::arc(|emitter: Emitter<u8>, ctx: CancellationToken| async move {
                for percent in [10u8, 35, 60, 85, 100] {
                    if ctx.is_cancelled() {
                        return Err(viewvisor::TaskError::Canceled);
                    }
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    emitter.emit(percent);
                }
                Ok::<_, viewvisor::TaskError>(())
            }),
            Callbacks::new()
                .on_next(|view: &ConsoleView, percent: &u8| {
                    view.show(&format!("progress {percent}%"))
                })
                .on_completed(|view: &ConsoleView| view.show("download finished")),
        );
    }
}

impl Presenter for DownloadPresenter {
    type View = ConsoleView;

    fn tasks(&self) -> Option<&TaskRegistry<ConsoleView>> {
        Some(&self.tasks)
    }
}

#[tokio::main]
async fn main() -> Result<(), viewvisor::PresenterError> {
    let cache = Arc::new(PresenterCache::new());
    let mut factory = PresenterFactory::new();
    factory.register(DownloadPresenter::new);
    let factory = Arc::new(factory);

    let mut provider =
        PresenterProvider::<DownloadPresenter>::new(Arc::clone(&cache), Arc::clone(&factory));
    provider.prepare()?;
    provider.attach_view(ConsoleView { label: "portrait" })?;
    provider.presenter()?.lock().presenter().download();

    // The first view sees some progress, then the device "rotates".
    tokio::time::sleep(Duration::from_millis(400)).await;
    let saved = provider.save_instance_state()?;
    provider.detach_view(false);
    println!("--- view destroyed, download keeps running ---");
    tokio::time::sleep(Duration::from_millis(400)).await;

    // A recreated owner restores the same presenter and attaches anew.
    let mut recreated = PresenterProvider::<DownloadPresenter>::new(cache, factory);
    recreated.restore_instance_state(saved);
    recreated.prepare()?;
    recreated.attach_view(ConsoleView { label: "landscape" })?;
    println!("--- new view attached, history replays ---");

    tokio::time::sleep(Duration::from_millis(600)).await;
    recreated.detach_view(true);
    Ok(())
}
