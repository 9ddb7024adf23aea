//! Demonstrates a reinforced send against a flaky host
//!
//! The simulated host drops the first two sends and answers the third.
//!
//! Run with: cargo run --example reinforced_send --features async

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reinforced_send::runtime::{AsyncSender, ReinforcedSend};
use reinforced_send::{
    ButtonState, HostEvent, Notice, NoticeLevel, Notifier, SendError, Settings,
};
use tokio::sync::broadcast;

/// Host that only replies once it has seen `answer_on` sends.
struct FlakyHost {
    sends: Arc<AtomicU32>,
    answer_on: u32,
    events: broadcast::Sender<HostEvent>,
}

impl AsyncSender for FlakyHost {
    fn send(&self, text: String) -> BoxFuture<'static, Result<(), SendError>> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        let answer_on = self.answer_on;
        let events = self.events.clone();

        Box::pin(async move {
            tracing::info!(n, %text, "host received message");
            if n >= answer_on {
                tokio::time::sleep(Duration::from_millis(300)).await;
                let _ = events.send(HostEvent::CharacterMessageRendered);
            }
            Ok(())
        })
    }
}

/// Prints notices the way a toast area would show them.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn set_state(&mut self, state: ButtonState) {
        tracing::info!(icon = state.icon(), "{}", state.title());
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level() {
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!("[{}] {}", Notice::TITLE, notice)
            }
            NoticeLevel::Warning => tracing::warn!("[{}] {}", Notice::TITLE, notice),
            NoticeLevel::Error => tracing::error!("[{}] {}", Notice::TITLE, notice),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let (events, _) = broadcast::channel(16);
    let host = FlakyHost {
        sends: Arc::new(AtomicU32::new(0)),
        answer_on: 3,
        events: events.clone(),
    };

    let (handle, task) = ReinforcedSend::new(host, ConsoleNotifier)
        .with_settings(Settings {
            retry_delay: 1,
            max_retries: 5,
        })
        .spawn(&events);

    match handle.click("Are you still there?").await {
        Ok(transition) => tracing::info!(?transition, "clicked"),
        Err(e) => tracing::error!("actor unavailable: {}", e),
    }

    tokio::time::sleep(Duration::from_secs(4)).await;

    if let Ok(snapshot) = handle.snapshot().await {
        tracing::info!(?snapshot, "final state");
    }

    let _ = handle.shutdown().await;
    let _ = task.await;
}
