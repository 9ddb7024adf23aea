//! Tokio shell around the synchronous controller.
//!
//! One task owns a [`RetryController`] and serialises everything that can
//! touch it: trigger clicks, settings updates, host events and the retry
//! deadline all arrive in the same `tokio::select!` loop. Callers talk to the
//! task through a cloneable [`RetryHandle`].
//!
//! ```text
//!  RetryHandle ──mpsc──▶ ┌───────────────┐ ──SpawnSender──▶ host send (spawned)
//!                        │  actor task   │
//!  host events ─bcast──▶ │  controller + │ ──Notifier─────▶ button / toasts
//!                        │ DeadlineTimer │
//!                        └───────────────┘
//! ```
//!
//! Sends are fire-and-forget: [`SpawnSender`] spawns each host send and logs
//! failures when they settle, so the next deadline is armed whether or not
//! the previous send has finished.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::controller::{RetryController, Transition};
use crate::events::{EventMap, HostEvent};
use crate::host::{Notifier, Sender};
use crate::retry::SendError;
use crate::session::SessionSnapshot;
use crate::settings::Settings;
use crate::timer::DeadlineTimer;

/// Host send action whose completion is asynchronous.
pub trait AsyncSender: Send + Sync + 'static {
    /// Submit `text` as a new user message.
    fn send(&self, text: String) -> BoxFuture<'static, Result<(), SendError>>;

    /// Submit `text` again. Defaults to [`AsyncSender::send`].
    fn resend(&self, text: String) -> BoxFuture<'static, Result<(), SendError>> {
        self.send(text)
    }
}

/// Adapts an [`AsyncSender`] to the controller's [`Sender`] by spawning each
/// call onto the runtime without awaiting it.
pub struct SpawnSender<A> {
    inner: Arc<A>,
}

impl<A> SpawnSender<A> {
    /// Wrap `inner`.
    pub fn new(inner: A) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<A> fmt::Debug for SpawnSender<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnSender").finish_non_exhaustive()
    }
}

fn detach(call: &'static str, fut: BoxFuture<'static, Result<(), SendError>>) {
    tokio::spawn(async move {
        if let Err(error) = fut.await {
            tracing::warn!(call, %error, "host send failed");
        }
    });
}

impl<A: AsyncSender> Sender for SpawnSender<A> {
    fn send(&mut self, text: &str) -> Result<(), SendError> {
        detach("send", self.inner.send(text.to_string()));
        Ok(())
    }

    fn resend(&mut self, text: &str) -> Result<(), SendError> {
        detach("resend", self.inner.resend(text.to_string()));
        Ok(())
    }
}

/// Source of host events.
///
/// Subscribing yields a receiver; dropping it unsubscribes.
pub trait ResponseWatcher {
    /// Start receiving host events.
    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;
}

impl ResponseWatcher for broadcast::Sender<HostEvent> {
    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        broadcast::Sender::subscribe(self)
    }
}

/// Error returned by [`RetryHandle`] once the actor has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    /// The actor task is gone.
    Closed,
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "reinforced send actor has stopped"),
        }
    }
}

impl std::error::Error for HandleError {}

enum Command {
    Click {
        message: String,
        reply: oneshot::Sender<Transition>,
    },
    Cancel {
        reply: oneshot::Sender<Transition>,
    },
    Configure {
        settings: Settings,
        reply: oneshot::Sender<Settings>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

/// Cloneable handle to a running actor.
#[derive(Debug, Clone)]
pub struct RetryHandle {
    tx: mpsc::Sender<Command>,
}

impl RetryHandle {
    /// Activate the trigger control with the current text box content.
    ///
    /// Starts a session when idle, cancels the active one otherwise.
    pub async fn click(&self, message: impl Into<String>) -> Result<Transition, HandleError> {
        self.request(|reply| Command::Click {
            message: message.into(),
            reply,
        })
        .await
    }

    /// Stop the active session, if any.
    pub async fn cancel(&self) -> Result<Transition, HandleError> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    /// Apply new settings to the next session.
    ///
    /// Fields that fail [`Settings::validate`] are replaced by their
    /// defaults; the settings actually applied are returned.
    pub async fn configure(&self, settings: Settings) -> Result<Settings, HandleError> {
        self.request(|reply| Command::Configure { settings, reply }).await
    }

    /// Current session state.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, HandleError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Ask the actor to stop. An active session is cancelled first.
    pub async fn shutdown(&self) -> Result<(), HandleError> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| HandleError::Closed)
    }

    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| HandleError::Closed)?;
        rx.await.map_err(|_| HandleError::Closed)
    }
}

/// Builder for the actor.
///
/// # Example
///
/// ```rust
/// use reinforced_send::runtime::ReinforcedSend;
/// use reinforced_send::testing::{RecordingNotifier, RecordingSender};
/// use reinforced_send::{HostEvent, Settings, Transition};
/// use tokio::sync::broadcast;
///
/// # tokio_test::block_on(async {
/// let (events, _) = broadcast::channel::<HostEvent>(16);
/// let sender = RecordingSender::new();
///
/// let (handle, task) = ReinforcedSend::new(sender.clone(), RecordingNotifier::new())
///     .with_settings(Settings { retry_delay: 30, max_retries: 3 })
///     .spawn(&events);
///
/// assert!(matches!(handle.click("hi").await, Ok(Transition::Started { .. })));
/// events.send(HostEvent::CharacterMessageRendered).unwrap();
///
/// handle.shutdown().await.unwrap();
/// task.await.unwrap();
/// # });
/// ```
#[derive(Debug)]
pub struct ReinforcedSend<A, N> {
    sender: A,
    notifier: N,
    settings: Settings,
    events: EventMap,
    capacity: usize,
}

impl<A, N> ReinforcedSend<A, N>
where
    A: AsyncSender,
    N: Notifier + Send + 'static,
{
    /// Create a builder with default settings and the default event map.
    pub fn new(sender: A, notifier: N) -> Self {
        Self {
            sender,
            notifier,
            settings: Settings::default(),
            events: EventMap::default(),
            capacity: 32,
        }
    }

    /// Use `settings` for the first session. Invalid fields fall back to
    /// their defaults.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings.sanitized();
        self
    }

    /// Decide which host events count as a response.
    pub fn with_events(mut self, events: EventMap) -> Self {
        self.events = events;
        self
    }

    /// Command channel capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Subscribe to `watcher` and spawn the actor onto the current runtime.
    pub fn spawn<W>(self, watcher: &W) -> (RetryHandle, JoinHandle<()>)
    where
        W: ResponseWatcher + ?Sized,
    {
        let (tx, rx) = mpsc::channel(self.capacity);
        let controller = RetryController::new(
            SpawnSender::new(self.sender),
            self.notifier,
            DeadlineTimer::new(),
            self.settings.policy(),
        );
        let actor = Actor {
            controller,
            events: self.events,
            commands: rx,
            host_events: watcher.subscribe(),
        };
        (RetryHandle { tx }, tokio::spawn(actor.run()))
    }
}

struct Actor<A, N> {
    controller: RetryController<SpawnSender<A>, N, DeadlineTimer>,
    events: EventMap,
    commands: mpsc::Receiver<Command>,
    host_events: broadcast::Receiver<HostEvent>,
}

impl<A, N> Actor<A, N>
where
    A: AsyncSender,
    N: Notifier + Send + 'static,
{
    async fn run(mut self) {
        let mut watching = true;
        tracing::debug!("reinforced send actor started");

        loop {
            let deadline = self.controller.timer().deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                event = self.host_events.recv(), if watching => match event {
                    Ok(event) => self.on_host_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "host event stream lagged");
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("host event stream closed, no longer watching");
                        watching = false;
                    }
                },
                ticket = DeadlineTimer::expired(deadline) => {
                    self.controller.on_timeout(ticket);
                }
            }
        }

        self.controller.cancel();
        tracing::debug!("reinforced send actor stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Click { message, reply } => {
                let _ = reply.send(self.controller.start(&message));
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.controller.cancel());
            }
            Command::Configure { settings, reply } => {
                let applied = match settings.validate() {
                    Ok(()) => settings,
                    Err(errors) => {
                        tracing::warn!(?errors, "invalid settings, using defaults for bad fields");
                        settings.sanitized()
                    }
                };
                self.controller.set_policy(applied.policy());
                let _ = reply.send(applied);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn on_host_event(&mut self, event: &HostEvent) {
        if self.events.canonicalize(event).is_some() {
            self.controller.on_response_detected();
        } else {
            tracing::trace!(%event, "ignoring host event");
        }
    }
}
