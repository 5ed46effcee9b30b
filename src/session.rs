//! A mounted chat view and its lifecycle.
//!
//! ## Design
//! - One actor task owns every piece of mutable state (log, viewport,
//!   typing indicator, viewer count, offer, toasts). Nothing else mutates it.
//! - Producers (timers, the realtime feed, in-flight replies) send
//!   [`SessionEvent`]s to the actor; the handle sends listener commands.
//! - After each event the actor publishes a [`ChatSnapshot`] on a watch channel.
//!
//! ## Teardown
//! `unmount` (or dropping the handle) closes the realtime subscription,
//! cancels the task group, then detaches the listener channel, in that order.
//! No event is applied after that point.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::stream::BoxStream;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::{debug, error, info, trace};

use crate::config::SessionConfig;
use crate::error::{ReplyError, SessionError};
use crate::message::{ChatMessage, MessageStore, NewMessage};
use crate::offer::{OfferCountdown, OfferPhase, OfferTransition, OFFER_CLOSED_MESSAGE};
use crate::realtime::RealtimeChannel;
use crate::responder::{
    HttpResponder, OfflineResponder, ReplyPhase, Responder, ResponseSimulator, SubmitOutcome,
    TypingIndicator, TypingSource,
};
use crate::schedule::{uniform_ms, ScheduleCoordinator, TaskKind, Toast, ViewerCount};
use crate::scheduler::TaskGroup;
use crate::scroll::{ScrollPolicy, ScrollState, Viewport};

/// Anchors the chat view cannot work without.
pub const REQUIRED_ANCHORS: &[&str] = &["chat-messages", "chat-input", "participants-toggle"];

/// The view anchors a host surface provides.
#[derive(Debug, Clone, Default)]
pub struct ViewAnchors {
    present: BTreeSet<String>,
}

impl ViewAnchors {
    /// Every required anchor present.
    pub fn complete() -> Self {
        REQUIRED_ANCHORS
            .iter()
            .fold(Self::default(), |anchors, name| anchors.with(*name))
    }

    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.present.insert(name.into());
        self
    }

    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_ANCHORS
            .iter()
            .copied()
            .filter(|name| !self.present.contains(*name))
            .collect()
    }
}

/// Everything that can change session state, besides listener commands.
#[derive(Debug)]
pub enum SessionEvent {
    Inbound(NewMessage),
    Scheduled(TaskKind),
    ReplyTyping,
    ReplyFinished(Result<String, ReplyError>),
    ToastDue,
    ToastExpired(u64),
    ViewerTick,
    OfferOpen,
    OfferTick,
}

impl From<NewMessage> for SessionEvent {
    fn from(message: NewMessage) -> Self {
        SessionEvent::Inbound(message)
    }
}

/// Listener input from the host surface.
#[derive(Debug)]
enum Command {
    Submit(String),
    Scroll(f64),
    SetParticipantsVisible(bool),
    Invest,
    Sync(oneshot::Sender<()>),
    Unmount,
}

/// What the host surface renders.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSnapshot {
    /// The whole log in insertion order, hidden participants included.
    /// Shared between snapshots until the next append.
    pub messages: Arc<[ChatMessage]>,
    pub show_participants: bool,
    pub typing: Option<String>,
    pub viewer_count: u32,
    pub offer: OfferPhase,
    pub offer_display: Option<String>,
    pub toasts: Vec<Toast>,
    pub viewport: Viewport,
    pub scroll: ScrollState,
    pub reply_phase: ReplyPhase,
    /// Set once "Invest" is pressed while the offer is active.
    pub navigation: Option<String>,
    pub mounted: bool,
}

impl ChatSnapshot {
    /// Messages currently rendered, honouring the participant toggle.
    pub fn visible(&self) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| self.show_participants || !m.is_participant())
            .collect()
    }
}

/// Totals reported at teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub messages: usize,
    pub tasks_cancelled: usize,
    pub realtime_closed: bool,
    pub submissions_ignored: u64,
}

enum FeedSource {
    None,
    Url(String),
    Stream(BoxStream<'static, Result<WsMessage, tungstenite::Error>>),
}

/// Entry point for mounting a chat view.
pub struct ChatSession;

impl ChatSession {
    pub fn builder() -> ChatSessionBuilder {
        ChatSessionBuilder::new()
    }
}

/// Builder for a mounted session. See [`ChatSession::builder`].
pub struct ChatSessionBuilder {
    config: SessionConfig,
    responder: Option<Arc<dyn Responder>>,
    anchors: ViewAnchors,
    feed: Option<FeedSource>,
}

impl ChatSessionBuilder {
    fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            responder: None,
            anchors: ViewAnchors::complete(),
            feed: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the responder. Defaults to [`HttpResponder`] when the config
    /// has a `responder_url`, otherwise [`OfflineResponder`].
    pub fn responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn anchors(mut self, anchors: ViewAnchors) -> Self {
        self.anchors = anchors;
        self
    }

    /// Subscribe to a WebSocket feed, overriding `realtime_url` in the config.
    pub fn realtime_url(mut self, url: impl Into<String>) -> Self {
        self.feed = Some(FeedSource::Url(url.into()));
        self
    }

    /// Subscribe to an already-open frame stream.
    pub fn realtime_stream<S>(mut self, stream: S) -> Self
    where
        S: futures_util::Stream<Item = Result<WsMessage, tungstenite::Error>> + Send + 'static,
    {
        self.feed = Some(FeedSource::Stream(Box::pin(stream)));
        self
    }

    /// Wire every producer and start the session actor.
    ///
    /// Must be called inside a tokio runtime. Nothing is spawned if the
    /// config is invalid or a view anchor is missing.
    ///
    /// # Errors
    /// - `SessionError::InvalidConfig` for an inconsistent config.
    /// - `SessionError::MissingAnchor` for the first absent anchor.
    pub fn mount(self) -> Result<SessionHandle, SessionError> {
        self.config.validate()?;
        if let Some(name) = self.anchors.missing().first() {
            error!(anchor = %name, "chat view anchor missing, aborting mount");
            return Err(SessionError::MissingAnchor(name.to_string()));
        }

        let config = self.config;
        let responder: Arc<dyn Responder> = match self.responder {
            Some(responder) => responder,
            None => match &config.responder_url {
                Some(url) => Arc::new(HttpResponder::new(url.clone())),
                None => Arc::new(OfflineResponder),
            },
        };
        let feed = self.feed.unwrap_or_else(|| match &config.realtime_url {
            Some(url) => FeedSource::Url(url.clone()),
            None => FeedSource::None,
        });

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let mut actor = SessionActor::new(config, responder, event_tx.clone());
        actor.start();
        actor.realtime = match feed {
            FeedSource::None => None,
            FeedSource::Url(url) => Some(RealtimeChannel::connect(url, event_tx)),
            FeedSource::Stream(stream) => Some(RealtimeChannel::from_stream(stream, event_tx)),
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(actor.snapshot());
        let task = tokio::spawn(actor.run(command_rx, event_rx, snapshot_tx));
        info!("chat session mounted");

        Ok(SessionHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            task: Some(task),
        })
    }
}

/// Listener-side handle to a mounted session.
///
/// Dropping it unmounts the session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<ChatSnapshot>,
    task: Option<JoinHandle<SessionSummary>>,
}

impl SessionHandle {
    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Unmounted)
    }

    /// Enter-key submission of the local user's message.
    pub fn submit(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Submit(text.into()))
    }

    /// User-initiated scroll of the log container.
    pub fn scroll_to(&self, scroll_top: f64) -> Result<(), SessionError> {
        self.send(Command::Scroll(scroll_top))
    }

    pub fn set_participants_visible(&self, visible: bool) -> Result<(), SessionError> {
        self.send(Command::SetParticipantsVisible(visible))
    }

    /// The offer banner's "Invest" action.
    pub fn invest(&self) -> Result<(), SessionError> {
        self.send(Command::Invest)
    }

    /// Wait until every command and every already-fired event is applied.
    pub async fn sync(&self) -> Result<(), SessionError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Sync(ack_tx))?;
        ack_rx.await.map_err(|_| SessionError::Unmounted)
    }

    /// The latest published state.
    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot.clone()
    }

    /// Tear the session down and wait for the actor to finish.
    pub async fn unmount(mut self) -> Result<SessionSummary, SessionError> {
        let _ = self.commands.send(Command::Unmount);
        match self.task.take() {
            Some(task) => task.await.map_err(|_| SessionError::Unmounted),
            None => Err(SessionError::Unmounted),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.commands.send(Command::Unmount);
        }
    }
}

struct SessionActor {
    config: SessionConfig,
    store: MessageStore,
    log: Arc<[ChatMessage]>,
    policy: ScrollPolicy,
    viewport: Viewport,
    scroll: ScrollState,
    replies: ResponseSimulator,
    responder: Arc<dyn Responder>,
    typing: TypingIndicator,
    coordinator: ScheduleCoordinator,
    viewers: ViewerCount,
    offer: OfferCountdown,
    offer_ticker: Option<AbortHandle>,
    toasts: Vec<Toast>,
    navigation: Option<String>,
    rng: StdRng,
    group: TaskGroup<SessionEvent>,
    realtime: Option<RealtimeChannel>,
    mounted: bool,
}

impl SessionActor {
    fn new(
        config: SessionConfig,
        responder: Arc<dyn Responder>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store: MessageStore::new(),
            log: Arc::from(Vec::new()),
            policy: ScrollPolicy::new(config.scroll_threshold_px),
            viewport: Viewport::new(config.viewport_height_px),
            scroll: ScrollState::default(),
            replies: ResponseSimulator::new(),
            responder,
            typing: TypingIndicator::new(),
            coordinator: ScheduleCoordinator::new(&config),
            viewers: ViewerCount::new(config.viewer_initial, config.viewer_min, config.viewer_max),
            offer: OfferCountdown::new(config.offer_duration_secs),
            offer_ticker: None,
            toasts: Vec::new(),
            navigation: None,
            rng,
            group: TaskGroup::new(events),
            realtime: None,
            mounted: true,
            config,
        }
    }

    /// Register every mount-anchored timer.
    fn start(&mut self) {
        let t0 = Instant::now();
        let plan = self.coordinator.plan(&mut self.rng);
        debug!(timers = plan.len(), "registering synthetic schedule");
        for task in plan {
            self.group.at(t0 + task.fire_at, SessionEvent::Scheduled(task.kind));
        }
        let first_toast = self.coordinator.next_toast_delay(&mut self.rng);
        self.group.after(first_toast, SessionEvent::ToastDue);
        self.group.every(self.config.viewer_tick(), || SessionEvent::ViewerTick);
        self.group.after(self.config.offer_delay(), SessionEvent::OfferOpen);
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        snapshot: watch::Sender<ChatSnapshot>,
    ) -> SessionSummary {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Sync(ack)) => {
                        while let Ok(event) = events.try_recv() {
                            self.handle_event(event);
                        }
                        snapshot.send_replace(self.snapshot());
                        let _ = ack.send(());
                        continue;
                    }
                    Some(Command::Unmount) | None => {
                        let summary = self.teardown(&mut commands);
                        snapshot.send_replace(self.snapshot());
                        return summary;
                    }
                    Some(command) => self.handle_command(command),
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
            snapshot.send_replace(self.snapshot());
        }
    }

    fn teardown(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> SessionSummary {
        let realtime_closed = self
            .realtime
            .as_mut()
            .map(RealtimeChannel::close)
            .unwrap_or(false);
        let tasks_cancelled = self.group.cancel_all();
        commands.close();
        self.mounted = false;
        let summary = SessionSummary {
            messages: self.store.len(),
            tasks_cancelled,
            realtime_closed,
            submissions_ignored: self.replies.ignored(),
        };
        info!(
            messages = summary.messages,
            tasks_cancelled,
            realtime_closed,
            "chat session unmounted"
        );
        summary
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit(text) => self.submit(&text),
            Command::Scroll(top) => {
                self.viewport.scroll_to(top);
                self.scroll = self.policy.on_user_scroll(&self.viewport);
            }
            Command::SetParticipantsVisible(visible) => {
                self.store.set_participants_visible(visible);
                self.resize_content();
            }
            Command::Invest => {
                if self.offer.is_active() {
                    info!(url = %self.config.offer_url, "invest pressed, navigating");
                    self.navigation = Some(self.config.offer_url.clone());
                } else {
                    debug!("invest pressed outside the offer window");
                }
            }
            Command::Sync(_) | Command::Unmount => {}
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        trace!(?event, "session event");
        match event {
            SessionEvent::Inbound(message) | SessionEvent::Scheduled(TaskKind::Post(message)) => {
                self.append(message);
            }
            SessionEvent::Scheduled(TaskKind::TypingStart(source)) => self.typing.show(source),
            SessionEvent::Scheduled(TaskKind::TypingStop(source)) => {
                self.typing.hide(source);
            }
            SessionEvent::ReplyTyping => self.typing.show(TypingSource::Reply),
            SessionEvent::ReplyFinished(result) => {
                self.typing.hide(TypingSource::Reply);
                let reply = self.replies.finish(result, &self.config.host_name);
                self.append(reply);
            }
            SessionEvent::ToastDue => {
                let toast = self.coordinator.make_toast(&mut self.rng);
                self.group
                    .after(self.config.toast_lifetime(), SessionEvent::ToastExpired(toast.id));
                self.toasts.push(toast);
                let next = self.coordinator.next_toast_delay(&mut self.rng);
                self.group.after(next, SessionEvent::ToastDue);
            }
            SessionEvent::ToastExpired(id) => self.toasts.retain(|t| t.id != id),
            SessionEvent::ViewerTick => {
                self.viewers.jitter(&mut self.rng);
            }
            SessionEvent::OfferOpen => {
                if let Some(OfferTransition::Opened { remaining_secs }) = self.offer.open() {
                    info!(remaining_secs, "special offer opened");
                    let announcement = self.offer.announcement();
                    self.append(NewMessage::system(announcement));
                    self.offer_ticker = self
                        .group
                        .every(std::time::Duration::from_secs(1), || SessionEvent::OfferTick);
                }
            }
            SessionEvent::OfferTick => {
                if let Some(OfferTransition::Closed) = self.offer.tick() {
                    if let Some(ticker) = self.offer_ticker.take() {
                        ticker.abort();
                    }
                    info!("special offer expired");
                    self.append(NewMessage::system(OFFER_CLOSED_MESSAGE));
                }
            }
        }
    }

    fn submit(&mut self, text: &str) {
        let SubmitOutcome::Accepted(text) = self.replies.begin(text) else {
            return;
        };
        self.append(NewMessage::local(text.clone()));
        let delay = uniform_ms(
            &mut self.rng,
            self.config.reply_delay_min_ms,
            self.config.reply_delay_max_ms,
        );
        let responder = Arc::clone(&self.responder);
        let tx = self.group.sender();
        self.group.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionEvent::ReplyTyping);
            let result = responder.reply(&text).await;
            let _ = tx.send(SessionEvent::ReplyFinished(result));
        });
    }

    fn append(&mut self, message: NewMessage) {
        let stored = self.store.append(message).clone();
        self.log = Arc::from(self.store.as_slice());
        let visible = self.store.is_visible(&stored);
        let follow = self.policy.should_auto_scroll(&stored, self.scroll);
        trace!(id = stored.id, visible, follow, "message appended");
        if visible {
            self.resize_content();
            if follow {
                self.viewport.scroll_to_bottom();
                // Landing at the bottom releases a scroll lock.
                self.scroll = self.policy.on_user_scroll(&self.viewport);
            }
        }
    }

    fn resize_content(&mut self) {
        let rows = self.store.visible_len() as f64;
        self.viewport.set_content_height(rows * self.config.row_height_px);
    }

    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: Arc::clone(&self.log),
            show_participants: self.store.participants_visible(),
            typing: self.typing.text(&self.config.host_name),
            viewer_count: self.viewers.get(),
            offer: self.offer.phase(),
            offer_display: self.offer.display(),
            toasts: self.toasts.clone(),
            viewport: self.viewport,
            scroll: self.scroll,
            reply_phase: self.replies.phase(),
            navigation: self.navigation.clone(),
            mounted: self.mounted,
        }
    }
}
