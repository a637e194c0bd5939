//! The desk engine: routes inbound chat events into per-chat sessions.
//!
//! ROUTING ORDER (per event):
//!   1. Register or touch the sender.
//!   2. Take the chat's session lock (held until the transition finishes).
//!   3. `/start`, commands and menu buttons open or reset a flow.
//!   4. Everything else is handed to the active flow.
//!
//! RULES:
//!   - One flow per chat. Opening a flow discards the previous one.
//!   - Cancel is honoured in every state and writes nothing.
//!   - A flow button pressed with no flow active is a `SessionExpired`.
//!   - An unexpected error ends in a generic message; the session is kept
//!     so the user can retry.
//!   - A chat whose flow is back to idle gives up its session.

use crate::{
    aggregator::Aggregator,
    archiver::AutoArchiver,
    clock::{Clock, ManualClock},
    config::{DemoConfig, DeskConfig},
    error::{DeskError, DeskResult},
    lookup::{
        demo::{DemoPhoneLookup, DemoQrDecoder, DemoReputation, DemoSocialLookup},
        PhoneLookup, PhoneLookupService, QrDecoder, ReputationLookup, SocialLookup,
    },
    notify::{Notifier, TransportNotifier},
    rate_limiter::RateLimiter,
    store::DeskStore,
    transport::{safe_delete, OutboundMessage, RecordingTransport, Transport},
    types::ChatId,
    workflow::{
        admin_flow, render, report_flow, search_flow, update_flow, Action, Ctx, Envelope, Flow,
        Inbound, Input, Next, Session,
    },
};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// Shared collaborators every flow transition can reach.
pub struct Services {
    pub config:     DeskConfig,
    pub store:      DeskStore,
    pub clock:      Arc<dyn Clock>,
    pub aggregator: Aggregator,
    pub limiter:    Arc<RateLimiter>,
    pub phone:      PhoneLookupService,
    pub reputation: Arc<dyn ReputationLookup>,
    pub social:     Arc<dyn SocialLookup>,
    pub qr:         Arc<dyn QrDecoder>,
    pub notifier:   Arc<dyn Notifier>,
    pub transport:  Arc<dyn Transport>,
}

/// External collaborators wired into an engine.
pub struct Collaborators {
    pub transport:  Arc<dyn Transport>,
    pub notifier:   Arc<dyn Notifier>,
    pub reputation: Arc<dyn ReputationLookup>,
    pub phone:      Arc<dyn PhoneLookup>,
    pub social:     Arc<dyn SocialLookup>,
    pub qr:         Arc<dyn QrDecoder>,
}

impl Collaborators {
    /// Demo lookups; notices go out through `transport`.
    pub fn demo(config: &DemoConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            notifier:   Arc::new(TransportNotifier::new(transport.clone())),
            transport,
            reputation: Arc::new(DemoReputation::new(config)),
            phone:      Arc::new(DemoPhoneLookup::new(config)),
            social:     Arc::new(DemoSocialLookup::new(config)),
            qr:         Arc::new(DemoQrDecoder),
        }
    }
}

/// Where a command or menu button leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Menu,
    Report,
    Search,
    Admin,
    Stats,
    MyReports,
    Cancel,
}

impl Entry {
    fn from_command(name: &str) -> Entry {
        match name.trim_start_matches('/').to_ascii_lowercase().as_str() {
            "report"    => Entry::Report,
            "search"    => Entry::Search,
            "check"     => Entry::Search,
            "admin"     => Entry::Admin,
            "stats"     => Entry::Stats,
            "myreports" => Entry::MyReports,
            "cancel"    => Entry::Cancel,
            _ => Entry::Menu,
        }
    }

    fn from_action(action: &Action) -> Option<Entry> {
        match action {
            Action::MainMenu    => Some(Entry::Menu),
            Action::Cancel      => Some(Entry::Cancel),
            Action::StartReport => Some(Entry::Report),
            Action::StartSearch => Some(Entry::Search),
            Action::AdminMenu   => Some(Entry::Admin),
            Action::ShowStats   => Some(Entry::Stats),
            Action::MyReports   => Some(Entry::MyReports),
            _ => None,
        }
    }
}

pub struct DeskEngine {
    services: Arc<Services>,
    sessions: Mutex<HashMap<ChatId, Arc<AsyncMutex<Session>>>>,
}

impl DeskEngine {
    pub fn build(
        config: DeskConfig,
        store: DeskStore,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let phone = PhoneLookupService::new(
            store.clone(),
            limiter.clone(),
            collaborators.phone,
            clock.clone(),
            Duration::from_secs(config.lookup_timeout_secs),
        );
        let services = Services {
            aggregator: Aggregator::new(store.clone(), clock.clone()),
            limiter,
            phone,
            reputation: collaborators.reputation,
            social:     collaborators.social,
            qr:         collaborators.qr,
            notifier:   collaborators.notifier,
            transport:  collaborators.transport,
            config,
            store,
            clock,
        };
        Self {
            services: Arc::new(services),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// In-memory engine with demo lookups and the test config.
    pub fn build_test(
        transport: Arc<RecordingTransport>,
        clock: Arc<ManualClock>,
    ) -> DeskResult<Self> {
        Self::build_test_with(DeskConfig::default_test(), transport, clock)
    }

    pub fn build_test_with(
        config: DeskConfig,
        transport: Arc<RecordingTransport>,
        clock: Arc<ManualClock>,
    ) -> DeskResult<Self> {
        let store = DeskStore::in_memory()?;
        store.migrate()?;
        let collaborators = Collaborators::demo(&config.demo, transport);
        Ok(Self::build(config, store, clock, collaborators))
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn store(&self) -> &DeskStore {
        &self.services.store
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.services.aggregator
    }

    /// Archiver sharing this engine's store, clock and notifier.
    pub fn archiver(&self) -> AutoArchiver {
        AutoArchiver::new(
            self.services.store.clone(),
            self.services.notifier.clone(),
            self.services.clock.clone(),
            &self.services.config.archive,
        )
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or_default()
    }

    /// Name of the flow active in `chat_id` ("idle" when none).
    pub async fn flow_name(&self, chat_id: ChatId) -> &'static str {
        let session = match self.sessions.lock() {
            Ok(sessions) => sessions.get(&chat_id).cloned(),
            Err(_) => None,
        };
        match session {
            Some(session) => session.lock().await.flow.name(),
            None => Flow::Idle.name(),
        }
    }

    fn session(&self, chat_id: ChatId) -> DeskResult<Arc<AsyncMutex<Session>>> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| DeskError::Other(anyhow::anyhow!("session table lock poisoned")))?;
        Ok(sessions.entry(chat_id).or_default().clone())
    }

    /// Handle one inbound event to completion.
    pub async fn handle(&self, envelope: Envelope) -> DeskResult<()> {
        let svc = self.services.as_ref();
        let now = svc.clock.now();
        let user_id = envelope.sender.user_id;

        let seen = match envelope.event {
            Inbound::Start { .. } | Inbound::Command { .. } => {
                svc.store.register_user(&envelope.sender, now).map(|first| {
                    if first {
                        info!("[Engine] new user {user_id}");
                    }
                })
            }
            _ => svc.store.touch_user(user_id, now),
        };
        if let Err(e) = seen {
            warn!("[Engine] user {user_id} activity not recorded: {e}");
        }

        let entry = self.session(envelope.chat_id)?;
        let mut session = entry.lock().await;
        let Session { flow, prompt } = &mut *session;
        let mut ctx = Ctx {
            svc,
            chat_id: envelope.chat_id,
            user_id,
            prompt,
        };

        let tidy = match (&envelope.event, envelope.message_id) {
            (Inbound::Text { .. }, Some(id)) if !matches!(flow, Flow::Idle) => Some(id),
            _ => None,
        };

        match dispatch(&mut ctx, flow, envelope.event).await {
            Ok(()) => {}
            Err(DeskError::SessionExpired) => {
                *flow = Flow::Idle;
                ctx.show(
                    OutboundMessage::text("This session has expired. Please start again.")
                        .with_row(render::main_menu_row()),
                )
                .await;
            }
            Err(e) => {
                error!(
                    "[Engine] chat {} ({} flow) failed: {e}",
                    envelope.chat_id,
                    flow.name()
                );
                ctx.say(
                    OutboundMessage::text("Something went wrong. Please try again later.")
                        .with_row(render::main_menu_row()),
                )
                .await;
            }
        }

        if let Some(message_id) = tidy {
            safe_delete(svc.transport.as_ref(), envelope.chat_id, message_id).await;
        }
        drop(session);
        self.release(envelope.chat_id, entry);
        Ok(())
    }

    /// Forget the session of `chat_id` once it is idle and no other event
    /// holds it.
    fn release(&self, chat_id: ChatId, entry: Arc<AsyncMutex<Session>>) {
        let Ok(mut sessions) = self.sessions.lock() else {
            return;
        };
        // The table's copy plus `entry`.
        if Arc::strong_count(&entry) > 2 {
            return;
        }
        let idle = entry
            .try_lock()
            .map(|s| matches!(s.flow, Flow::Idle))
            .unwrap_or(false);
        if idle {
            sessions.remove(&chat_id);
        }
    }
}

async fn dispatch(ctx: &mut Ctx<'_>, flow: &mut Flow, event: Inbound) -> DeskResult<()> {
    match event {
        Inbound::Start { payload } => {
            *flow = Flow::Idle;
            *ctx.prompt = None;
            match payload.as_deref().and_then(update_flow::parse_update_payload) {
                Some(report_id) => {
                    if let Some(update) = update_flow::start(ctx, report_id).await? {
                        *flow = Flow::Update(update);
                    }
                }
                None => show_main_menu(ctx, None).await,
            }
            Ok(())
        }
        Inbound::Command { name } => open(ctx, flow, Entry::from_command(&name)).await,
        Inbound::Action { action } => match Entry::from_action(&action) {
            Some(entry) => open(ctx, flow, entry).await,
            None => deliver(ctx, flow, Input::Action(action)).await,
        },
        Inbound::Text { text } => deliver(ctx, flow, Input::Text(text)).await,
        Inbound::Photo { file } => deliver(ctx, flow, Input::Photo(file)).await,
    }
}

async fn open(ctx: &mut Ctx<'_>, flow: &mut Flow, entry: Entry) -> DeskResult<()> {
    if !matches!(flow, Flow::Idle) && entry != Entry::Cancel {
        info!("[Engine] chat {} leaves {} flow", ctx.chat_id, flow.name());
    }
    match entry {
        Entry::Menu => {
            *flow = Flow::Idle;
            show_main_menu(ctx, None).await;
        }
        Entry::Cancel => {
            if !matches!(flow, Flow::Idle) {
                info!("[Engine] chat {} cancelled {} flow", ctx.chat_id, flow.name());
            }
            *flow = Flow::Idle;
            show_main_menu(ctx, Some("❎ Cancelled. Nothing was saved.")).await;
        }
        Entry::Report => {
            *flow = Flow::Report(report_flow::start(ctx).await);
        }
        Entry::Search => {
            *flow = Flow::Search(search_flow::start(ctx).await);
        }
        Entry::Admin => {
            *flow = Flow::Idle;
            if !ctx.svc.config.is_admin(ctx.user_id) {
                warn!("[Engine] user {} is not an admin", ctx.user_id);
                show_main_menu(ctx, Some("⛔ This section is for admins only.")).await;
                return Ok(());
            }
            *flow = Flow::Admin(admin_flow::start(ctx).await?);
        }
        Entry::Stats => {
            *flow = Flow::Idle;
            let stats = ctx.svc.store.system_stats(ctx.now())?;
            ctx.show(
                OutboundMessage::text(render::stats_text(&stats)).with_row(render::main_menu_row()),
            )
            .await;
        }
        Entry::MyReports => {
            *flow = Flow::Idle;
            let reports = ctx.svc.store.reports_by_submitter(ctx.user_id)?;
            ctx.show(
                OutboundMessage::text(render::my_reports(&reports)).with_row(render::main_menu_row()),
            )
            .await;
        }
    }
    Ok(())
}

async fn deliver(ctx: &mut Ctx<'_>, flow: &mut Flow, input: Input) -> DeskResult<()> {
    let next = match flow {
        Flow::Idle => {
            if let Input::Action(_) = input {
                return Err(DeskError::SessionExpired);
            }
            show_main_menu(ctx, None).await;
            return Ok(());
        }
        Flow::Report(report) => report_flow::handle(ctx, report, input).await?,
        Flow::Admin(admin) => admin_flow::handle(ctx, admin, input).await?,
        Flow::Update(update) => update_flow::handle(ctx, update, input).await?,
        Flow::Search(search) => search_flow::handle(ctx, search, input).await?,
    };
    if next == Next::Done {
        *flow = Flow::Idle;
    }
    Ok(())
}

async fn show_main_menu(ctx: &mut Ctx<'_>, note: Option<&str>) {
    let mut message = render::main_menu(ctx.svc.config.is_admin(ctx.user_id));
    if let Some(note) = note {
        message.text = format!("{note}\n\n{}", message.text);
    }
    ctx.show(message).await;
}
