//! Conversation state machines.
//!
//! RULES:
//!   - One session per chat, one active flow per session.
//!   - Events of one session are handled strictly one at a time (the
//!     engine holds the session lock for the whole transition).
//!   - Button presses arrive as typed `Action`s and are matched per state.
//!   - Validation failures re-prompt the same state; persistence failures on
//!     a terminal step keep the draft so the user can retry.

pub mod admin_flow;
pub mod render;
pub mod report_flow;
pub mod search_flow;
pub mod update_flow;

use crate::{
    engine::Services,
    notify::Notice,
    profile::ProfileRecord,
    report::{EvidenceKind, ReporterRole, TargetKind},
    store::NewUser,
    transport::{safe_edit, safe_send, OutboundMessage},
    types::{ChatId, FileRef, MessageId, ProfileId, UserId},
};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

pub use admin_flow::AdminFlow;
pub use report_flow::ReportFlow;
pub use search_flow::SearchFlow;
pub use update_flow::UpdateFlow;

/// Everything a button can ask for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    MainMenu,
    Cancel,
    Back,
    StartReport,
    StartSearch,
    ShowStats,
    MyReports,
    AdminMenu,

    ChooseRole { role: ReporterRole },
    ChooseTarget { kind: TargetKind },
    ScreenshotsDone,
    AddEvidence { kind: EvidenceKind },
    ProceedToTerms,
    AcceptTerms,

    ReviewQueue,
    Verify,
    Dispute,
    RequestInfo,
    Skip,
    LinkProfile { profile_id: ProfileId },
    NewProfile,
    NoReason,

    ConfirmUpdate,

    NextResult,
    PrevResult,
    ViewReport,
    ProfileReports,
    BankAccounts,
    PhoneNumbers,
    NextPage,
    PrevPage,
    SearchAgain,
}

/// One inbound chat event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// `/start`, optionally with a deep-link payload such as `update_42`.
    Start {
        #[serde(default)]
        payload: Option<String>,
    },
    /// Any other slash command, without the slash.
    Command { name: String },
    Text { text: String },
    Photo { file: FileRef },
    Action { action: Action },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub chat_id:    ChatId,
    pub sender:     NewUser,
    /// Id of the user's own message, for text and photo events.
    #[serde(default)]
    pub message_id: Option<MessageId>,
    pub event:      Inbound,
}

/// Input handed to the active flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Text(String),
    Photo(FileRef),
    Action(Action),
}

/// What the engine should do with the flow after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Stay,
    Done,
}

#[derive(Debug, Default)]
pub enum Flow {
    #[default]
    Idle,
    Report(ReportFlow),
    Admin(AdminFlow),
    Update(UpdateFlow),
    Search(SearchFlow),
}

impl Flow {
    pub fn name(&self) -> &'static str {
        match self {
            Flow::Idle      => "idle",
            Flow::Report(_) => "report",
            Flow::Admin(_)  => "admin",
            Flow::Update(_) => "update",
            Flow::Search(_) => "search",
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    pub flow:   Flow,
    /// Message currently used as the interactive prompt.
    pub prompt: Option<MessageId>,
}

/// Per-transition context handed to flow handlers.
pub struct Ctx<'a> {
    pub svc:     &'a Services,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub prompt:  &'a mut Option<MessageId>,
}

impl Ctx<'_> {
    pub fn now(&self) -> DateTime<Utc> {
        self.svc.clock.now()
    }

    pub fn max_screenshots(&self) -> usize {
        self.svc.config.max_screenshots
    }

    /// Replace the prompt with `message`, editing in place when possible.
    pub async fn show(&mut self, message: OutboundMessage) {
        let transport = self.svc.transport.as_ref();
        let shown = match *self.prompt {
            Some(id) => safe_edit(transport, self.chat_id, id, &message).await,
            None => safe_send(transport, self.chat_id, &message).await,
        };
        *self.prompt = shown;
    }

    /// Post a standalone message; the next prompt is sent below it.
    pub async fn say(&mut self, message: OutboundMessage) {
        safe_send(self.svc.transport.as_ref(), self.chat_id, &message).await;
        *self.prompt = None;
    }

    /// Best-effort notice; failure is logged only.
    pub async fn notify(&self, user_id: UserId, notice: Notice) {
        if let Err(e) = self.svc.notifier.notify(user_id, &notice).await {
            warn!(
                "notice {:?} for report {} to user {user_id} failed: {e}",
                notice,
                notice.report_id()
            );
        }
    }

    pub fn profile_label(profile: &ProfileRecord) -> String {
        format!(
            "{} ({} reports, {})",
            profile.display_name,
            profile.total_reports,
            render::money(profile.total_loss)
        )
    }
}
