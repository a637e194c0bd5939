//! Shared harness for the integration tests: an in-memory desk driven by
//! chat events, a recording transport and a hand-moved clock.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use scamdesk_core::{
    clock::{Clock, ManualClock},
    config::DeskConfig,
    engine::DeskEngine,
    report::{NewReport, ReporterRole, Target},
    store::{DeskStore, NewUser},
    transport::RecordingTransport,
    types::{ProfileId, ReportId, UserId},
    workflow::{Action, Envelope, Inbound},
};
use std::sync::Arc;

pub const REPORTER: UserId = 100;
pub const OTHER_REPORTER: UserId = 101;
pub const ADMIN: UserId = 900;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Desk {
    pub engine:    DeskEngine,
    pub transport: Arc<RecordingTransport>,
    pub clock:     Arc<ManualClock>,
}

impl Desk {
    pub fn new() -> Self {
        Self::with(DeskConfig::default_test(), RecordingTransport::new())
    }

    pub fn with(config: DeskConfig, transport: RecordingTransport) -> Self {
        init_logs();
        let transport = Arc::new(transport);
        let clock = Arc::new(ManualClock::new(start_time()));
        let engine = DeskEngine::build_test_with(config, transport.clone(), clock.clone()).unwrap();
        Self {
            engine,
            transport,
            clock,
        }
    }

    pub fn store(&self) -> &DeskStore {
        self.engine.store()
    }

    /// Private chat: chat id equals user id.
    pub async fn send(&self, user_id: UserId, event: Inbound) {
        let envelope = Envelope {
            chat_id: user_id,
            sender: NewUser {
                user_id,
                username: Some(format!("user{user_id}")),
                first_name: Some("Test".into()),
                last_name: None,
            },
            message_id: None,
            event,
        };
        self.engine.handle(envelope).await.unwrap();
    }

    pub async fn start(&self, user_id: UserId, payload: Option<&str>) {
        self.send(
            user_id,
            Inbound::Start {
                payload: payload.map(str::to_string),
            },
        )
        .await;
    }

    pub async fn command(&self, user_id: UserId, name: &str) {
        self.send(user_id, Inbound::Command { name: name.into() }).await;
    }

    pub async fn text(&self, user_id: UserId, text: &str) {
        self.send(user_id, Inbound::Text { text: text.into() }).await;
    }

    pub async fn photo(&self, user_id: UserId, file: &str) {
        self.send(user_id, Inbound::Photo { file: file.into() }).await;
    }

    pub async fn press(&self, user_id: UserId, action: Action) {
        self.send(user_id, Inbound::Action { action }).await;
    }

    pub fn last_text(&self, user_id: UserId) -> String {
        self.transport.last_text(user_id)
    }

    pub fn texts(&self, user_id: UserId) -> Vec<String> {
        self.transport.texts(user_id)
    }

    /// Insert a bank report straight into the store.
    pub fn bank_report(
        &self,
        submitter_id: UserId,
        account: &str,
        holder: &str,
        loss_amount: f64,
    ) -> ReportId {
        let report = NewReport {
            submitter_id,
            title: format!("Scam by {holder}"),
            description: "Paid for goods that never arrived".into(),
            reporter_role: ReporterRole::Victim,
            loss_amount,
            target: Target::Bank {
                account:     account.into(),
                bank_name:   "MAYBANK".into(),
                holder_name: holder.into(),
            },
            evidence: Vec::new(),
            screenshots: vec![format!("shot-{account}-1")],
            linked_profile_id: None,
        };
        self.store().insert_report(&report, self.clock.now()).unwrap()
    }

    /// A verified profile built from one bank report.
    pub fn verified_bank_profile(&self, account: &str, holder: &str, name: &str) -> ProfileId {
        let report_id = self.bank_report(REPORTER, account, holder, 500.0);
        self.engine
            .aggregator()
            .create_profile_and_link(report_id, name)
            .unwrap()
            .profile
            .profile_id
    }
}
