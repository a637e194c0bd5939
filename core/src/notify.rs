//! Best-effort status notices to reporters and admins.
//!
//! RULE: a failed notice is logged by the caller and never undoes the
//! status change that triggered it.

use crate::{
    error::DeskResult,
    transport::{OutboundMessage, Transport},
    types::{ReportId, UserId},
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Verified { report_id: ReportId },
    Disputed { report_id: ReportId },
    NeedsInfo { report_id: ReportId, reason: Option<String> },
    AutoArchived { report_id: ReportId },
    /// Sent to admins when a submitter revises a report.
    ReportUpdated { report_id: ReportId, submitter_id: UserId },
}

impl Notice {
    pub fn report_id(&self) -> ReportId {
        match self {
            Notice::Verified { report_id }
            | Notice::Disputed { report_id }
            | Notice::NeedsInfo { report_id, .. }
            | Notice::AutoArchived { report_id }
            | Notice::ReportUpdated { report_id, .. } => *report_id,
        }
    }

    pub fn text(&self) -> String {
        match self {
            Notice::Verified { report_id } => format!(
                "Your report has been verified!\n\nReport ID: {report_id}\n\n\
                 Your report has been reviewed and verified by our admin team. \
                 Thank you for helping the community stay safe from scams!"
            ),
            Notice::Disputed { report_id } => format!(
                "Your report status has been updated.\n\nReport ID: {report_id}\nStatus: Disputed\n\n\
                 If you believe this is an error, you may submit a new report with additional evidence."
            ),
            Notice::NeedsInfo { report_id, reason } => {
                let mut text = format!(
                    "Admin needs more information about your report.\n\nReport ID: {report_id}\n"
                );
                if let Some(reason) = reason {
                    text.push_str(&format!("Admin note: {reason}\n"));
                }
                text.push_str(&format!(
                    "\nPlease provide the requested information within 30 days, \
                     or the report will be automatically archived.\n\n\
                     Send /start update_{report_id} to update your report."
                ));
                text
            }
            Notice::AutoArchived { report_id } => format!(
                "Your report has been automatically archived.\n\nReport ID: {report_id}\n\n\
                 This report was marked as 'Needs Info' over 30 days ago but no additional \
                 information was provided.\n\n\
                 You can still send /start update_{report_id} to add the missing details."
            ),
            Notice::ReportUpdated { report_id, submitter_id } => format!(
                "Report {report_id} was updated by its submitter ({submitter_id}) \
                 and is back in the review queue."
            ),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: UserId, notice: &Notice) -> DeskResult<()>;
}

/// Delivers notices as private chat messages (chat id = user id).
pub struct TransportNotifier {
    transport: Arc<dyn Transport>,
}

impl TransportNotifier {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Notifier for TransportNotifier {
    async fn notify(&self, user_id: UserId, notice: &Notice) -> DeskResult<()> {
        self.transport
            .send_text(user_id, &OutboundMessage::text(notice.text()))
            .await?;
        Ok(())
    }
}
