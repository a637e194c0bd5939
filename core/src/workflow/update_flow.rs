//! Submitter update of a NEEDS_INFO or auto-archived report, entered via
//! the `/start update_<id>` deep link.
//!
//! RULES:
//!   - Only the submitter may update, and only while the report is updatable.
//!   - The addition is appended after a separator; nothing is overwritten.
//!   - Screenshots are optional here, capped like a new report.
//!   - A restored report goes back to UNVERIFIED with its provisional link
//!     re-resolved, and admins get a best-effort notice.

use super::{render, Action, Ctx, Input, Next};
use crate::{
    error::{DeskError, DeskResult},
    notify::Notice,
    report::ReportRecord,
    transport::{Button, OutboundMessage},
    types::{FileRef, ReportId},
};
use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    Description,
    Screenshots,
    Confirm,
}

#[derive(Debug, Clone)]
pub struct UpdateFlow {
    pub report_id:   ReportId,
    pub step:        UpdateStep,
    pub addition:    Option<String>,
    pub screenshots: Vec<FileRef>,
}

/// `update_42` → 42
pub fn parse_update_payload(payload: &str) -> Option<ReportId> {
    payload.strip_prefix("update_")?.trim().parse().ok()
}

/// Open the update flow, or explain why the report cannot be updated.
pub async fn start(ctx: &mut Ctx<'_>, report_id: ReportId) -> DeskResult<Option<UpdateFlow>> {
    let report = ctx
        .svc
        .store
        .find_report(report_id)?
        .filter(|r| r.submitter_id == ctx.user_id);
    let Some(report) = report else {
        ctx.show(
            OutboundMessage::text(format!("Report #{report_id} was not found among your reports."))
                .with_row(render::main_menu_row()),
        )
        .await;
        return Ok(None);
    };
    if !report.is_updatable() {
        ctx.show(not_editable(&report)).await;
        return Ok(None);
    }

    let flow = UpdateFlow {
        report_id,
        step: UpdateStep::Description,
        addition: None,
        screenshots: Vec::new(),
    };
    ctx.show(prompt(&flow, Some(&report), ctx.max_screenshots(), None)).await;
    Ok(Some(flow))
}

pub async fn handle(ctx: &mut Ctx<'_>, flow: &mut UpdateFlow, input: Input) -> DeskResult<Next> {
    let max = ctx.max_screenshots();
    let mut problem: Option<String> = None;

    match (flow.step, input) {
        (UpdateStep::Screenshots, Input::Action(Action::Back)) => flow.step = UpdateStep::Description,
        (UpdateStep::Confirm, Input::Action(Action::Back)) => flow.step = UpdateStep::Screenshots,

        (UpdateStep::Description, Input::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                problem = Some("Please describe the additional information.".into());
            } else {
                flow.addition = Some(text.to_string());
                flow.step = UpdateStep::Screenshots;
            }
        }

        (UpdateStep::Screenshots, Input::Photo(file)) => {
            if flow.screenshots.len() >= max {
                problem = Some(format!(
                    "You can upload at most {max} screenshots. Press Done to continue."
                ));
            } else {
                flow.screenshots.push(file);
            }
        }
        (UpdateStep::Screenshots, Input::Action(Action::ScreenshotsDone)) => {
            flow.step = UpdateStep::Confirm;
        }

        (UpdateStep::Confirm, Input::Action(Action::ConfirmUpdate)) => {
            return confirm(ctx, flow).await;
        }

        (_, Input::Photo(_)) => problem = Some("A photo is not expected here.".into()),
        (_, _) => problem = Some("Please follow the prompt below.".into()),
    }

    ctx.show(prompt(flow, None, max, problem.as_deref())).await;
    Ok(Next::Stay)
}

async fn confirm(ctx: &mut Ctx<'_>, flow: &mut UpdateFlow) -> DeskResult<Next> {
    let Some(addition) = flow.addition.clone() else {
        flow.step = UpdateStep::Description;
        ctx.show(prompt(flow, None, ctx.max_screenshots(), Some("Please describe the update first.")))
            .await;
        return Ok(Next::Stay);
    };

    let relink = match ctx.svc.store.find_report(flow.report_id)? {
        Some(report) => ctx
            .svc
            .aggregator
            .resolve_auto_link(&report.target)
            .unwrap_or_else(|e| {
                warn!("[Update] auto-link lookup for report {} failed: {e}", flow.report_id);
                None
            }),
        None => None,
    };

    let restored = ctx.svc.store.restore_report(
        flow.report_id,
        ctx.user_id,
        &addition,
        &flow.screenshots,
        relink.as_deref(),
        ctx.now(),
    );
    match restored {
        Ok(report) => {
            info!(
                "[Update] report {} restored by user {} with {} new screenshots",
                report.report_id,
                ctx.user_id,
                flow.screenshots.len()
            );
            let notice = Notice::ReportUpdated {
                report_id:    report.report_id,
                submitter_id: report.submitter_id,
            };
            for admin in &ctx.svc.config.admin_user_ids {
                ctx.notify(*admin, notice.clone()).await;
            }
            ctx.show(
                OutboundMessage::text(format!(
                    "✅ Report #{} updated and sent back for review.\n\nThank you for the additional information.",
                    report.report_id
                ))
                .with_row(render::main_menu_row()),
            )
            .await;
            Ok(Next::Done)
        }
        Err(DeskError::NotEditable { report_id, status }) => {
            ctx.show(
                OutboundMessage::text(format!(
                    "Report #{report_id} can no longer be updated (status {status}). \
                     Please start again from the main menu."
                ))
                .with_row(render::main_menu_row()),
            )
            .await;
            Ok(Next::Done)
        }
        Err(e) => {
            error!("[Update] restoring report {} failed: {e}", flow.report_id);
            ctx.show(prompt(
                flow,
                None,
                ctx.max_screenshots(),
                Some("Something went wrong while saving your update. Please try again."),
            ))
            .await;
            Ok(Next::Stay)
        }
    }
}

fn not_editable(report: &ReportRecord) -> OutboundMessage {
    OutboundMessage::text(format!(
        "Report #{} cannot be updated. Current status: {}.",
        report.report_id,
        render::status_label(report.status)
    ))
    .with_row(render::main_menu_row())
}

/// `report` is passed on entry so the admin's note can be shown once.
fn prompt(
    flow: &UpdateFlow,
    report: Option<&ReportRecord>,
    max_screenshots: usize,
    problem: Option<&str>,
) -> OutboundMessage {
    let mut text = format!("✏️ UPDATE REPORT #{}\n\n", flow.report_id);
    if let Some(note) = report.and_then(|r| r.admin_note.as_deref()) {
        text.push_str(&format!("Admin note: {note}\n\n"));
    }
    let mut rows: Vec<Vec<Button>> = Vec::new();
    match flow.step {
        UpdateStep::Description => {
            text.push_str("Send the additional information for your report.");
            if let Some(addition) = &flow.addition {
                text.push_str(&format!("\n\nCurrent: {addition}"));
            }
        }
        UpdateStep::Screenshots => {
            text.push_str(&format!(
                "Upload more screenshots if you have them (optional).\nUploaded: {}/{max_screenshots}",
                flow.screenshots.len()
            ));
            rows.push(vec![Button::new("✅ Done", Action::ScreenshotsDone)]);
        }
        UpdateStep::Confirm => {
            text.push_str(&format!(
                "Your update:\n{}\n\nNew screenshots: {}\n\nSend it for review?",
                flow.addition.as_deref().unwrap_or("-"),
                flow.screenshots.len()
            ));
            rows.push(vec![Button::new("✅ Submit update", Action::ConfirmUpdate)]);
        }
    }
    if let Some(problem) = problem {
        text.push_str(&format!("\n\n⚠️ {problem}"));
    }
    let mut message = OutboundMessage::text(text);
    for row in rows {
        message = message.with_row(row);
    }
    message.with_row(render::back_cancel_row(flow.step != UpdateStep::Description))
}

#[cfg(test)]
mod tests {
    use super::parse_update_payload;

    #[test]
    fn update_payload_carries_report_id() {
        assert_eq!(parse_update_payload("update_42"), Some(42));
        assert_eq!(parse_update_payload("update_x"), None);
        assert_eq!(parse_update_payload("report"), None);
    }
}
