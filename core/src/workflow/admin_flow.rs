//! Admin review queue.
//!
//! RULES:
//!   - Only UNVERIFIED reports are reviewed, oldest first.
//!   - Skipped reports stay out of this session's queue until it runs dry.
//!   - Every status change is followed by a best-effort notice to the
//!     submitter; a failed notice never undoes the change.
//!   - Verify, dispute and needs-info end back at the menu. A report
//!     handled concurrently by another admin is reported as a conflict.

use super::{render, Action, Ctx, Input, Next};
use crate::{
    aggregator::LinkOutcome,
    error::{DeskError, DeskResult},
    notify::Notice,
    report::{ReportRecord, ReportStatus},
    transport::{safe_delete, Button, OutboundMessage},
    types::{MessageId, ReportId},
};
use log::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminStep {
    Menu,
    Reviewing { report_id: ReportId },
    LinkChoice { report_id: ReportId },
    NewProfileName { report_id: ReportId },
    NeedsInfoReason { report_id: ReportId },
}

#[derive(Debug, Clone)]
pub struct AdminFlow {
    pub step:    AdminStep,
    pub skipped: Vec<ReportId>,
    album:       Vec<MessageId>,
}

impl Default for AdminFlow {
    fn default() -> Self {
        Self {
            step:    AdminStep::Menu,
            skipped: Vec::new(),
            album:   Vec::new(),
        }
    }
}

pub async fn start(ctx: &mut Ctx<'_>) -> DeskResult<AdminFlow> {
    let flow = AdminFlow::default();
    show_menu(ctx, None).await?;
    Ok(flow)
}

pub async fn handle(ctx: &mut Ctx<'_>, flow: &mut AdminFlow, input: Input) -> DeskResult<Next> {
    match (flow.step.clone(), input) {
        (AdminStep::Menu, Input::Action(Action::ReviewQueue)) => {
            show_next(ctx, flow).await?;
        }
        (AdminStep::Menu, Input::Action(Action::Back)) => return Ok(Next::Done),

        (AdminStep::Reviewing { .. }, Input::Action(Action::Back)) => {
            clear_album(ctx, flow).await;
            flow.step = AdminStep::Menu;
            show_menu(ctx, None).await?;
        }

        (AdminStep::Reviewing { report_id }, Input::Action(Action::Skip)) => {
            flow.skipped.push(report_id);
            show_next(ctx, flow).await?;
        }

        (AdminStep::Reviewing { report_id }, Input::Action(Action::Verify)) => {
            let Some(report) = ctx.svc.store.find_report(report_id)? else {
                let note = format!("Report #{report_id} no longer exists.");
                return back_to_menu(ctx, flow, Some(note)).await.map(|_| Next::Stay);
            };
            if report.status != ReportStatus::Unverified {
                let note = already_handled(report_id);
                return back_to_menu(ctx, flow, Some(note)).await.map(|_| Next::Stay);
            }
            show_link_choice(ctx, flow, &report).await?;
        }

        (AdminStep::Reviewing { report_id }, Input::Action(Action::Dispute)) => {
            match ctx.svc.store.mark_disputed(report_id) {
                Ok(()) => {
                    info!("[Admin] user {} disputed report {report_id}", ctx.user_id);
                    notify_submitter(ctx, report_id, Notice::Disputed { report_id }).await;
                    let note = format!("Report #{report_id} marked as disputed.");
                    back_to_menu(ctx, flow, Some(note)).await?;
                }
                Err(e) if e.is_conflict() || matches!(e, DeskError::ReportNotFound { .. }) => {
                    back_to_menu(ctx, flow, Some(already_handled(report_id))).await?;
                }
                Err(e) => return Err(e),
            }
        }

        (AdminStep::Reviewing { report_id }, Input::Action(Action::RequestInfo)) => {
            flow.step = AdminStep::NeedsInfoReason { report_id };
            ctx.show(
                OutboundMessage::text(format!(
                    "Report #{report_id}\n\nWhat information is missing? Send a note for the reporter, \
                     or continue without one."
                ))
                .with_row(vec![Button::new("Continue without note", Action::NoReason)])
                .with_row(vec![Button::new("« Back", Action::Back)]),
            )
            .await;
        }

        (AdminStep::NeedsInfoReason { report_id }, Input::Text(text)) => {
            let reason = text.trim().to_string();
            let reason = (!reason.is_empty()).then_some(reason);
            request_info(ctx, flow, report_id, reason).await?;
        }
        (AdminStep::NeedsInfoReason { report_id }, Input::Action(Action::NoReason)) => {
            request_info(ctx, flow, report_id, None).await?;
        }

        (AdminStep::LinkChoice { report_id }, Input::Action(Action::LinkProfile { profile_id })) => {
            let outcome = ctx.svc.aggregator.link_report(report_id, &profile_id);
            finish_link(ctx, flow, report_id, outcome).await?;
        }
        (AdminStep::LinkChoice { report_id }, Input::Action(Action::NewProfile)) => {
            let report = ctx.svc.store.get_report(report_id)?;
            show_name_prompt(ctx, flow, &report, None).await;
        }

        (AdminStep::NewProfileName { report_id }, Input::Text(name)) => {
            let outcome = ctx.svc.aggregator.create_profile_and_link(report_id, &name);
            finish_link(ctx, flow, report_id, outcome).await?;
        }

        (
            AdminStep::LinkChoice { report_id }
            | AdminStep::NewProfileName { report_id }
            | AdminStep::NeedsInfoReason { report_id },
            Input::Action(Action::Back),
        ) => {
            let report = ctx.svc.store.get_report(report_id)?;
            flow.step = AdminStep::Reviewing { report_id };
            ctx.show(review_card(&report, None)).await;
        }

        (step, input) => {
            warn!("[Admin] ignored {input:?} at {step:?}");
            reshow(ctx, flow).await?;
        }
    }
    Ok(Next::Stay)
}

async fn show_menu(ctx: &mut Ctx<'_>, note: Option<String>) -> DeskResult<()> {
    let pending = ctx.svc.store.count_reports_by_status(ReportStatus::Unverified)?;
    let waiting = ctx.svc.store.count_reports_by_status(ReportStatus::NeedsInfo)?;
    let mut text = String::new();
    if let Some(note) = note {
        text.push_str(&format!("{note}\n\n"));
    }
    text.push_str(&format!(
        "🛡 Admin panel\n\nPending review: {pending}\nWaiting for reporter: {waiting}"
    ));
    ctx.show(
        OutboundMessage::text(text)
            .with_row(vec![Button::new("📋 Review reports", Action::ReviewQueue)])
            .with_row(render::main_menu_row()),
    )
    .await;
    Ok(())
}

/// Finish the current action and return to the menu.
async fn back_to_menu(ctx: &mut Ctx<'_>, flow: &mut AdminFlow, note: Option<String>) -> DeskResult<()> {
    clear_album(ctx, flow).await;
    flow.step = AdminStep::Menu;
    show_menu(ctx, note).await
}

async fn clear_album(ctx: &mut Ctx<'_>, flow: &mut AdminFlow) {
    for message_id in flow.album.drain(..) {
        safe_delete(ctx.svc.transport.as_ref(), ctx.chat_id, message_id).await;
    }
}

/// Show the oldest pending report not skipped in this session.
async fn show_next(ctx: &mut Ctx<'_>, flow: &mut AdminFlow) -> DeskResult<()> {
    clear_album(ctx, flow).await;

    let Some(report) = ctx.svc.store.next_unverified(&flow.skipped)? else {
        flow.skipped.clear();
        flow.step = AdminStep::Menu;
        return show_menu(ctx, Some("All reports have been reviewed.".into())).await;
    };

    let screenshots = ctx.svc.store.report_screenshots(report.report_id)?;
    if !screenshots.is_empty() {
        // Album goes above the review card.
        if let Some(prompt) = ctx.prompt.take() {
            safe_delete(ctx.svc.transport.as_ref(), ctx.chat_id, prompt).await;
        }
        let caption = format!("Report #{} screenshots", report.report_id);
        match ctx
            .svc
            .transport
            .send_album(ctx.chat_id, &screenshots, Some(&caption))
            .await
        {
            Ok(ids) => flow.album = ids,
            Err(e) => warn!("[Admin] screenshots of report {} not shown: {e}", report.report_id),
        }
    }

    flow.step = AdminStep::Reviewing {
        report_id: report.report_id,
    };
    ctx.show(review_card(&report, None)).await;
    Ok(())
}

fn review_card(report: &ReportRecord, note: Option<&str>) -> OutboundMessage {
    let mut text = String::new();
    if let Some(note) = note {
        text.push_str(&format!("{note}\n\n"));
    }
    text.push_str(&render::report_card(report));
    if let Some(linked) = &report.linked_profile_id {
        text.push_str(&format!("\n\nMatches existing profile {linked}"));
    }
    OutboundMessage::text(text)
        .with_row(vec![
            Button::new("✅ Verify", Action::Verify),
            Button::new("❌ Dispute", Action::Dispute),
        ])
        .with_row(vec![
            Button::new("❓ Needs info", Action::RequestInfo),
            Button::new("⏭ Skip", Action::Skip),
        ])
        .with_row(vec![Button::new("« Back", Action::Back)])
}

async fn show_link_choice(
    ctx: &mut Ctx<'_>,
    flow: &mut AdminFlow,
    report: &ReportRecord,
) -> DeskResult<()> {
    let candidates = ctx.svc.aggregator.candidate_profiles(report)?;
    if candidates.is_empty() {
        show_name_prompt(ctx, flow, report, None).await;
        return Ok(());
    }
    flow.step = AdminStep::LinkChoice {
        report_id: report.report_id,
    };
    let mut message = OutboundMessage::text(format!(
        "Report #{}\n\nLink to an existing profile or create a new one.",
        report.report_id
    ));
    for profile in candidates {
        message = message.with_row(vec![Button::new(
            Ctx::profile_label(&profile),
            Action::LinkProfile {
                profile_id: profile.profile_id,
            },
        )]);
    }
    ctx.show(
        message
            .with_row(vec![Button::new("➕ New profile", Action::NewProfile)])
            .with_row(vec![Button::new("« Back", Action::Back)]),
    )
    .await;
    Ok(())
}

async fn show_name_prompt(
    ctx: &mut Ctx<'_>,
    flow: &mut AdminFlow,
    report: &ReportRecord,
    problem: Option<&str>,
) {
    flow.step = AdminStep::NewProfileName {
        report_id: report.report_id,
    };
    let mut text = format!(
        "Report #{}\n\nSend the name for the new scammer profile.",
        report.report_id
    );
    if let Some(name) = report.target.attached_name() {
        text.push_str(&format!("\nName given by the reporter: {name}"));
    }
    if let Some(problem) = problem {
        text.push_str(&format!("\n\n⚠️ {problem}"));
    }
    ctx.show(OutboundMessage::text(text).with_row(vec![Button::new("« Back", Action::Back)]))
        .await;
}

async fn finish_link(
    ctx: &mut Ctx<'_>,
    flow: &mut AdminFlow,
    report_id: ReportId,
    outcome: DeskResult<LinkOutcome>,
) -> DeskResult<()> {
    match outcome {
        Ok(outcome) => {
            info!(
                "[Admin] user {} verified report {report_id} into {} (new={})",
                ctx.user_id, outcome.profile.profile_id, outcome.created_profile
            );
            notify_submitter(ctx, report_id, Notice::Verified { report_id }).await;
            let note = format!(
                "Report #{report_id} verified and linked to {}.",
                Ctx::profile_label(&outcome.profile)
            );
            back_to_menu(ctx, flow, Some(note)).await
        }
        Err(DeskError::Validation(problem)) => {
            let report = ctx.svc.store.get_report(report_id)?;
            show_name_prompt(ctx, flow, &report, Some(&problem)).await;
            Ok(())
        }
        Err(DeskError::ProfileNotFound { profile_id }) => {
            let report = ctx.svc.store.get_report(report_id)?;
            flow.step = AdminStep::Reviewing { report_id };
            let note = format!("Profile {profile_id} no longer exists.");
            ctx.show(review_card(&report, Some(&note))).await;
            Ok(())
        }
        Err(e) if e.is_conflict() || matches!(e, DeskError::ReportNotFound { .. }) => {
            back_to_menu(ctx, flow, Some(already_handled(report_id))).await
        }
        Err(e) => {
            error!("[Admin] linking report {report_id} failed: {e}");
            Err(e)
        }
    }
}

async fn request_info(
    ctx: &mut Ctx<'_>,
    flow: &mut AdminFlow,
    report_id: ReportId,
    reason: Option<String>,
) -> DeskResult<()> {
    match ctx
        .svc
        .store
        .mark_needs_info(report_id, reason.as_deref(), ctx.now())
    {
        Ok(()) => {
            info!("[Admin] user {} asked for more info on report {report_id}", ctx.user_id);
            notify_submitter(ctx, report_id, Notice::NeedsInfo { report_id, reason }).await;
            let note = format!("Report #{report_id} sent back to the reporter for more information.");
            back_to_menu(ctx, flow, Some(note)).await
        }
        Err(e) if e.is_conflict() || matches!(e, DeskError::ReportNotFound { .. }) => {
            back_to_menu(ctx, flow, Some(already_handled(report_id))).await
        }
        Err(e) => Err(e),
    }
}

async fn notify_submitter(ctx: &Ctx<'_>, report_id: ReportId, notice: Notice) {
    match ctx.svc.store.find_report(report_id) {
        Ok(Some(report)) => ctx.notify(report.submitter_id, notice).await,
        Ok(None) => warn!("[Admin] report {report_id} vanished before notice"),
        Err(e) => warn!("[Admin] submitter of report {report_id} not resolved: {e}"),
    }
}

async fn reshow(ctx: &mut Ctx<'_>, flow: &mut AdminFlow) -> DeskResult<()> {
    match flow.step.clone() {
        AdminStep::Menu => show_menu(ctx, None).await,
        AdminStep::Reviewing { report_id } => {
            let report = ctx.svc.store.get_report(report_id)?;
            ctx.show(review_card(&report, Some("Please use the buttons below."))).await;
            Ok(())
        }
        AdminStep::LinkChoice { report_id } => {
            let report = ctx.svc.store.get_report(report_id)?;
            show_link_choice(ctx, flow, &report).await
        }
        AdminStep::NewProfileName { report_id } => {
            let report = ctx.svc.store.get_report(report_id)?;
            show_name_prompt(ctx, flow, &report, Some("Please send the profile name as text.")).await;
            Ok(())
        }
        AdminStep::NeedsInfoReason { report_id } => {
            ctx.show(
                OutboundMessage::text(format!(
                    "Report #{report_id}\n\nSend a note for the reporter, or continue without one."
                ))
                .with_row(vec![Button::new("Continue without note", Action::NoReason)])
                .with_row(vec![Button::new("« Back", Action::Back)]),
            )
            .await;
            Ok(())
        }
    }
}

fn already_handled(report_id: ReportId) -> String {
    format!("Report #{report_id} was already handled by another admin.")
}
