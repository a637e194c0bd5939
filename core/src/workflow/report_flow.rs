//! Report submission: a linear wizard with back-navigation.
//!
//! Title → Description → Role → Target kind → Target details → Amount →
//! Screenshots → Confirmation (optional extra evidence) → Terms → submit.
//!
//! RULES:
//!   - Back returns to the previous step and shows the value entered there.
//!   - Switching target kind discards target details entered for the old kind.
//!   - At least one and at most `max_screenshots` screenshots.
//!   - A failed save keeps the draft on the Terms step.

use super::{render, Action, Ctx, Input, Next};
use crate::{
    error::DeskResult,
    report::{
        parse_amount, Evidence, EvidenceKind, NewReport, ReporterRole, Target, TargetKind,
    },
    transport::{Button, OutboundMessage},
    types::{FileRef, UserId},
};
use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStep {
    Title,
    Description,
    Role,
    TargetKind,
    TargetDetails,
    Amount,
    Screenshots,
    Confirmation,
    AddEvidence(EvidenceKind),
    Terms,
}

impl ReportStep {
    fn previous(&self) -> Option<ReportStep> {
        match self {
            ReportStep::Title          => None,
            ReportStep::Description    => Some(ReportStep::Title),
            ReportStep::Role           => Some(ReportStep::Description),
            ReportStep::TargetKind     => Some(ReportStep::Role),
            ReportStep::TargetDetails  => Some(ReportStep::TargetKind),
            ReportStep::Amount         => Some(ReportStep::TargetDetails),
            ReportStep::Screenshots    => Some(ReportStep::Amount),
            ReportStep::Confirmation   => Some(ReportStep::Screenshots),
            ReportStep::AddEvidence(_) => Some(ReportStep::Confirmation),
            ReportStep::Terms          => Some(ReportStep::Confirmation),
        }
    }

    fn number(&self) -> u8 {
        match self {
            ReportStep::Title          => 1,
            ReportStep::Description    => 2,
            ReportStep::Role           => 3,
            ReportStep::TargetKind     => 4,
            ReportStep::TargetDetails  => 5,
            ReportStep::Amount         => 6,
            ReportStep::Screenshots    => 7,
            ReportStep::Confirmation
            | ReportStep::AddEvidence(_)
            | ReportStep::Terms        => 8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportDraft {
    pub title:       Option<String>,
    pub description: Option<String>,
    pub role:        Option<ReporterRole>,
    pub target_kind: Option<TargetKind>,
    pub target:      Option<Target>,
    pub amount:      Option<f64>,
    pub screenshots: Vec<FileRef>,
    pub evidence:    Vec<Evidence>,
}

impl ReportDraft {
    /// The finished report, or the first step still missing a value.
    pub fn to_new_report(&self, submitter_id: UserId) -> Result<NewReport, ReportStep> {
        let title = self.title.clone().ok_or(ReportStep::Title)?;
        let description = self.description.clone().ok_or(ReportStep::Description)?;
        let reporter_role = self.role.ok_or(ReportStep::Role)?;
        if self.target_kind.is_none() {
            return Err(ReportStep::TargetKind);
        }
        let target = self.target.clone().ok_or(ReportStep::TargetDetails)?;
        let loss_amount = self.amount.ok_or(ReportStep::Amount)?;
        if self.screenshots.is_empty() {
            return Err(ReportStep::Screenshots);
        }
        Ok(NewReport {
            submitter_id,
            title,
            description,
            reporter_role,
            loss_amount,
            target,
            evidence: self.evidence.clone(),
            screenshots: self.screenshots.clone(),
            linked_profile_id: None,
        })
    }

    fn summary(&self) -> String {
        let dash = || "-".to_string();
        let mut text = format!(
            "Title: {}\nDescription: {}\nRole: {}\nTarget: {}\nLoss: {}\nScreenshots: {}\n",
            self.title.clone().unwrap_or_else(dash),
            self.description.clone().unwrap_or_else(dash),
            self.role.map(|r| r.label().to_string()).unwrap_or_else(dash),
            self.target.as_ref().map(Target::as_input).unwrap_or_else(dash),
            self.amount.map(render::money).unwrap_or_else(dash),
            self.screenshots.len(),
        );
        if !self.evidence.is_empty() {
            text.push_str("Additional evidence:\n");
            for fact in &self.evidence {
                text.push_str(&format!("  • {}\n", fact.display()));
            }
        }
        text
    }
}

#[derive(Debug, Clone)]
pub struct ReportFlow {
    pub step:  ReportStep,
    pub draft: ReportDraft,
}

impl Default for ReportFlow {
    fn default() -> Self {
        Self {
            step:  ReportStep::Title,
            draft: ReportDraft::default(),
        }
    }
}

pub async fn start(ctx: &mut Ctx<'_>) -> ReportFlow {
    let flow = ReportFlow::default();
    ctx.show(prompt(&flow, ctx.max_screenshots(), None)).await;
    flow
}

pub async fn handle(ctx: &mut Ctx<'_>, flow: &mut ReportFlow, input: Input) -> DeskResult<Next> {
    let max = ctx.max_screenshots();
    let mut problem: Option<String> = None;

    match (flow.step, input) {
        (step, Input::Action(Action::Back)) => {
            if let Some(previous) = step.previous() {
                flow.step = previous;
            }
        }

        (ReportStep::Title, Input::Text(text)) => match non_empty(&text) {
            Some(title) => {
                flow.draft.title = Some(title);
                flow.step = ReportStep::Description;
            }
            None => problem = Some("The title cannot be empty.".into()),
        },

        (ReportStep::Description, Input::Text(text)) => match non_empty(&text) {
            Some(description) => {
                flow.draft.description = Some(description);
                flow.step = ReportStep::Role;
            }
            None => problem = Some("The description cannot be empty.".into()),
        },

        (ReportStep::Role, Input::Action(Action::ChooseRole { role })) => {
            flow.draft.role = Some(role);
            flow.step = ReportStep::TargetKind;
        }

        (ReportStep::TargetKind, Input::Action(Action::ChooseTarget { kind })) => {
            if flow.draft.target_kind != Some(kind) {
                flow.draft.target = None;
            }
            flow.draft.target_kind = Some(kind);
            flow.step = ReportStep::TargetDetails;
        }

        (ReportStep::TargetDetails, Input::Text(text)) => match flow.draft.target_kind {
            Some(kind) => match Target::parse_details(kind, &text) {
                Ok(target) => {
                    flow.draft.target = Some(target);
                    flow.step = ReportStep::Amount;
                }
                Err(reason) => problem = Some(reason),
            },
            None => flow.step = ReportStep::TargetKind,
        },

        (ReportStep::Amount, Input::Text(text)) => match parse_amount(&text) {
            Ok(amount) => {
                flow.draft.amount = Some(amount);
                flow.step = ReportStep::Screenshots;
            }
            Err(reason) => problem = Some(reason),
        },

        (ReportStep::Screenshots, Input::Photo(file)) => {
            if flow.draft.screenshots.len() >= max {
                problem = Some(format!(
                    "You can upload at most {max} screenshots. Press Done to continue."
                ));
            } else {
                flow.draft.screenshots.push(file);
            }
        }

        (ReportStep::Screenshots, Input::Action(Action::ScreenshotsDone)) => {
            if flow.draft.screenshots.is_empty() {
                problem = Some("Please upload at least one screenshot.".into());
            } else {
                flow.step = ReportStep::Confirmation;
            }
        }

        (ReportStep::Confirmation, Input::Action(Action::AddEvidence { kind })) => {
            flow.step = ReportStep::AddEvidence(kind);
        }

        (ReportStep::AddEvidence(kind), Input::Text(text)) => {
            match Evidence::from_input(kind, &text) {
                Ok(fact) => {
                    flow.draft.evidence.push(fact);
                    flow.step = ReportStep::Confirmation;
                }
                Err(reason) => problem = Some(reason),
            }
        }

        (ReportStep::Confirmation, Input::Action(Action::ProceedToTerms)) => {
            flow.step = ReportStep::Terms;
        }

        (ReportStep::Terms, Input::Action(Action::AcceptTerms)) => {
            return submit(ctx, flow).await;
        }

        (step, Input::Photo(_)) => {
            warn!("[Report] unexpected photo at step {step:?} from user {}", ctx.user_id);
            problem = Some("A photo is not expected here.".into());
        }
        (_, Input::Text(_)) => problem = Some("Please use the buttons below.".into()),
        (_, Input::Action(_)) => problem = Some("That option is no longer available here.".into()),
    }

    ctx.show(prompt(flow, max, problem.as_deref())).await;
    Ok(Next::Stay)
}

async fn submit(ctx: &mut Ctx<'_>, flow: &mut ReportFlow) -> DeskResult<Next> {
    let max = ctx.max_screenshots();
    let mut report = match flow.draft.to_new_report(ctx.user_id) {
        Ok(report) => report,
        Err(missing) => {
            flow.step = missing;
            ctx.show(prompt(flow, max, Some("This step still needs an answer."))).await;
            return Ok(Next::Stay);
        }
    };

    report.linked_profile_id = match ctx.svc.aggregator.resolve_auto_link(&report.target) {
        Ok(link) => link,
        Err(e) => {
            warn!("[Report] auto-link lookup failed, submitting unlinked: {e}");
            None
        }
    };

    match ctx.svc.store.insert_report(&report, ctx.now()) {
        Ok(report_id) => {
            info!(
                "[Report] #{report_id} submitted by user {} (target={}, linked={:?})",
                ctx.user_id,
                report.target.kind().as_str(),
                report.linked_profile_id
            );
            ctx.show(
                OutboundMessage::text(format!(
                    "✅ Report submitted!\n\nReport ID: {report_id}\n\n\
                     Our admins will review it shortly. You will be notified when its status changes."
                ))
                .with_row(render::main_menu_row()),
            )
            .await;
            Ok(Next::Done)
        }
        Err(e) => {
            error!("[Report] saving report from user {} failed: {e}", ctx.user_id);
            ctx.show(prompt(
                flow,
                max,
                Some("Something went wrong while saving your report. Please try again."),
            ))
            .await;
            Ok(Next::Stay)
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Prompt for the flow's current step, with an optional problem line.
pub fn prompt(flow: &ReportFlow, max_screenshots: usize, problem: Option<&str>) -> OutboundMessage {
    let draft = &flow.draft;
    let header = format!("📝 NEW REPORT · STEP {}/8\n\n", flow.step.number());
    let (body, current, rows): (String, Option<String>, Vec<Vec<Button>>) = match flow.step {
        ReportStep::Title => (
            "Give your report a short title.".into(),
            draft.title.clone(),
            vec![],
        ),
        ReportStep::Description => (
            "Describe what happened.".into(),
            draft.description.clone(),
            vec![],
        ),
        ReportStep::Role => (
            "Which describes you?".into(),
            draft.role.map(|r| r.label().to_string()),
            [ReporterRole::Victim, ReporterRole::Witness, ReporterRole::Awareness]
                .into_iter()
                .map(|role| vec![Button::new(role.label(), Action::ChooseRole { role })])
                .collect(),
        ),
        ReportStep::TargetKind => (
            "What are you reporting?".into(),
            draft.target_kind.map(|k| k.as_str().to_string()),
            vec![vec![
                Button::new("📱 Phone", Action::ChooseTarget { kind: TargetKind::Phone }),
                Button::new("🏦 Bank", Action::ChooseTarget { kind: TargetKind::Bank }),
                Button::new("🌐 Social", Action::ChooseTarget { kind: TargetKind::Social }),
            ]],
        ),
        ReportStep::TargetDetails => (
            draft
                .target_kind
                .map(|k| k.details_hint().to_string())
                .unwrap_or_default(),
            draft.target.as_ref().map(Target::as_input),
            vec![],
        ),
        ReportStep::Amount => (
            "How much money was lost? Send 0 if none.".into(),
            draft.amount.map(render::money),
            vec![],
        ),
        ReportStep::Screenshots => (
            format!(
                "Upload screenshots of the conversation or transfer (1 to {max_screenshots}).\n\
                 Uploaded: {}/{max_screenshots}",
                draft.screenshots.len()
            ),
            None,
            vec![vec![Button::new("✅ Done", Action::ScreenshotsDone)]],
        ),
        ReportStep::Confirmation => (
            format!(
                "Please check your report:\n\n{}\nYou can add more phone numbers, bank accounts \
                 or social links used by the scammer.",
                draft.summary()
            ),
            None,
            vec![
                vec![
                    Button::new("+ Phone", Action::AddEvidence { kind: EvidenceKind::Phone }),
                    Button::new("+ Bank", Action::AddEvidence { kind: EvidenceKind::Bank }),
                    Button::new("+ Social", Action::AddEvidence { kind: EvidenceKind::Social }),
                ],
                vec![Button::new("Continue »", Action::ProceedToTerms)],
            ],
        ),
        ReportStep::AddEvidence(kind) => (
            format!("Send the additional {} detail.", kind.label().to_lowercase()),
            None,
            vec![],
        ),
        ReportStep::Terms => (
            "By submitting you confirm that this report is true to the best of your knowledge \
             and that the details may be shown to other users once verified."
                .into(),
            None,
            vec![vec![Button::new("✅ I agree, submit", Action::AcceptTerms)]],
        ),
    };

    let mut text = header + &body;
    if let Some(current) = current {
        text.push_str(&format!("\n\nCurrent: {current}"));
    }
    if let Some(problem) = problem {
        text.push_str(&format!("\n\n⚠️ {problem}"));
    }
    let mut message = OutboundMessage::text(text);
    for row in rows {
        message = message.with_row(row);
    }
    message.with_row(render::back_cancel_row(flow.step.previous().is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_reports_first_missing_step() {
        let mut draft = ReportDraft {
            title: Some("t".into()),
            description: Some("d".into()),
            ..ReportDraft::default()
        };
        assert_eq!(draft.to_new_report(1).unwrap_err(), ReportStep::Role);
        draft.role = Some(ReporterRole::Victim);
        draft.target_kind = Some(TargetKind::Phone);
        draft.target = Target::parse_details(TargetKind::Phone, "0123456789").ok();
        draft.amount = Some(0.0);
        assert_eq!(draft.to_new_report(1).unwrap_err(), ReportStep::Screenshots);
        draft.screenshots.push("f1".into());
        assert!(draft.to_new_report(1).is_ok());
    }

    #[test]
    fn back_chain_ends_at_title() {
        let mut step = ReportStep::Terms;
        let mut hops = 0;
        while let Some(previous) = step.previous() {
            step = previous;
            hops += 1;
        }
        assert_eq!(step, ReportStep::Title);
        assert_eq!(hops, 8);
    }
}
