//! Report wizard tests: a reporter walks the steps through chat events.

mod common;

use common::{Desk, REPORTER};
use scamdesk_core::{
    config::DeskConfig,
    report::{ReportStatus, ReporterRole, Target, TargetKind},
    transport::RecordingTransport,
    workflow::Action,
};

/// Drive the wizard up to the amount prompt.
async fn fill_until_amount(desk: &Desk, kind: TargetKind, details: &str) {
    desk.press(REPORTER, Action::StartReport).await;
    desk.text(REPORTER, "Fake iPhone seller").await;
    desk.text(REPORTER, "Paid a deposit and the seller vanished").await;
    desk.press(REPORTER, Action::ChooseRole { role: ReporterRole::Victim }).await;
    desk.press(REPORTER, Action::ChooseTarget { kind }).await;
    desk.text(REPORTER, details).await;
}

async fn finish_from_screenshots(desk: &Desk) {
    desk.photo(REPORTER, "file-1").await;
    desk.press(REPORTER, Action::ScreenshotsDone).await;
    desk.press(REPORTER, Action::ProceedToTerms).await;
    desk.press(REPORTER, Action::AcceptTerms).await;
}

/// A complete walk stores one UNVERIFIED report and closes the flow.
#[tokio::test]
async fn full_submission_stores_report() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Bank, "112233, MAYBANK, Ali").await;
    desk.text(REPORTER, "RM 1,500").await;
    assert!(desk.last_text(REPORTER).contains("STEP 7/8"));
    finish_from_screenshots(&desk).await;

    let last = desk.last_text(REPORTER);
    assert!(last.contains("Report submitted"), "got: {last}");
    assert!(last.contains("Report ID: 1"));
    assert_eq!(desk.engine.flow_name(REPORTER).await, "idle");

    let report = desk.store().get_report(1).unwrap();
    assert_eq!(report.status, ReportStatus::Unverified);
    assert_eq!(report.submitter_id, REPORTER);
    assert_eq!(report.title, "Fake iPhone seller");
    assert_eq!(report.loss_amount, 1500.0);
    assert_eq!(
        report.target,
        Target::Bank {
            account:     "112233".into(),
            bank_name:   "MAYBANK".into(),
            holder_name: "Ali".into(),
        }
    );
    assert!(report.linked_profile_id.is_none());
    assert_eq!(desk.store().report_screenshots(1).unwrap(), vec!["file-1".to_string()]);
}

/// Extra evidence added on the confirmation step is stored with the report.
#[tokio::test]
async fn additional_evidence_is_kept() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Phone, "0123456789, Ah Chong").await;
    desk.text(REPORTER, "0").await;
    desk.photo(REPORTER, "file-1").await;
    desk.press(REPORTER, Action::ScreenshotsDone).await;
    desk.press(
        REPORTER,
        Action::AddEvidence {
            kind: scamdesk_core::report::EvidenceKind::Phone,
        },
    )
    .await;
    desk.text(REPORTER, "he also used 0198887777").await;
    assert!(desk.last_text(REPORTER).contains("Phone: 0198887777"));

    desk.press(REPORTER, Action::ProceedToTerms).await;
    desk.press(REPORTER, Action::AcceptTerms).await;

    let report = desk.store().get_report(1).unwrap();
    assert_eq!(report.evidence.len(), 1);
    assert_eq!(report.evidence[0].value, "0198887777");
}

/// Back shows the previous step together with the value already entered.
#[tokio::test]
async fn back_shows_previous_value() {
    let desk = Desk::new();
    desk.press(REPORTER, Action::StartReport).await;
    desk.text(REPORTER, "Fake iPhone seller").await;
    assert!(desk.last_text(REPORTER).contains("STEP 2/8"));

    desk.press(REPORTER, Action::Back).await;
    let last = desk.last_text(REPORTER);
    assert!(last.contains("STEP 1/8"));
    assert!(last.contains("Current: Fake iPhone seller"), "got: {last}");

    // The title step has no back button.
    let message = desk.transport.last_message(REPORTER).unwrap();
    assert!(!message.has_action(&Action::Back));
    assert!(message.has_action(&Action::Cancel));
}

/// An unparseable amount re-prompts the same step.
#[tokio::test]
async fn invalid_amount_is_reprompted() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Bank, "112233, MAYBANK, Ali").await;
    desk.text(REPORTER, "lots").await;

    let last = desk.last_text(REPORTER);
    assert!(last.contains("STEP 6/8"));
    assert!(last.contains("'lots' is not a valid amount."), "got: {last}");

    desk.text(REPORTER, "-5").await;
    assert!(desk.last_text(REPORTER).contains("zero or a positive number"));
}

/// Bank details need all three parts.
#[tokio::test]
async fn incomplete_bank_details_are_reprompted() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Bank, "112233, MAYBANK").await;
    let last = desk.last_text(REPORTER);
    assert!(last.contains("STEP 5/8"));
    assert!(last.contains("three parts"), "got: {last}");
}

/// Done without a screenshot is refused.
#[tokio::test]
async fn at_least_one_screenshot_required() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Bank, "112233, MAYBANK, Ali").await;
    desk.text(REPORTER, "100").await;
    desk.press(REPORTER, Action::ScreenshotsDone).await;

    let last = desk.last_text(REPORTER);
    assert!(last.contains("STEP 7/8"));
    assert!(last.contains("Please upload at least one screenshot."));
}

/// Photos beyond the configured maximum are refused.
#[tokio::test]
async fn screenshot_cap_is_enforced() {
    let config = DeskConfig {
        max_screenshots: 2,
        ..DeskConfig::default_test()
    };
    let desk = Desk::with(config, RecordingTransport::new());
    fill_until_amount(&desk, TargetKind::Bank, "112233, MAYBANK, Ali").await;
    desk.text(REPORTER, "100").await;
    desk.photo(REPORTER, "file-1").await;
    desk.photo(REPORTER, "file-2").await;
    desk.photo(REPORTER, "file-3").await;
    assert!(desk.last_text(REPORTER).contains("at most 2 screenshots"));

    desk.press(REPORTER, Action::ScreenshotsDone).await;
    desk.press(REPORTER, Action::ProceedToTerms).await;
    desk.press(REPORTER, Action::AcceptTerms).await;
    assert_eq!(
        desk.store().report_screenshots(1).unwrap(),
        vec!["file-1".to_string(), "file-2".to_string()]
    );
}

/// Cancel at any step discards the draft without writing.
#[tokio::test]
async fn cancel_discards_draft() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Bank, "112233, MAYBANK, Ali").await;
    desk.text(REPORTER, "100").await;
    desk.photo(REPORTER, "file-1").await;
    desk.press(REPORTER, Action::Cancel).await;

    assert!(desk.last_text(REPORTER).contains("Cancelled. Nothing was saved."));
    assert_eq!(desk.engine.flow_name(REPORTER).await, "idle");
    assert_eq!(
        desk.store().count_reports_by_status(ReportStatus::Unverified).unwrap(),
        0
    );
}

/// Choosing a different target kind drops the details typed for the old one.
#[tokio::test]
async fn switching_target_kind_clears_details() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Phone, "0123456789").await;

    desk.press(REPORTER, Action::Back).await;
    assert!(desk.last_text(REPORTER).contains("Current: 0123456789"));
    desk.press(REPORTER, Action::Back).await;
    assert!(desk.last_text(REPORTER).contains("STEP 4/8"));

    desk.press(REPORTER, Action::ChooseTarget { kind: TargetKind::Bank }).await;
    let last = desk.last_text(REPORTER);
    assert!(last.contains("STEP 5/8"));
    assert!(!last.contains("Current:"), "got: {last}");
}

/// Re-choosing the same kind keeps the details.
#[tokio::test]
async fn same_target_kind_keeps_details() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Phone, "0123456789").await;
    desk.press(REPORTER, Action::Back).await;
    desk.press(REPORTER, Action::Back).await;
    desk.press(REPORTER, Action::ChooseTarget { kind: TargetKind::Phone }).await;
    assert!(desk.last_text(REPORTER).contains("Current: 0123456789"));
}

/// A report whose account belongs to exactly one profile is provisionally
/// linked to it on submission.
#[tokio::test]
async fn submission_auto_links_known_account() {
    let desk = Desk::new();
    let profile_id = desk.verified_bank_profile("112233", "Ali", "Ali Scammer");

    fill_until_amount(&desk, TargetKind::Bank, "112233, CIMB, Ali bin Abu").await;
    desk.text(REPORTER, "250").await;
    finish_from_screenshots(&desk).await;

    let report = desk.store().get_report(2).unwrap();
    assert_eq!(report.status, ReportStatus::Unverified);
    assert_eq!(report.linked_profile_id.as_deref(), Some(profile_id.as_str()));
    // Provisional links do not touch the rollups.
    assert_eq!(desk.store().get_profile(&profile_id).unwrap().total_reports, 1);
}

/// A flow button pressed with no flow active ends in an expiry notice.
#[tokio::test]
async fn stray_button_reports_expired_session() {
    let desk = Desk::new();
    desk.press(REPORTER, Action::AcceptTerms).await;
    assert!(desk
        .last_text(REPORTER)
        .contains("This session has expired. Please start again."));
    assert_eq!(
        desk.store().count_reports_by_status(ReportStatus::Unverified).unwrap(),
        0
    );
}

/// /start resets whatever flow was open.
#[tokio::test]
async fn start_resets_open_flow() {
    let desk = Desk::new();
    desk.press(REPORTER, Action::StartReport).await;
    assert_eq!(desk.engine.flow_name(REPORTER).await, "report");

    desk.start(REPORTER, None).await;
    assert_eq!(desk.engine.flow_name(REPORTER).await, "idle");
    assert!(desk.last_text(REPORTER).contains("Welcome to PenipuMY"));
}

/// The reporter's own list shows the new report and its status.
#[tokio::test]
async fn my_reports_lists_submissions() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Bank, "112233, MAYBANK, Ali").await;
    desk.text(REPORTER, "100").await;
    finish_from_screenshots(&desk).await;

    desk.command(REPORTER, "/myreports").await;
    let last = desk.last_text(REPORTER);
    assert!(last.contains("#1"), "got: {last}");
    assert!(last.contains("Pending review"));
}

/// Prompts that cannot be edited in place are re-sent; the wizard goes on.
#[tokio::test]
async fn failed_edits_fall_back_to_new_messages() {
    let desk = Desk::with(DeskConfig::default_test(), RecordingTransport::failing_edits());
    fill_until_amount(&desk, TargetKind::Phone, "0123456789, Abu").await;
    assert!(desk.last_text(REPORTER).contains("STEP 6/8"));
    desk.text(REPORTER, "50").await;
    finish_from_screenshots(&desk).await;

    assert!(desk.last_text(REPORTER).contains("Report ID: 1"));
    assert_eq!(
        desk.store().get_report(1).unwrap().target,
        Target::Phone {
            number:       "0123456789".into(),
            display_name: Some("Abu".into()),
        }
    );
}

/// A storage failure on submit keeps the draft at the terms step; the next
/// press stores exactly one report.
#[tokio::test]
async fn failed_submit_keeps_draft() {
    let desk = Desk::new();
    fill_until_amount(&desk, TargetKind::Bank, "112233, MAYBANK, Ali").await;
    desk.text(REPORTER, "200").await;
    desk.photo(REPORTER, "file-1").await;
    desk.press(REPORTER, Action::ScreenshotsDone).await;
    desk.press(REPORTER, Action::ProceedToTerms).await;

    desk.store()
        .with_transaction(|tx| Ok(tx.execute_batch("ALTER TABLE screenshots RENAME TO screenshots_off")?))
        .unwrap();
    desk.press(REPORTER, Action::AcceptTerms).await;

    let last = desk.last_text(REPORTER);
    assert!(last.contains("Something went wrong while saving your report. Please try again."), "got: {last}");
    assert!(last.contains("STEP 8/8"));
    assert_eq!(desk.engine.flow_name(REPORTER).await, "report");
    assert!(desk.store().find_report(1).unwrap().is_none());

    desk.store()
        .with_transaction(|tx| Ok(tx.execute_batch("ALTER TABLE screenshots_off RENAME TO screenshots")?))
        .unwrap();
    desk.press(REPORTER, Action::AcceptTerms).await;

    assert!(desk.last_text(REPORTER).contains("Report ID: 1"));
    assert_eq!(desk.store().reports_by_submitter(REPORTER).unwrap().len(), 1);
    assert_eq!(desk.store().get_report(1).unwrap().loss_amount, 200.0);
    assert_eq!(desk.store().report_screenshots(1).unwrap(), vec!["file-1".to_string()]);
}

/// A chat holds a session only while a flow is open.
#[tokio::test]
async fn finished_sessions_are_released() {
    let desk = Desk::new();
    desk.start(REPORTER, None).await;
    assert_eq!(desk.engine.session_count(), 0);

    fill_until_amount(&desk, TargetKind::Phone, "0123456789, Abu").await;
    assert_eq!(desk.engine.session_count(), 1);
    desk.press(REPORTER, Action::Cancel).await;
    assert_eq!(desk.engine.session_count(), 0);

    fill_until_amount(&desk, TargetKind::Phone, "0123456789, Abu").await;
    desk.text(REPORTER, "50").await;
    finish_from_screenshots(&desk).await;
    assert!(desk.last_text(REPORTER).contains("Report ID: 1"));
    assert_eq!(desk.engine.session_count(), 0);
}
