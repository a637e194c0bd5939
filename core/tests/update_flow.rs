//! Submitter updates through the `/start update_<id>` deep link.

mod common;

use common::{Desk, ADMIN, OTHER_REPORTER, REPORTER};
use scamdesk_core::{
    clock::Clock,
    report::ReportStatus,
    types::{ReportId, UserId},
    workflow::Action,
};

fn needs_info(desk: &Desk, report_id: ReportId, note: &str) {
    desk.store()
        .mark_needs_info(report_id, Some(note), desk.clock.now())
        .unwrap();
}

async fn submit_update(
    desk: &Desk,
    user: UserId,
    report_id: ReportId,
    text: &str,
    photo: Option<&str>,
) {
    desk.start(user, Some(&format!("update_{report_id}"))).await;
    desk.text(user, text).await;
    if let Some(file) = photo {
        desk.photo(user, file).await;
    }
    desk.press(user, Action::ScreenshotsDone).await;
    desk.press(user, Action::ConfirmUpdate).await;
}

/// A NEEDS_INFO report takes the addition after a separator and goes back
/// into the review queue; admins are told.
#[tokio::test]
async fn needs_info_report_is_restored() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    needs_info(&desk, report_id, "Need the transfer receipt");

    desk.start(REPORTER, Some(&format!("update_{report_id}"))).await;
    assert_eq!(desk.engine.flow_name(REPORTER).await, "update");
    assert!(desk
        .last_text(REPORTER)
        .contains("Admin note: Need the transfer receipt"));

    desk.text(REPORTER, "Receipt attached").await;
    desk.photo(REPORTER, "receipt-1").await;
    desk.press(REPORTER, Action::ScreenshotsDone).await;
    assert!(desk.last_text(REPORTER).contains("New screenshots: 1"));
    desk.press(REPORTER, Action::ConfirmUpdate).await;

    assert!(desk
        .last_text(REPORTER)
        .contains(&format!("Report #{report_id} updated and sent back for review.")));
    assert_eq!(desk.engine.flow_name(REPORTER).await, "idle");

    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::Unverified);
    assert!(report
        .description
        .ends_with("\n\n--- UPDATE ---\nReceipt attached"));
    assert!(report.description.starts_with("Paid for goods"));
    assert!(report.admin_note.is_none());
    assert!(report.needs_info_since.is_none());
    assert_eq!(report.restored_at, Some(common::start_time()));
    assert_eq!(
        desk.store().report_screenshots(report_id).unwrap(),
        vec!["shot-112233-1".to_string(), "receipt-1".to_string()]
    );

    assert!(desk
        .texts(ADMIN)
        .iter()
        .any(|t| t.contains(&format!("Report {report_id} was updated by its submitter"))));
}

/// Screenshots are optional for an update.
#[tokio::test]
async fn update_without_screenshots() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    needs_info(&desk, report_id, "More detail please");
    submit_update(&desk, REPORTER, report_id, "The seller also used Shopee", None).await;

    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::Unverified);
    assert_eq!(desk.store().report_screenshots(report_id).unwrap().len(), 1);
}

/// A report auto-archived for lack of reply can still be revived.
#[tokio::test]
async fn auto_archived_report_can_be_restored() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    needs_info(&desk, report_id, "Need receipt");
    assert!(desk.store().archive_report(report_id, "No reply").unwrap());
    let archived = desk.store().get_report(report_id).unwrap();
    assert_eq!(archived.status, ReportStatus::Rejected);
    assert!(archived.auto_rejected);

    submit_update(&desk, REPORTER, report_id, "Found the receipt", Some("receipt-1")).await;

    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::Unverified);
    assert!(!report.auto_rejected);
    assert!(report.rejection_reason.is_none());
}

/// Someone else's report looks the same as a missing one.
#[tokio::test]
async fn other_users_report_is_not_found() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    needs_info(&desk, report_id, "Need receipt");

    desk.start(OTHER_REPORTER, Some(&format!("update_{report_id}"))).await;
    assert!(desk
        .last_text(OTHER_REPORTER)
        .contains(&format!("Report #{report_id} was not found among your reports.")));
    assert_eq!(desk.engine.flow_name(OTHER_REPORTER).await, "idle");
    assert_eq!(
        desk.store().get_report(report_id).unwrap().status,
        ReportStatus::NeedsInfo
    );
}

/// Verified reports are closed to updates.
#[tokio::test]
async fn verified_report_is_refused() {
    let desk = Desk::new();
    desk.verified_bank_profile("112233", "Ali", "Ali Scammer");

    desk.start(REPORTER, Some("update_1")).await;
    assert!(desk
        .last_text(REPORTER)
        .contains("Report #1 cannot be updated. Current status: Verified."));
    assert_eq!(desk.engine.flow_name(REPORTER).await, "idle");
}

/// The provisional link dropped by needs-info is re-resolved on restore.
#[tokio::test]
async fn restore_re_resolves_link() {
    let desk = Desk::new();
    let profile_id = desk.verified_bank_profile("112233", "Ali", "Ali Scammer");
    let report_id = desk.bank_report(OTHER_REPORTER, "112233", "Ali", 50.0);
    needs_info(&desk, report_id, "Which date?");
    assert!(desk.store().get_report(report_id).unwrap().linked_profile_id.is_none());

    submit_update(&desk, OTHER_REPORTER, report_id, "It was on 1 March", None).await;

    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::Unverified);
    assert_eq!(report.linked_profile_id.as_deref(), Some(profile_id.as_str()));
}

/// An empty addition is re-prompted.
#[tokio::test]
async fn empty_addition_is_reprompted() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    needs_info(&desk, report_id, "Need receipt");

    desk.start(REPORTER, Some(&format!("update_{report_id}"))).await;
    desk.text(REPORTER, "  ").await;
    assert!(desk
        .last_text(REPORTER)
        .contains("Please describe the additional information."));
}

/// The update reaches admins as a pending report again.
#[tokio::test]
async fn restored_report_reappears_in_queue() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    needs_info(&desk, report_id, "Need receipt");
    submit_update(&desk, REPORTER, report_id, "Receipt attached", None).await;

    desk.press(ADMIN, Action::AdminMenu).await;
    desk.press(ADMIN, Action::ReviewQueue).await;
    let card = desk.last_text(ADMIN);
    assert!(card.contains(&format!("Report #{report_id}")));
    assert!(card.contains("--- UPDATE ---"));
}

/// A storage failure on confirm keeps the pending update for another try.
#[tokio::test]
async fn failed_restore_keeps_update() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    needs_info(&desk, report_id, "Need the transfer receipt");

    desk.start(REPORTER, Some(&format!("update_{report_id}"))).await;
    desk.text(REPORTER, "Receipt attached").await;
    desk.photo(REPORTER, "receipt-1").await;
    desk.press(REPORTER, Action::ScreenshotsDone).await;

    desk.store()
        .with_transaction(|tx| Ok(tx.execute_batch("ALTER TABLE screenshots RENAME TO screenshots_off")?))
        .unwrap();
    desk.press(REPORTER, Action::ConfirmUpdate).await;
    assert!(desk
        .last_text(REPORTER)
        .contains("Something went wrong while saving your update. Please try again."));
    assert_eq!(desk.engine.flow_name(REPORTER).await, "update");
    assert_eq!(desk.store().get_report(report_id).unwrap().status, ReportStatus::NeedsInfo);

    desk.store()
        .with_transaction(|tx| Ok(tx.execute_batch("ALTER TABLE screenshots_off RENAME TO screenshots")?))
        .unwrap();
    desk.press(REPORTER, Action::ConfirmUpdate).await;

    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::Unverified);
    assert_eq!(report.description.matches("--- UPDATE ---").count(), 1);
    assert_eq!(
        desk.store().report_screenshots(report_id).unwrap().len(),
        2
    );
}
