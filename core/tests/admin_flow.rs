//! Admin review queue tests.

mod common;

use common::{Desk, ADMIN, OTHER_REPORTER, REPORTER};
use scamdesk_core::{
    config::DeskConfig,
    report::ReportStatus,
    transport::{RecordingTransport, Sent},
    workflow::Action,
};

async fn open_queue(desk: &Desk) {
    desk.press(ADMIN, Action::AdminMenu).await;
    desk.press(ADMIN, Action::ReviewQueue).await;
}

/// Non-admins never reach the panel.
#[tokio::test]
async fn non_admin_is_refused() {
    let desk = Desk::new();
    desk.command(REPORTER, "/admin").await;
    assert!(desk.last_text(REPORTER).contains("This section is for admins only."));
    assert_eq!(desk.engine.flow_name(REPORTER).await, "idle");

    // The main menu shows no admin button either.
    let menu = desk.transport.last_message(REPORTER).unwrap();
    assert!(!menu.has_action(&Action::AdminMenu));
}

/// The panel counts pending and waiting reports.
#[tokio::test]
async fn menu_shows_queue_counts() {
    let desk = Desk::new();
    desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    desk.bank_report(REPORTER, "445566", "Abu", 100.0);

    desk.press(ADMIN, Action::AdminMenu).await;
    let last = desk.last_text(ADMIN);
    assert!(last.contains("Pending review: 2"), "got: {last}");
    assert!(last.contains("Waiting for reporter: 0"));
}

/// Verify with no matching profile asks for a name, creates the profile
/// and tells the reporter.
#[tokio::test]
async fn verify_into_new_profile() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 500.0);

    open_queue(&desk).await;
    assert!(desk.last_text(ADMIN).contains(&format!("Report #{report_id}")));

    desk.press(ADMIN, Action::Verify).await;
    let prompt = desk.last_text(ADMIN);
    assert!(prompt.contains("Send the name for the new scammer profile."));
    assert!(prompt.contains("Name given by the reporter: Ali"));

    desk.text(ADMIN, "Ali Scammer").await;
    let last = desk.last_text(ADMIN);
    assert!(
        last.contains("verified and linked to Ali Scammer (1 reports, RM 500.00)"),
        "got: {last}"
    );
    assert!(last.contains("Pending review: 0"));

    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::Verified);
    assert!(desk
        .texts(REPORTER)
        .iter()
        .any(|t| t.contains("Your report has been verified!")));
}

/// An empty name is re-prompted without touching the report.
#[tokio::test]
async fn blank_profile_name_is_reprompted() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 500.0);
    open_queue(&desk).await;
    desk.press(ADMIN, Action::Verify).await;
    desk.text(ADMIN, "   ").await;

    assert!(desk.last_text(ADMIN).contains("profile name cannot be empty"));
    assert_eq!(
        desk.store().get_report(report_id).unwrap().status,
        ReportStatus::Unverified
    );
}

/// A report matching an existing profile offers it as a link target.
#[tokio::test]
async fn verify_into_existing_profile() {
    let desk = Desk::new();
    let profile_id = desk.verified_bank_profile("112233", "Ali", "Ali Scammer");
    let report_id = desk.bank_report(OTHER_REPORTER, "112233", "Ali", 200.0);

    open_queue(&desk).await;
    desk.press(ADMIN, Action::Verify).await;
    let choice = desk.transport.last_message(ADMIN).unwrap();
    let link = Action::LinkProfile {
        profile_id: profile_id.clone(),
    };
    assert!(choice.has_action(&link));
    assert!(choice.has_action(&Action::NewProfile));

    desk.press(ADMIN, link).await;
    assert!(desk
        .last_text(ADMIN)
        .contains("verified and linked to Ali Scammer (2 reports, RM 700.00)"));

    let profile = desk.store().get_profile(&profile_id).unwrap();
    assert_eq!(profile.total_reports, 2);
    assert_eq!(
        desk.store().get_report(report_id).unwrap().linked_profile_id.as_deref(),
        Some(profile_id.as_str())
    );
    assert!(desk
        .texts(OTHER_REPORTER)
        .iter()
        .any(|t| t.contains("Your report has been verified!")));
}

/// Dispute changes the status, drops the provisional link and notifies.
#[tokio::test]
async fn dispute_notifies_submitter() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 500.0);
    open_queue(&desk).await;
    desk.press(ADMIN, Action::Dispute).await;

    assert!(desk
        .last_text(ADMIN)
        .contains(&format!("Report #{report_id} marked as disputed.")));
    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::Disputed);
    assert!(report.linked_profile_id.is_none());
    assert!(desk
        .texts(REPORTER)
        .iter()
        .any(|t| t.contains("Status: Disputed")));
}

/// Needs-info stores the note and starts the grace period.
#[tokio::test]
async fn needs_info_with_reason() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 500.0);
    open_queue(&desk).await;
    desk.press(ADMIN, Action::RequestInfo).await;
    assert!(desk
        .transport
        .last_message(ADMIN)
        .unwrap()
        .has_action(&Action::NoReason));

    desk.text(ADMIN, "Please send the transfer receipt").await;
    let last = desk.last_text(ADMIN);
    assert!(last.contains("sent back to the reporter"), "got: {last}");
    assert!(last.contains("Waiting for reporter: 1"));

    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::NeedsInfo);
    assert_eq!(report.admin_note.as_deref(), Some("Please send the transfer receipt"));
    assert_eq!(report.needs_info_since, Some(common::start_time()));

    let notice = desk.texts(REPORTER).into_iter().last().unwrap();
    assert!(notice.contains("Admin note: Please send the transfer receipt"));
    assert!(notice.contains(&format!("/start update_{report_id}")));
}

/// Needs-info also works without a note.
#[tokio::test]
async fn needs_info_without_reason() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 500.0);
    open_queue(&desk).await;
    desk.press(ADMIN, Action::RequestInfo).await;
    desk.press(ADMIN, Action::NoReason).await;

    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::NeedsInfo);
    assert!(report.admin_note.is_none());
    let notice = desk.texts(REPORTER).into_iter().last().unwrap();
    assert!(!notice.contains("Admin note"));
}

/// Skipped reports stay out of the queue until it runs dry, then return.
#[tokio::test]
async fn skip_list_cycles() {
    let desk = Desk::new();
    let first = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    let second = desk.bank_report(REPORTER, "445566", "Abu", 100.0);

    open_queue(&desk).await;
    assert!(desk.last_text(ADMIN).contains(&format!("Report #{first}")));
    desk.press(ADMIN, Action::Skip).await;
    assert!(desk.last_text(ADMIN).contains(&format!("Report #{second}")));
    desk.press(ADMIN, Action::Skip).await;
    assert!(desk.last_text(ADMIN).contains("All reports have been reviewed."));

    desk.press(ADMIN, Action::ReviewQueue).await;
    assert!(desk.last_text(ADMIN).contains(&format!("Report #{first}")));
}

/// Screenshots are posted as one album above the review card.
#[tokio::test]
async fn review_posts_screenshot_album() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    open_queue(&desk).await;

    let album = desk.transport.sent().into_iter().find_map(|s| match s {
        Sent::Album { chat_id, files, caption } if chat_id == ADMIN => Some((files, caption)),
        _ => None,
    });
    let (files, caption) = album.expect("album sent");
    assert_eq!(files, vec!["shot-112233-1".to_string()]);
    assert_eq!(caption, Some(format!("Report #{report_id} screenshots")));
}

/// A report handled elsewhere in the meantime is reported as a conflict.
#[tokio::test]
async fn concurrent_handling_is_a_conflict() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    open_queue(&desk).await;

    desk.store().mark_disputed(report_id).unwrap();
    desk.press(ADMIN, Action::Verify).await;
    assert!(desk
        .last_text(ADMIN)
        .contains(&format!("Report #{report_id} was already handled by another admin.")));

    let other = desk.bank_report(REPORTER, "445566", "Abu", 100.0);
    desk.press(ADMIN, Action::ReviewQueue).await;
    desk.engine
        .aggregator()
        .create_profile_and_link(other, "Abu")
        .unwrap();
    desk.press(ADMIN, Action::Dispute).await;
    assert!(desk.last_text(ADMIN).contains("already handled"));
    assert_eq!(desk.store().get_report(other).unwrap().status, ReportStatus::Verified);
}

/// A dispute landing while the name prompt is open wins; the late link
/// is refused and the reporter only hears about the dispute.
#[tokio::test]
async fn dispute_during_name_prompt_blocks_link() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    open_queue(&desk).await;
    desk.press(ADMIN, Action::Verify).await;
    assert!(desk.last_text(ADMIN).contains("Send the name for the new scammer profile."));

    desk.store().mark_disputed(report_id).unwrap();
    desk.text(ADMIN, "Ali Scammer").await;

    assert!(desk
        .last_text(ADMIN)
        .contains(&format!("Report #{report_id} was already handled by another admin.")));
    assert_eq!(desk.engine.flow_name(ADMIN).await, "admin");
    let report = desk.store().get_report(report_id).unwrap();
    assert_eq!(report.status, ReportStatus::Disputed);
    assert!(report.linked_profile_id.is_none());
    assert!(desk.store().all_profile_ids().unwrap().is_empty());
    assert!(!desk.texts(REPORTER).iter().any(|t| t.contains("verified")));
}

/// A notice that cannot be delivered never undoes the status change.
#[tokio::test]
async fn failed_notice_keeps_status() {
    let desk = Desk::with(
        DeskConfig::default_test(),
        RecordingTransport::unreachable_chat(OTHER_REPORTER),
    );
    let report_id = desk.bank_report(OTHER_REPORTER, "112233", "Ali", 100.0);
    open_queue(&desk).await;
    desk.press(ADMIN, Action::Dispute).await;

    assert!(desk.last_text(ADMIN).contains("marked as disputed"));
    assert_eq!(
        desk.store().get_report(report_id).unwrap().status,
        ReportStatus::Disputed
    );
    assert!(desk.texts(OTHER_REPORTER).is_empty());
}

/// Back from the link step returns to the review card.
#[tokio::test]
async fn back_from_name_prompt_returns_to_card() {
    let desk = Desk::new();
    let report_id = desk.bank_report(REPORTER, "112233", "Ali", 100.0);
    open_queue(&desk).await;
    desk.press(ADMIN, Action::Verify).await;
    desk.press(ADMIN, Action::Back).await;

    let card = desk.transport.last_message(ADMIN).unwrap();
    assert!(card.text.contains(&format!("Report #{report_id}")));
    assert!(card.has_action(&Action::Verify));
}
