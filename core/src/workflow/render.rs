//! Text builders shared by the flows.

use super::Action;
use crate::{
    profile::ProfileRecord,
    report::{ReportRecord, ReportStatus},
    store::SystemStats,
    transport::{Button, OutboundMessage},
};

/// `RM 1,234.50`
pub fn money(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("RM {grouped}.{:02}", cents % 100)
}

pub fn status_label(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Unverified => "Pending review",
        ReportStatus::Verified   => "Verified",
        ReportStatus::Disputed   => "Disputed",
        ReportStatus::NeedsInfo  => "Needs more info",
        ReportStatus::Rejected   => "Archived",
    }
}

pub fn back_cancel_row(with_back: bool) -> Vec<Button> {
    let mut row = Vec::with_capacity(2);
    if with_back {
        row.push(Button::new("« Back", Action::Back));
    }
    row.push(Button::new("✖ Cancel", Action::Cancel));
    row
}

pub fn main_menu_row() -> Vec<Button> {
    vec![Button::new("🏠 Main menu", Action::MainMenu)]
}

pub fn main_menu(is_admin: bool) -> OutboundMessage {
    let mut message = OutboundMessage::text(
        "Welcome to PenipuMY.\n\n\
         Check a phone number, bank account or social media link before you pay, \
         or report a scammer so others are warned.",
    )
    .with_row(vec![
        Button::new("🔍 Search", Action::StartSearch),
        Button::new("📝 Report a scam", Action::StartReport),
    ])
    .with_row(vec![
        Button::new("📂 My reports", Action::MyReports),
        Button::new("📊 Statistics", Action::ShowStats),
    ]);
    if is_admin {
        message = message.with_row(vec![Button::new("🛡 Admin panel", Action::AdminMenu)]);
    }
    message
}

/// Multi-line summary of a stored report.
pub fn report_card(report: &ReportRecord) -> String {
    let mut text = format!(
        "Report #{}\nStatus: {}\nTitle: {}\nRole: {}\nTarget ({}): {}\nLoss: {}\nSubmitted: {}\n",
        report.report_id,
        status_label(report.status),
        report.title,
        report.reporter_role.label(),
        report.target.kind().as_str(),
        report.target.as_input(),
        money(report.loss_amount),
        report.submitted_at.format("%Y-%m-%d %H:%M UTC"),
    );
    if !report.evidence.is_empty() {
        text.push_str("Evidence:\n");
        for fact in &report.evidence {
            text.push_str(&format!("  • {}\n", fact.display()));
        }
    }
    if let Some(note) = &report.admin_note {
        text.push_str(&format!("Admin note: {note}\n"));
    }
    if let Some(reason) = &report.rejection_reason {
        text.push_str(&format!("Reason: {reason}\n"));
    }
    text.push_str(&format!("\n{}", report.description));
    text
}

pub fn profile_card(profile: &ProfileRecord) -> String {
    let mut text = format!("⚠️ Known scammer profile: {}\n", profile.display_name);
    if !profile.alternate_names.is_empty() {
        text.push_str(&format!("Also known as: {}\n", profile.alternate_names.join(", ")));
    }
    text.push_str(&format!(
        "Verified reports: {}\nTotal reported loss: {}\n\
         Bank accounts: {}  Phone numbers: {}  Social accounts: {}\n",
        profile.total_reports,
        money(profile.total_loss),
        profile.unique_banks,
        profile.unique_phones,
        profile.unique_socials,
    ));
    text
}

pub fn stats_text(stats: &SystemStats) -> String {
    format!(
        "📊 PenipuMY statistics\n\n\
         Users: {} ({} new today, {} active in 30 days)\n\
         Reports: {} ({} verified)\n\
         Verified losses: {} (highest single loss {})\n\
         Reported identifiers: {} bank accounts, {} phone numbers, {} social accounts\n\
         Cached phone lookups: {}\n\
         Searches: {}",
        stats.total_users,
        stats.new_users_today,
        stats.active_users_30d,
        stats.total_reports,
        stats.verified_reports,
        money(stats.total_verified_loss),
        money(stats.highest_verified_loss),
        stats.distinct_banks,
        stats.distinct_phones,
        stats.distinct_socials,
        stats.cached_phone_lookups,
        stats.searches,
    )
}

/// A submitter's own reports, newest first, with update hints.
pub fn my_reports(reports: &[ReportRecord]) -> String {
    if reports.is_empty() {
        return "You have not submitted any reports yet.".into();
    }
    let mut text = String::from("📂 Your reports\n");
    for report in reports {
        text.push_str(&format!(
            "\n#{} {} [{}]",
            report.report_id,
            report.title,
            status_label(report.status)
        ));
        if report.is_updatable() {
            text.push_str(&format!("\n   Send /start update_{} to add information", report.report_id));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::money;

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(0.0), "RM 0.00");
        assert_eq!(money(500.0), "RM 500.00");
        assert_eq!(money(1234567.5), "RM 1,234,567.50");
    }
}
