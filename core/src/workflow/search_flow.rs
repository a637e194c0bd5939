//! Search: stored profiles and pending reports, plus live lookups.
//!
//! RULES:
//!   - Terms shorter than `min_search_len` are re-prompted; nothing is
//!     looked up or logged.
//!   - External lookups run concurrently, each under a timeout. A failed
//!     lookup is shown as unavailable, never as a clean result.
//!   - Results are profiles first (most reported first), then UNVERIFIED
//!     reports (newest first), one per page.
//!   - Every detail view backs out to the result it was opened from.

use super::{render, Action, Ctx, Input, Next};
use crate::{
    engine::Services,
    error::DeskResult,
    lookup::{
        classify_social_url, parse_duitnow, sanitize_phone, DuitNowPayload, PhoneCheck,
        PhoneLookupStatus, ReputationCategory, ReputationReport, SocialLookupResult,
        SocialLookupStatus,
    },
    report::{EvidenceKind, ReportRecord},
    transport::{safe_delete, Button, OutboundMessage},
    types::{MessageId, ProfileId, ReportId, UserId},
};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::time::Duration;

static MY_MOBILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:60|0)1\d{8,9}$").expect("Invalid mobile number regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Phone,
    Bank,
    Social,
    Mixed,
    Qr,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Phone  => "phone",
            SearchType::Bank   => "bank",
            SearchType::Social => "social",
            SearchType::Mixed  => "mixed",
            SearchType::Qr     => "qr",
        }
    }
}

/// Classify a search term by shape.
pub fn detect_search_type(term: &str) -> SearchType {
    let term = term.trim();
    let compact: String = term
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '+'))
        .collect();
    if MY_MOBILE.is_match(&compact) {
        return SearchType::Phone;
    }
    if (8..=20).contains(&compact.len()) && compact.chars().all(|c| c.is_ascii_digit()) {
        return SearchType::Bank;
    }
    if term.starts_with('@') || classify_social_url(term).is_some() {
        return SearchType::Social;
    }
    SearchType::Mixed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchHit {
    Profile(ProfileId),
    Report(ReportId),
}

/// What the live collaborators said about the term.
#[derive(Debug, Clone, Default)]
pub struct LookupSummary {
    pub reputation: Option<Result<ReputationReport, String>>,
    pub phone:      Option<PhoneCheck>,
    pub social:     Option<Result<SocialLookupResult, String>>,
    pub renamed:    Option<(String, String)>,
    pub qr:         Option<DuitNowPayload>,
}

impl LookupSummary {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(qr) = &self.qr {
            let mut line = "🔳 DuitNow QR:".to_string();
            if let Some(name) = &qr.merchant_name {
                line.push_str(&format!(" {name}"));
            }
            if let Some(bank) = &qr.bank_name {
                line.push_str(&format!(" · {bank}"));
            }
            if let Some(id) = &qr.identifier {
                line.push_str(&format!(" · {id}"));
            }
            lines.push(line);
        }

        match &self.reputation {
            Some(Ok(r)) if r.ok => lines.push(format!(
                "🚔 Police reports: {} (searched {} times)",
                r.occurrence_count, r.search_count
            )),
            Some(_) => lines.push(
                "🚔 Police report check is unavailable right now. This does not mean the number is clean."
                    .into(),
            ),
            None => {}
        }

        match &self.phone {
            Some(PhoneCheck::Cached(c)) => lines.push(caller_id_line(
                c.name.as_deref(),
                c.carrier.as_deref(),
                c.is_spam,
                c.spam_type.as_deref(),
            )),
            Some(PhoneCheck::Live(r)) if r.status == PhoneLookupStatus::Success => {
                lines.push(caller_id_line(
                    r.name.as_deref(),
                    r.carrier.as_deref(),
                    r.is_spam,
                    r.spam_type.as_deref(),
                ))
            }
            Some(PhoneCheck::Live(_)) => lines.push("📞 Caller ID: no data for this number.".into()),
            Some(PhoneCheck::RateLimited { retry_after }) => lines.push(format!(
                "📞 Caller ID lookup limit reached. Try again in {retry_after}."
            )),
            Some(PhoneCheck::Unavailable { .. }) => {
                lines.push("📞 Caller ID lookup is unavailable right now.".into())
            }
            Some(PhoneCheck::Skipped) | None => {}
        }

        match &self.social {
            Some(Ok(r)) if r.status == SocialLookupStatus::Success => {
                let mut line = format!("👤 @{} on {}", r.username, r.platform.as_str());
                if let Some(name) = &r.display_name {
                    line.push_str(&format!(" ({name})"));
                }
                if let Some(id) = &r.platform_user_id {
                    line.push_str(&format!(", account ID {id}"));
                }
                lines.push(line);
            }
            Some(Ok(r)) => lines.push(format!(
                "👤 @{} was not found on {}.",
                r.username,
                r.platform.as_str()
            )),
            Some(Err(_)) => lines.push("👤 Social account lookup is unavailable right now.".into()),
            None => {}
        }

        if let Some((old, new)) = &self.renamed {
            lines.push(format!(
                "⚠️ This account changed its username from @{old} to @{new}."
            ));
        }
        lines
    }
}

fn caller_id_line(
    name: Option<&str>,
    carrier: Option<&str>,
    is_spam: bool,
    spam_type: Option<&str>,
) -> String {
    let mut line = format!("📞 Caller ID: {}", name.unwrap_or("unknown"));
    if let Some(carrier) = carrier {
        line.push_str(&format!(" ({carrier})"));
    }
    if is_spam {
        line.push_str(&format!(" · flagged as spam: {}", spam_type.unwrap_or("unspecified")));
    }
    line
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStep {
    Term,
    Results { index: usize },
    ReportDetail { index: usize },
    ProfileReports { index: usize, page: usize },
    BankList { index: usize },
    PhoneList { index: usize },
}

#[derive(Debug, Clone)]
pub struct SearchFlow {
    pub step:    SearchStep,
    pub term:    Option<String>,
    pub hits:    Vec<SearchHit>,
    pub lookups: LookupSummary,
    album:       Vec<MessageId>,
}

impl Default for SearchFlow {
    fn default() -> Self {
        Self {
            step:    SearchStep::Term,
            term:    None,
            hits:    Vec::new(),
            lookups: LookupSummary::default(),
            album:   Vec::new(),
        }
    }
}

pub async fn start(ctx: &mut Ctx<'_>) -> SearchFlow {
    let flow = SearchFlow::default();
    ctx.show(term_prompt(ctx.svc.config.min_search_len, None)).await;
    flow
}

pub async fn handle(ctx: &mut Ctx<'_>, flow: &mut SearchFlow, input: Input) -> DeskResult<Next> {
    let min_len = ctx.svc.config.min_search_len;

    match (flow.step, input) {
        (_, Input::Action(Action::SearchAgain)) | (SearchStep::Results { .. }, Input::Action(Action::Back)) => {
            clear_album(ctx, flow).await;
            *flow = SearchFlow::default();
            ctx.show(term_prompt(min_len, None)).await;
        }

        (SearchStep::Term, Input::Text(text)) => {
            run_search(ctx, flow, &text, SearchType::Mixed, None).await?;
        }
        (SearchStep::Term, Input::Photo(file)) => match ctx.svc.qr.decode(&file).await {
            Ok(Some(payload)) => {
                let parsed = parse_duitnow(&payload);
                let term = parsed.identifier.clone().unwrap_or_else(|| payload.clone());
                let qr = (!parsed.is_empty()).then_some(parsed);
                run_search(ctx, flow, &term, SearchType::Qr, qr).await?;
            }
            Ok(None) => {
                ctx.show(term_prompt(min_len, Some("No QR code was found in that image."))).await;
            }
            Err(e) => {
                warn!("[Search] QR decode failed for user {}: {e}", ctx.user_id);
                ctx.show(term_prompt(min_len, Some("The QR reader is unavailable right now."))).await;
            }
        },

        (SearchStep::Results { index }, Input::Action(Action::NextResult)) => {
            let index = (index + 1).min(flow.hits.len().saturating_sub(1));
            flow.step = SearchStep::Results { index };
            show_result(ctx, flow).await?;
        }
        (SearchStep::Results { index }, Input::Action(Action::PrevResult)) => {
            flow.step = SearchStep::Results {
                index: index.saturating_sub(1),
            };
            show_result(ctx, flow).await?;
        }
        (SearchStep::Results { index }, Input::Action(Action::ViewReport)) => {
            if let Some(SearchHit::Report(report_id)) = flow.hits.get(index).cloned() {
                show_report_detail(ctx, flow, index, report_id).await?;
            } else {
                show_result(ctx, flow).await?;
            }
        }
        (SearchStep::Results { index }, Input::Action(Action::ProfileReports)) => {
            flow.step = SearchStep::ProfileReports { index, page: 0 };
            show_profile_reports(ctx, flow).await?;
        }
        (SearchStep::Results { index }, Input::Action(Action::BankAccounts)) => {
            flow.step = SearchStep::BankList { index };
            show_identifier_list(ctx, flow).await?;
        }
        (SearchStep::Results { index }, Input::Action(Action::PhoneNumbers)) => {
            flow.step = SearchStep::PhoneList { index };
            show_identifier_list(ctx, flow).await?;
        }

        (SearchStep::ProfileReports { index, page }, Input::Action(Action::NextPage)) => {
            flow.step = SearchStep::ProfileReports { index, page: page + 1 };
            show_profile_reports(ctx, flow).await?;
        }
        (SearchStep::ProfileReports { index, page }, Input::Action(Action::PrevPage)) => {
            flow.step = SearchStep::ProfileReports {
                index,
                page: page.saturating_sub(1),
            };
            show_profile_reports(ctx, flow).await?;
        }

        (
            SearchStep::ReportDetail { index }
            | SearchStep::ProfileReports { index, .. }
            | SearchStep::BankList { index }
            | SearchStep::PhoneList { index },
            Input::Action(Action::Back),
        ) => {
            clear_album(ctx, flow).await;
            flow.step = SearchStep::Results { index };
            show_result(ctx, flow).await?;
        }

        (SearchStep::Term, _) => {
            ctx.show(term_prompt(min_len, Some("Please send a search term or a QR image."))).await;
        }
        (step, input) => {
            warn!("[Search] ignored {input:?} at {step:?}");
            show_current(ctx, flow).await?;
        }
    }
    Ok(Next::Stay)
}

/// Validate, log, look up and store-search `raw`, then show the first result.
async fn run_search(
    ctx: &mut Ctx<'_>,
    flow: &mut SearchFlow,
    raw: &str,
    logged_as: SearchType,
    qr: Option<DuitNowPayload>,
) -> DeskResult<()> {
    let min_len = ctx.svc.config.min_search_len;
    let term = raw.trim();
    if term.chars().count() < min_len {
        let problem = format!("Please enter at least {min_len} characters.");
        ctx.show(term_prompt(min_len, Some(&problem))).await;
        return Ok(());
    }

    let search_type = detect_search_type(term);
    let logged_type = if logged_as == SearchType::Qr { logged_as } else { search_type };
    let source = format!("chat:{}", ctx.user_id);
    if let Err(e) = ctx
        .svc
        .store
        .log_search(term, logged_type.as_str(), &source, ctx.now())
    {
        warn!("[Search] search log write failed: {e}");
    }

    let mut lookups = run_lookups(ctx.svc, ctx.user_id, term, search_type).await;
    lookups.qr = qr;

    let mut profile_ids: Vec<ProfileId> = Vec::new();
    let mut report_ids: Vec<ReportId> = Vec::new();
    let mut terms = vec![term.to_string()];
    if search_type == SearchType::Phone {
        let sanitized = sanitize_phone(term);
        if sanitized != term {
            terms.push(sanitized);
        }
    }
    for t in &terms {
        for profile in ctx.svc.store.search_profiles(t)? {
            if !profile_ids.contains(&profile.profile_id) {
                profile_ids.push(profile.profile_id);
            }
        }
        for report in ctx.svc.store.search_unverified_reports(t)? {
            if !report_ids.contains(&report.report_id) {
                report_ids.push(report.report_id);
            }
        }
    }

    // Profiles reached through a resolved social account id, even when
    // the stored handle still carries an old username.
    if let Some(Ok(result)) = &lookups.social {
        if let Some(platform_user_id) = &result.platform_user_id {
            let platform = result.platform.as_str();
            for profile in ctx.svc.store.profiles_by_platform_user_id(platform_user_id, platform)? {
                if !profile_ids.contains(&profile.profile_id) {
                    profile_ids.push(profile.profile_id);
                }
            }
        }
    }

    info!(
        "[Search] user {} searched '{term}' as {}: {} profiles, {} pending reports",
        ctx.user_id,
        logged_type.as_str(),
        profile_ids.len(),
        report_ids.len()
    );

    flow.term = Some(term.to_string());
    flow.lookups = lookups;
    flow.hits = profile_ids
        .into_iter()
        .map(SearchHit::Profile)
        .chain(report_ids.into_iter().map(SearchHit::Report))
        .collect();
    flow.step = SearchStep::Results { index: 0 };
    show_result(ctx, flow).await
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = DeskResult<T>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("lookup timed out".into()),
    }
}

async fn run_lookups(
    svc: &Services,
    user_id: UserId,
    term: &str,
    search_type: SearchType,
) -> LookupSummary {
    let limit = Duration::from_secs(svc.config.lookup_timeout_secs);
    let handle = classify_social_url(term);

    let reputation = async {
        let (category, value) = match search_type {
            SearchType::Phone => (ReputationCategory::Phone, sanitize_phone(term)),
            SearchType::Bank => (ReputationCategory::Bank, term.to_string()),
            _ => return None,
        };
        let result = bounded(limit, svc.reputation.lookup(category, &value)).await;
        if let Err(e) = &result {
            warn!("[Search] reputation lookup for {value} failed: {e}");
        }
        Some(result)
    };
    let phone = async {
        match search_type {
            SearchType::Phone => Some(svc.phone.check(user_id, term).await),
            _ => None,
        }
    };
    let social = async {
        let handle = handle.as_ref()?;
        let result = bounded(limit, svc.social.lookup(&handle.username, handle.platform)).await;
        if let Err(e) = &result {
            warn!("[Search] social lookup for @{} failed: {e}", handle.username);
        }
        Some(result)
    };

    let (reputation, phone, social) = tokio::join!(reputation, phone, social);

    let mut renamed = None;
    if let Some(Ok(result)) = &social {
        if let (SocialLookupStatus::Success, Some(platform_user_id)) =
            (result.status, &result.platform_user_id)
        {
            match svc.store.refresh_social_identity(
                result.platform.as_str(),
                &result.username,
                platform_user_id,
                result.display_name.as_deref(),
                svc.clock.now(),
            ) {
                Ok(change) => renamed = change,
                Err(e) => warn!("[Search] social identity refresh failed: {e}"),
            }
        }
    }

    LookupSummary {
        reputation,
        phone,
        social,
        renamed,
        qr: None,
    }
}

// ── Views ─────────────────────────────────────────────────────────

fn term_prompt(min_len: usize, problem: Option<&str>) -> OutboundMessage {
    let mut text = format!(
        "🔍 SEARCH\n\nSend a phone number, bank account number, social media link or name \
         (at least {min_len} characters). You can also send a photo of a DuitNow QR code."
    );
    if let Some(problem) = problem {
        text.push_str(&format!("\n\n⚠️ {problem}"));
    }
    OutboundMessage::text(text).with_row(render::back_cancel_row(false))
}

fn footer_rows(message: OutboundMessage) -> OutboundMessage {
    message
        .with_row(vec![Button::new("🔍 Search again", Action::SearchAgain)])
        .with_row(render::main_menu_row())
}

fn back_row() -> Vec<Button> {
    vec![Button::new("« Back", Action::Back)]
}

async fn clear_album(ctx: &mut Ctx<'_>, flow: &mut SearchFlow) {
    for message_id in flow.album.drain(..) {
        safe_delete(ctx.svc.transport.as_ref(), ctx.chat_id, message_id).await;
    }
}

async fn show_current(ctx: &mut Ctx<'_>, flow: &mut SearchFlow) -> DeskResult<()> {
    match flow.step {
        SearchStep::Term => {
            ctx.show(term_prompt(ctx.svc.config.min_search_len, None)).await;
            Ok(())
        }
        SearchStep::Results { .. } => show_result(ctx, flow).await,
        SearchStep::ReportDetail { index } => match flow.hits.get(index).cloned() {
            Some(SearchHit::Report(report_id)) => {
                show_report_detail(ctx, flow, index, report_id).await
            }
            _ => show_result(ctx, flow).await,
        },
        SearchStep::ProfileReports { .. } => show_profile_reports(ctx, flow).await,
        SearchStep::BankList { .. } | SearchStep::PhoneList { .. } => {
            show_identifier_list(ctx, flow).await
        }
    }
}

fn current_index(step: SearchStep) -> usize {
    match step {
        SearchStep::Term => 0,
        SearchStep::Results { index }
        | SearchStep::ReportDetail { index }
        | SearchStep::ProfileReports { index, .. }
        | SearchStep::BankList { index }
        | SearchStep::PhoneList { index } => index,
    }
}

fn profile_at(flow: &SearchFlow) -> Option<ProfileId> {
    match flow.hits.get(current_index(flow.step)) {
        Some(SearchHit::Profile(id)) => Some(id.clone()),
        _ => None,
    }
}

async fn show_result(ctx: &mut Ctx<'_>, flow: &mut SearchFlow) -> DeskResult<()> {
    let term = flow.term.clone().unwrap_or_default();
    let lookup_lines = flow.lookups.lines();
    let index = current_index(flow.step);

    let Some(hit) = flow.hits.get(index).cloned() else {
        let mut text = format!("🔍 No reports found for \"{term}\".\n\nStay alert and never transfer money to someone you have not verified.");
        if !lookup_lines.is_empty() {
            text.push_str(&format!("\n\n{}", lookup_lines.join("\n")));
        }
        ctx.show(footer_rows(OutboundMessage::text(text))).await;
        return Ok(());
    };

    let mut text = format!("🔍 Result {} of {} for \"{term}\"\n\n", index + 1, flow.hits.len());
    let mut rows: Vec<Vec<Button>> = Vec::new();
    match &hit {
        SearchHit::Profile(profile_id) => match ctx.svc.store.find_profile(profile_id)? {
            Some(profile) => {
                text.push_str(&render::profile_card(&profile));
                for handle in ctx.svc.store.social_handles(profile_id)? {
                    let username = handle.extracted_username.as_deref().unwrap_or(&handle.url);
                    text.push_str(&format!("Social: {username}"));
                    if !handle.username_history.is_empty() {
                        text.push_str(&format!(" (previously {})", handle.username_history.join(", ")));
                    }
                    text.push('\n');
                }
                rows.push(vec![Button::new("📄 Reports", Action::ProfileReports)]);
                rows.push(vec![
                    Button::new("🏦 Bank accounts", Action::BankAccounts),
                    Button::new("📱 Phone numbers", Action::PhoneNumbers),
                ]);
            }
            None => text.push_str("This profile is no longer available.\n"),
        },
        SearchHit::Report(report_id) => match ctx.svc.store.find_report(*report_id)? {
            Some(report) => {
                text.push_str(&pending_summary(&report));
                rows.push(vec![Button::new("📄 View details", Action::ViewReport)]);
            }
            None => text.push_str("This report is no longer available.\n"),
        },
    }
    if !lookup_lines.is_empty() {
        text.push_str(&format!("\n{}", lookup_lines.join("\n")));
    }

    let mut nav = Vec::with_capacity(2);
    if index > 0 {
        nav.push(Button::new("« Prev", Action::PrevResult));
    }
    if index + 1 < flow.hits.len() {
        nav.push(Button::new("Next »", Action::NextResult));
    }
    rows.push(nav);

    let mut message = OutboundMessage::text(text);
    for row in rows {
        message = message.with_row(row);
    }
    ctx.show(footer_rows(message)).await;
    Ok(())
}

fn pending_summary(report: &ReportRecord) -> String {
    format!(
        "⏳ Unverified report #{}\n{}\nTarget ({}): {}\nLoss: {}\nSubmitted: {}\n\n\
         This report has not been verified by our admins yet.\n",
        report.report_id,
        report.title,
        report.target.kind().as_str(),
        report.target.as_input(),
        render::money(report.loss_amount),
        report.submitted_at.format("%Y-%m-%d"),
    )
}

async fn show_report_detail(
    ctx: &mut Ctx<'_>,
    flow: &mut SearchFlow,
    index: usize,
    report_id: ReportId,
) -> DeskResult<()> {
    let Some(report) = ctx.svc.store.find_report(report_id)? else {
        flow.step = SearchStep::Results { index };
        return show_result(ctx, flow).await;
    };
    flow.step = SearchStep::ReportDetail { index };

    clear_album(ctx, flow).await;
    let screenshots = ctx.svc.store.report_screenshots(report_id)?;
    if !screenshots.is_empty() {
        if let Some(prompt) = ctx.prompt.take() {
            safe_delete(ctx.svc.transport.as_ref(), ctx.chat_id, prompt).await;
        }
        match ctx.svc.transport.send_album(ctx.chat_id, &screenshots, None).await {
            Ok(ids) => flow.album = ids,
            Err(e) => warn!("[Search] screenshots of report {report_id} not shown: {e}"),
        }
    }

    let text = format!(
        "{}\n\n⚠️ This report has not been verified yet.",
        render::report_card(&report)
    );
    ctx.show(OutboundMessage::text(text).with_row(back_row())).await;
    Ok(())
}

async fn show_profile_reports(ctx: &mut Ctx<'_>, flow: &mut SearchFlow) -> DeskResult<()> {
    let Some(profile_id) = profile_at(flow) else {
        flow.step = SearchStep::Results { index: current_index(flow.step) };
        return show_result(ctx, flow).await;
    };
    let SearchStep::ProfileReports { index, page } = flow.step else {
        return show_result(ctx, flow).await;
    };

    let per_page = ctx.svc.config.reports_per_page.max(1);
    let reports = ctx.svc.store.verified_reports_for_profile(&profile_id)?;
    let pages = reports.len().div_ceil(per_page).max(1);
    let page = page.min(pages - 1);
    flow.step = SearchStep::ProfileReports { index, page };

    let mut text = format!("📄 Verified reports · page {} of {}\n", page + 1, pages);
    if reports.is_empty() {
        text.push_str("\nNo verified reports yet.");
    }
    for report in reports.iter().skip(page * per_page).take(per_page) {
        text.push_str(&format!(
            "\n#{} {} ({})\nLoss: {}\n{}\n",
            report.report_id,
            report.title,
            report.submitted_at.format("%Y-%m-%d"),
            render::money(report.loss_amount),
            report.description,
        ));
    }

    let mut nav = Vec::with_capacity(2);
    if page > 0 {
        nav.push(Button::new("« Prev page", Action::PrevPage));
    }
    if page + 1 < pages {
        nav.push(Button::new("Next page »", Action::NextPage));
    }
    ctx.show(OutboundMessage::text(text).with_row(nav).with_row(back_row()))
        .await;
    Ok(())
}

/// Bank or phone listing: identifier rows plus read-only evidence facts
/// from the profile's verified reports.
async fn show_identifier_list(ctx: &mut Ctx<'_>, flow: &mut SearchFlow) -> DeskResult<()> {
    let Some(profile_id) = profile_at(flow) else {
        flow.step = SearchStep::Results { index: current_index(flow.step) };
        return show_result(ctx, flow).await;
    };
    let store = &ctx.svc.store;
    let verified = store.verified_reports_for_profile(&profile_id)?;

    let (title, mut lines, kind) = match flow.step {
        SearchStep::BankList { .. } => (
            "🏦 Bank accounts",
            store
                .bank_accounts(&profile_id)?
                .into_iter()
                .map(|b| {
                    format!(
                        "{} · {} · {} ({} reports)",
                        b.account_number, b.bank_name, b.holder_name, b.report_count
                    )
                })
                .collect::<Vec<_>>(),
            EvidenceKind::Bank,
        ),
        _ => (
            "📱 Phone numbers",
            store
                .phone_numbers(&profile_id)?
                .into_iter()
                .map(|p| format!("{} ({} reports)", p.phone_number, p.report_count))
                .collect::<Vec<_>>(),
            EvidenceKind::Phone,
        ),
    };
    if kind == EvidenceKind::Bank {
        for report in &verified {
            for fact in report.evidence.iter().filter(|e| e.kind == kind) {
                lines.push(format!("{} (mentioned in report #{})", fact.value, report.report_id));
            }
        }
    }

    let mut text = format!("{title}\n");
    if lines.is_empty() {
        text.push_str("\nNone recorded.");
    }
    for line in lines {
        text.push_str(&format!("\n• {line}"));
    }
    ctx.show(OutboundMessage::text(text).with_row(back_row())).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_type_by_shape() {
        assert_eq!(detect_search_type("012-345 6789"), SearchType::Phone);
        assert_eq!(detect_search_type("+60123456789"), SearchType::Phone);
        assert_eq!(detect_search_type("1122334455"), SearchType::Bank);
        assert_eq!(detect_search_type("https://instagram.com/scam.shop"), SearchType::Social);
        assert_eq!(detect_search_type("@scamshop"), SearchType::Social);
        assert_eq!(detect_search_type("Ali Scammer"), SearchType::Mixed);
    }

    #[test]
    fn unavailable_lookup_is_not_a_clean_result() {
        let summary = LookupSummary {
            reputation: Some(Err("timed out".into())),
            ..LookupSummary::default()
        };
        let lines = summary.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("unavailable"));
    }
}
