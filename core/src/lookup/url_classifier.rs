//! Social profile URL classification. Pure string work, no network.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Threads,
    Tiktok,
    Telegram,
    Facebook,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Threads   => "threads",
            Platform::Tiktok    => "tiktok",
            Platform::Telegram  => "telegram",
            Platform::Facebook  => "facebook",
            Platform::Twitter   => "twitter",
        }
    }

    /// Path segments that look like usernames but are site sections.
    fn reserved_paths(&self) -> &'static [&'static str] {
        match self {
            Platform::Instagram => &[
                "p", "reel", "reels", "stories", "explore", "accounts", "about", "legal",
                "developer", "directory",
            ],
            Platform::Tiktok => &["video", "music", "tag", "discover", "live"],
            Platform::Telegram => &["s", "addstickers", "joinchat", "addtheme"],
            Platform::Facebook => &[
                "watch", "marketplace", "groups", "events", "pages", "gaming", "stories",
                "profile.php", "photo", "video", "reel", "share", "login", "help",
            ],
            Platform::Twitter => &[
                "search", "explore", "settings", "i", "home", "notifications", "messages",
            ],
            Platform::Threads => &[],
        }
    }
}

/// Platform and username pulled out of a profile link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialHandle {
    pub platform: Platform,
    pub username: String,
}

fn pattern(re: &str) -> Regex {
    RegexBuilder::new(re)
        .case_insensitive(true)
        .build()
        .expect("Invalid social url regex")
}

// Tried in order; the first match whose username is not reserved wins.
static PATTERNS: Lazy<Vec<(Regex, Platform)>> = Lazy::new(|| {
    vec![
        (pattern(r"^(?:https?://)?(?:www\.)?instagram\.com/([a-zA-Z0-9_.]+)/?(?:\?.*)?$"), Platform::Instagram),
        (pattern(r"^(?:https?://)?(?:www\.)?threads\.(?:net|com)/@([a-zA-Z0-9_.]+)"), Platform::Threads),
        (pattern(r"^(?:https?://)?(?:www\.)?tiktok\.com/@([a-zA-Z0-9_.]+)/?(?:\?.*)?$"), Platform::Tiktok),
        (pattern(r"^(?:https?://)?(?:www\.)?t\.me/([a-zA-Z0-9_]+)/?(?:\?.*)?$"), Platform::Telegram),
        (pattern(r"^(?:https?://)?(?:www\.)?telegram\.me/([a-zA-Z0-9_]+)/?(?:\?.*)?$"), Platform::Telegram),
        (pattern(r"^(?:https?://)?(?:www\.)?facebook\.com/profile\.php\?id=(\d+)"), Platform::Facebook),
        (pattern(r"^(?:https?://)?(?:www\.)?facebook\.com/p/([^/?]+?)/?(?:\?.*)?$"), Platform::Facebook),
        (pattern(r"^(?:https?://)?(?:www\.)?facebook\.com/([a-zA-Z0-9_.]+)/?(?:\?.*)?$"), Platform::Facebook),
        (pattern(r"^(?:https?://)?(?:www\.)?(?:twitter\.com|x\.com)/([a-zA-Z0-9_]+)/?(?:\?.*)?$"), Platform::Twitter),
    ]
});

/// Classify a social profile link. `None` for unknown sites and for
/// non-profile pages (posts, reels, search, ...).
pub fn classify_social_url(url: &str) -> Option<SocialHandle> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    for (re, platform) in PATTERNS.iter() {
        let Some(caps) = re.captures(url) else { continue };
        let Some(username) = caps.get(1).map(|m| m.as_str()) else { continue };
        let reserved = platform
            .reserved_paths()
            .iter()
            .any(|p| p.eq_ignore_ascii_case(username));
        if reserved {
            continue;
        }
        return Some(SocialHandle {
            platform: *platform,
            username: username.to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(url: &str) -> Option<(Platform, String)> {
        classify_social_url(url).map(|h| (h.platform, h.username))
    }

    #[test]
    fn recognises_profile_links() {
        assert_eq!(handle("https://www.instagram.com/scam.shop/"), Some((Platform::Instagram, "scam.shop".into())));
        assert_eq!(handle("threads.net/@abc_1/post/123"), Some((Platform::Threads, "abc_1".into())));
        assert_eq!(handle("https://tiktok.com/@seller?lang=en"), Some((Platform::Tiktok, "seller".into())));
        assert_eq!(handle("t.me/fastloan"), Some((Platform::Telegram, "fastloan".into())));
        assert_eq!(handle("https://facebook.com/profile.php?id=100001"), Some((Platform::Facebook, "100001".into())));
        assert_eq!(handle("https://facebook.com/p/Cheap-Phones-123/"), Some((Platform::Facebook, "Cheap-Phones-123".into())));
        assert_eq!(handle("https://x.com/fakeagent"), Some((Platform::Twitter, "fakeagent".into())));
    }

    #[test]
    fn skips_reserved_paths_and_unknown_sites() {
        assert_eq!(handle("https://instagram.com/explore"), None);
        assert_eq!(handle("https://x.com/search"), None);
        assert_eq!(handle("https://example.com/someone"), None);
        assert_eq!(handle(""), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(handle("HTTPS://WWW.INSTAGRAM.COM/Someone"), Some((Platform::Instagram, "Someone".into())));
    }
}
