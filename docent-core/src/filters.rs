// Composable link filters applied before the exploration strategy scores candidates.
// Every filter returns true to keep a link; a link must pass all of them.

use crate::graph::Node;
use docent_capture::Link;
use std::sync::Arc;
use url::Url;

/// Predicate over a candidate link and the node it was found on
pub type LinkFilter = Arc<dyn Fn(&Link, &Node) -> bool + Send + Sync>;

const STATIC_EXTENSIONS: &[&str] = &[
    "pdf", "zip", "gz", "tar", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "css", "js",
    "mp4", "mp3", "webm", "woff", "woff2", "ttf", "eot", "dmg", "exe", "xml", "rss",
];

const AUTH_TERMS: &[&str] = &[
    "login", "log-in", "log in", "signin", "sign-in", "sign in", "signup", "sign-up", "sign up",
    "register", "logout", "log out", "oauth", "forgot-password", "reset-password",
];

const LEGAL_TERMS: &[&str] = &[
    "privacy",
    "terms",
    "legal",
    "cookie",
    "gdpr",
    "disclaimer",
    "imprint",
    "impressum",
];

const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "reddit.com",
    "discord.gg",
    "t.me",
];

const BLOG_SEGMENTS: &[&str] = &["blog", "news", "press", "articles", "posts"];

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Whether the link's text or path contains any of `terms`
fn mentions(link: &Link, terms: &[&str]) -> bool {
    let text = link.text.to_lowercase();
    let path = extract_url_path(&link.href).to_lowercase();
    terms
        .iter()
        .any(|term| text.contains(term) || path.contains(term))
}

pub fn is_valid_http_url(link: &Link, _node: &Node) -> bool {
    Url::parse(&link.href)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

pub fn is_not_static_asset(link: &Link, _node: &Node) -> bool {
    let path = extract_url_path(&link.href).to_lowercase();
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.contains('/') => !STATIC_EXTENSIONS.contains(&ext),
        _ => true,
    }
}

pub fn is_not_auth_page(link: &Link, _node: &Node) -> bool {
    !mentions(link, AUTH_TERMS)
}

pub fn is_not_legal_page(link: &Link, _node: &Node) -> bool {
    !mentions(link, LEGAL_TERMS)
}

pub fn is_not_social_media(link: &Link, _node: &Node) -> bool {
    match host_of(&link.href) {
        Some(host) => !SOCIAL_DOMAINS.iter().any(|d| host_matches(&host, d)),
        None => true,
    }
}

pub fn is_not_blog_page(link: &Link, _node: &Node) -> bool {
    let path = extract_url_path(&link.href).to_lowercase();
    !path
        .split('/')
        .any(|segment| BLOG_SEGMENTS.contains(&segment))
}

/// Keep only links on `base_domain` or one of its subdomains
pub fn same_domain(base_domain: &str) -> LinkFilter {
    let base = base_domain.trim().to_lowercase();
    Arc::new(move |link: &Link, _node: &Node| {
        host_of(&link.href).is_some_and(|host| host_matches(&host, &base))
    })
}

/// The built-in filter chain, without a domain restriction
pub fn default_filters() -> Vec<LinkFilter> {
    vec![
        Arc::new(is_valid_http_url),
        Arc::new(is_not_static_asset),
        Arc::new(is_not_auth_page),
        Arc::new(is_not_legal_page),
        Arc::new(is_not_social_media),
        Arc::new(is_not_blog_page),
    ]
}

/// Logical AND of `filters`; stops at the first rejection
pub fn passes_all(filters: &[LinkFilter], link: &Link, node: &Node) -> bool {
    filters.iter().all(|filter| filter(link, node))
}
