//! Which links the relay accepts.

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use url::Url;

/// Hosts served as X posts. Exact matches only, no wildcard subdomains.
pub const X_HOSTS: &[&str] = &["twitter.com", "www.twitter.com", "x.com", "www.x.com", "t.co"];

pub const INSTAGRAM_HOSTS: &[&str] = &["instagram.com", "www.instagram.com", "m.instagram.com"];

/// Supported source platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    X,
}

impl Platform {
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.to_ascii_lowercase();
        if X_HOSTS.contains(&host.as_str()) {
            Some(Platform::X)
        } else if INSTAGRAM_HOSTS.contains(&host.as_str()) {
            Some(Platform::Instagram)
        } else {
            None
        }
    }

    /// Instagram serves most reels only to logged-in sessions.
    pub fn needs_cookies(self) -> bool {
        matches!(self, Platform::Instagram)
    }

    /// X sometimes emits anamorphic H.264 that some clients stretch.
    pub fn supports_aspect_fix(self) -> bool {
        matches!(self, Platform::X)
    }

    pub fn label(self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::X => "X",
        }
    }
}

/// Parses `input` as an http(s) link to a supported platform.
pub fn parse_link(input: &str) -> Option<(Url, Platform)> {
    let url = Url::parse(input.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let platform = Platform::from_host(url.host_str()?)?;
    Some((url, platform))
}

/// Platform tag for `input`, `None` when unsupported.
pub fn classify(input: &str) -> Option<Platform> {
    parse_link(input).map(|(_, platform)| platform)
}
