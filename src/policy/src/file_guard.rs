//! # File Guard - Path Allow-Listing and Secret Redaction
//!
//! Guards every file path an agent may touch and scrubs secret-shaped
//! material out of any string leaving the core. Redaction is lossy and is
//! applied at log and user-facing boundaries only; agent inputs are never
//! redacted.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Tokens that make a path untouchable regardless of its root
const DENIED_TOKENS: &[&str] = &[
    ".env",
    ".pem",
    ".key",
    "SOUL.md",
    "AGENTS.md",
    "node_modules",
    ".git",
];

/// Ordered redaction patterns; order matters for overlapping matches
static REDACTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // API-key-shaped tokens
        (
            Regex::new(r"sk-[A-Za-z0-9_-]{16,}").expect("api key pattern"),
            "[REDACTED]",
        ),
        (
            Regex::new(r"(?i)api[_-]?key\s*[=:]\s*\S+").expect("api key assignment pattern"),
            "api_key=[REDACTED]",
        ),
        // JWT-shaped strings, before the bearer rule so the token body wins
        (
            Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+")
                .expect("jwt pattern"),
            "[REDACTED]",
        ),
        // Bearer tokens
        (
            Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/-]+=*").expect("bearer pattern"),
            "Bearer [REDACTED]",
        ),
        // password=... assignments
        (
            Regex::new(r"(?i)password\s*=\s*\S+").expect("password pattern"),
            "password=[REDACTED]",
        ),
    ]
});

/// Path guard scoped to a set of allowed roots
#[derive(Debug, Clone)]
pub struct FileGuard {
    roots: Vec<String>,
}

impl FileGuard {
    /// Guard limited to the default `workspace/` root
    pub fn new() -> Self {
        Self::with_roots(vec!["workspace/".to_string()])
    }

    pub fn with_roots(roots: Vec<String>) -> Self {
        Self { roots }
    }

    /// Whether agents may touch `path`
    ///
    /// A path fails when it contains a traversal pattern, matches a
    /// denylisted token, or does not start with one of the allowed roots.
    pub fn is_path_allowed(&self, path: &str) -> bool {
        if path.contains("../") || path.contains("..\\") {
            warn!(path, "path rejected: traversal");
            return false;
        }

        if DENIED_TOKENS.iter().any(|token| path.contains(token)) {
            warn!(path, "path rejected: denylisted token");
            return false;
        }

        if !self.roots.iter().any(|root| path.starts_with(root.as_str())) {
            warn!(path, "path rejected: outside allowed roots");
            return false;
        }

        true
    }
}

impl Default for FileGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Scrub secret-shaped substrings from text bound for logs or users
pub fn redact(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, replacement) in REDACTIONS.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}
