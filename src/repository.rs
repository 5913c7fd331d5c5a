use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

// user@host:owner/name(.git)
static SCP_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._~-]+@([A-Za-z0-9.-]+):/?(.+?)(?:\.git)?/?$")
        .expect("static regex")
});

// scheme://[user@]host[:port]/group/.../name(.git)
static URL_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://(?:[^@/]+@)?([A-Za-z0-9.-]+)(?::\d+)?/(.+?)(?:\.git)?/?$")
        .expect("static regex")
});

/// Identify the repository checked out at (or above) `working_dir` as
/// `host/owner/name`, from its `origin` remote.
///
/// Every failure mode (no directory, not a repository, no `origin`, an
/// unrecognized URL) yields `None`.
pub fn identify_repository(working_dir: Option<&Path>) -> Option<String> {
    let dir = working_dir.filter(|d| d.is_dir())?;

    let repo = match git2::Repository::discover(dir) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "not a git repository");
            return None;
        }
    };
    let remote = match repo.find_remote("origin") {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "no origin remote");
            return None;
        }
    };
    let url = remote.url()?.trim();
    if url.is_empty() {
        return None;
    }

    let normalized = normalize_remote_url(url);
    if normalized.is_none() {
        tracing::warn!(url, "unrecognized origin remote URL");
    }
    normalized
}

/// Normalize an SSH (`git@host:owner/name.git`) or URL-style
/// (`https://host/group/sub/name`) remote to `host/owner/name`.
pub fn normalize_remote_url(url: &str) -> Option<String> {
    let url = url.trim();
    let caps = URL_LIKE
        .captures(url)
        .or_else(|| SCP_LIKE.captures(url))?;
    let host = caps.get(1)?.as_str();
    let path = caps.get(2)?.as_str();

    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(format!("{host}/{path}"))
}
