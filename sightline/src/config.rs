//! Backend endpoint configuration.

use log::debug;

/// Fallback backend when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Environment variable overriding the backend base URL.
pub const BACKEND_URL_ENV: &str = "SIGHTLINE_BACKEND_URL";

const CONFIG_DIR: &str = ".sightline";
const BACKEND_URL_FILE: &str = "backend-url";

/// Resolve the backend base URL. First match wins: the `--backend` flag, the
/// `SIGHTLINE_BACKEND_URL` environment variable, `~/.sightline/backend-url`
/// (a single trimmed line), then the compiled default.
pub fn resolve_backend_url(flag: Option<&str>) -> String {
    if let Some(url) = flag {
        return normalize(url);
    }
    if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
        if !url.trim().is_empty() {
            debug!("backend url from {BACKEND_URL_ENV}");
            return normalize(&url);
        }
    }
    if let Some(url) = read_backend_url_file() {
        debug!("backend url from ~/{CONFIG_DIR}/{BACKEND_URL_FILE}");
        return url;
    }
    DEFAULT_BACKEND_URL.to_string()
}

fn read_backend_url_file() -> Option<String> {
    let path = dirs::home_dir()?.join(CONFIG_DIR).join(BACKEND_URL_FILE);
    let content = std::fs::read_to_string(path).ok()?;
    let url = content.trim();
    if url.is_empty() {
        None
    } else {
        Some(normalize(url))
    }
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
