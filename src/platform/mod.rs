//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Wall-clock time
//! - Backend URL resolution

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Environment variable read by native builds
pub const BACKEND_URL_ENV: &str = "HAND_OF_GRAVITY_BACKEND";

/// Milliseconds since the Unix epoch
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Milliseconds since the Unix epoch
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Backend base URL (no trailing slash, no `/api`)
///
/// When the page is served from localhost the backend is assumed to run
/// next to it on port 8000; anywhere else it lives on the page origin.
#[cfg(target_arch = "wasm32")]
pub fn backend_url() -> String {
    let Some(location) = web_sys::window().map(|w| w.location()) else {
        return DEFAULT_BACKEND_URL.to_string();
    };
    let hostname = location.hostname().unwrap_or_default();
    if hostname == "localhost" || hostname == "127.0.0.1" {
        return DEFAULT_BACKEND_URL.to_string();
    }
    let origin = location.origin().unwrap_or_default();
    if origin.is_empty() || origin == "null" {
        DEFAULT_BACKEND_URL.to_string()
    } else {
        origin
    }
}

#[cfg(not(target_arch = "wasm32"))]
static NATIVE_BACKEND_URL: std::sync::OnceLock<String> = std::sync::OnceLock::new();

/// Set the backend URL for native builds. First call wins.
#[cfg(not(target_arch = "wasm32"))]
pub fn set_backend_url(url: impl Into<String>) {
    let url = url.into();
    if NATIVE_BACKEND_URL.set(trim_url(&url)).is_err() {
        log::warn!("Backend URL already set, ignoring {}", url);
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn backend_url() -> String {
    if let Some(url) = NATIVE_BACKEND_URL.get() {
        return url.clone();
    }
    std::env::var(BACKEND_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| trim_url(&v))
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

#[cfg_attr(target_arch = "wasm32", allow(dead_code))]
fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_url() {
        assert_eq!(trim_url(" http://example.com/ "), "http://example.com");
        assert_eq!(trim_url("http://localhost:8000"), "http://localhost:8000");
    }

    #[test]
    fn test_clock_moves_forward() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert!(a > 0.0);
    }
}
