use url::Url;

use crate::utils::{RealtimeError, Result};

/// Builds the realtime WebSocket URL from an HTTP(S) API base.
///
/// `https://api.example.com/v1` with path `realtime` becomes
/// `wss://api.example.com/realtime?<param>=<credential>`. A single trailing
/// API-version segment (`v1`, `v2`, ...) is dropped before the realtime path
/// is appended.
pub fn realtime_url(base: &str, path: &str, param: &str, credential: &str) -> Result<Url> {
    let mut url =
        Url::parse(base).map_err(|e| RealtimeError::InvalidUrl(format!("{base}: {e}")))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(RealtimeError::InvalidUrl(format!(
                "unsupported scheme `{other}` in {base}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RealtimeError::InvalidUrl(format!("cannot use {scheme} for {base}")))?;

    let mut segments: Vec<String> = url
        .path_segments()
        .map(|parts| {
            parts
                .filter(|part| !part.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    if segments.last().is_some_and(|last| is_version_segment(last)) {
        segments.pop();
    }
    segments.extend(
        path.split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_owned),
    );

    url.set_path(&format!("/{}", segments.join("/")));
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut().append_pair(param, credential);

    Ok(url)
}

/// The URL without its query string, safe to log.
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}
