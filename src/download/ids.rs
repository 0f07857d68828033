//! Extracts an external media identifier (currently YouTube video IDs) from
//! a track URL, used both for download filename disambiguation and for
//! on-disk presence detection (§4.9).

use std::sync::OnceLock;

use regex::Regex;

fn youtube_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:watch\?v=|youtu\.be/|embed/|v/)([A-Za-z0-9_-]{11})")
            .expect("static youtube id pattern")
    })
}

/// First match wins; `None` if the URL carries no recognizable ID.
pub fn youtube_id(url: &str) -> Option<String> {
    youtube_id_re()
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
