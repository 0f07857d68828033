//! Title -> filesystem-safe slug derivation, and the reverse lookup that
//! resolves a listed stem back to its track record.

const REPLACED: &[char] = &['/', '\\', ':', '?', '"', '*', '<', '>', '|'];
const MAX_CODEPOINTS: usize = 50;

/// Deterministic, total, idempotent. Used for track filenames, tag directory
/// names, and on-disk download filenames alike.
pub fn sanitize(s: &str) -> String {
    if s.trim().is_empty() {
        return "untitled".to_string();
    }

    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if REPLACED.contains(&c) {
            out.push('-');
        } else if c == '.' {
            // dropped, not replaced
        } else if c.is_alphanumeric() || c.is_whitespace() || c == '-' {
            out.push(c);
        }
        // else: stray punctuation/symbols outside the reserved set (e.g.
        // `!@#$%^&()`) are dropped outright, not hyphenated.
    }

    let collapsed = collapse_separators(&out);
    let trimmed = collapsed.trim_matches(|c: char| c == '-' || c.is_whitespace());

    let lowered: String = trimmed.chars().flat_map(|c| c.to_lowercase()).collect();
    let truncated: String = lowered.chars().take(MAX_CODEPOINTS).collect();

    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated
    }
}

/// Runs of whitespace-or-hyphen collapse to a single hyphen.
fn collapse_separators(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c == '-' || c.is_whitespace() {
            if !in_run {
                out.push('-');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// `sanitize(title)` using the track's title, or `"untitled"` if absent/empty,
/// matching the resolver contract in §4.4: `sanitize(title or "untitled")`.
pub fn track_stem(title: Option<&str>) -> String {
    match title {
        Some(t) if !t.is_empty() => sanitize(t),
        _ => sanitize("untitled"),
    }
}

/// Resolve `stem` against `tracks` (already in reversed/display order):
/// first record whose stem equals `stem`, or `None`.
pub fn resolve<'a, T>(tracks: &'a [T], stem: &str, title_of: impl Fn(&T) -> Option<&str>) -> Option<&'a T> {
    tracks.iter().find(|t| track_stem(title_of(t)) == stem)
}

/// Sanitizes a track's derived tag set for use as directory names, both in
/// the virtual tag tree and on disk under the download root. §9's open
/// question ("does the reference's raw-listing/sanitized-disk split need
/// normalizing?") is resolved here: both sides sanitize, since an explicit
/// tag can contain `/` or other path-hostile characters the hashtag
/// pattern already excludes but the free-form tag list does not.
pub fn sanitized_tags(tags: &std::collections::BTreeSet<String>) -> std::collections::BTreeSet<String> {
    tags.iter().map(|t| sanitize(t)).collect()
}

/// Whether `requested` (a path segment) names one of `tags`, after
/// sanitizing each for comparison.
pub fn tag_set_contains(tags: &std::collections::BTreeSet<String>, requested: &str) -> bool {
    tags.iter().any(|t| sanitize(t) == requested)
}
