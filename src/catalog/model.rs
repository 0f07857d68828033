//! Catalog record shapes and the tag-derivation rule shared by every
//! producer that needs a track's tag set.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::time::{create_safe_date, SafeDate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub slug: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Channel {
    pub fn created(&self) -> SafeDate {
        create_safe_date(self.created_at.as_deref())
    }

    pub fn updated(&self) -> SafeDate {
        create_safe_date(self.updated_at.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.slug)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub discogs_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl Track {
    pub fn created(&self) -> SafeDate {
        create_safe_date(self.created_at.as_deref())
    }

    pub fn updated(&self) -> SafeDate {
        create_safe_date(self.updated_at.as_deref())
    }

    pub fn title_or_untitled(&self) -> &str {
        match &self.title {
            Some(t) if !t.is_empty() => t,
            _ => "Untitled",
        }
    }

    /// The lowercased, deduplicated union of description hashtags and the
    /// explicit tag list. Empty iff the track carries neither source.
    pub fn derived_tags(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();

        if let Some(desc) = &self.description {
            for cap in hashtag_re().find_iter(desc) {
                let tag = cap.as_str().trim_start_matches('#').to_lowercase();
                if !tag.is_empty() {
                    set.insert(tag);
                }
            }
        }

        if let Some(tags) = &self.tags {
            for t in tags {
                let t = t.to_lowercase();
                if !t.is_empty() {
                    set.insert(t);
                }
            }
        }

        set
    }

    /// The tag set used by tag-tree membership: `derived_tags()`, or the
    /// single synthetic tag `untagged` when that set is empty.
    pub fn tag_set_for_tree(&self) -> BTreeSet<String> {
        let derived = self.derived_tags();
        if derived.is_empty() {
            let mut s = BTreeSet::new();
            s.insert("untagged".to_string());
            s
        } else {
            derived
        }
    }
}

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#[A-Za-z0-9_]+").expect("static hashtag pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(description: Option<&str>, tags: Option<Vec<&str>>) -> Track {
        Track {
            id: Some("t1".into()),
            title: Some("Some Title".into()),
            url: "https://example.com".into(),
            description: description.map(|s| s.to_string()),
            discogs_url: None,
            created_at: None,
            updated_at: None,
            tags: tags.map(|v| v.into_iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn extracts_hashtags_case_insensitively() {
        let t = track(Some("great #Techno track #house #house"), None);
        let tags: Vec<_> = t.derived_tags().into_iter().collect();
        assert_eq!(tags, vec!["house".to_string(), "techno".to_string()]);
    }

    #[test]
    fn unions_hashtags_and_explicit_tags() {
        let t = track(Some("#Ambient vibes"), Some(vec!["Chill", "ambient"]));
        let tags: Vec<_> = t.derived_tags().into_iter().collect();
        assert_eq!(tags, vec!["ambient".to_string(), "chill".to_string()]);
    }

    #[test]
    fn empty_sources_yield_empty_set_but_untagged_for_tree() {
        let t = track(None, None);
        assert!(t.derived_tags().is_empty());
        assert_eq!(t.tag_set_for_tree().len(), 1);
        assert!(t.tag_set_for_tree().contains("untagged"));
    }
}
