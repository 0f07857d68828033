//! Splits an incoming absolute path into segments and classifies the result
//! into one of the node kinds in §3. Classification is positional, not
//! regex-based, as the top-level segment alone selects the subtree.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VNode {
    Root,
    RootHelp,
    ChannelsDir,
    ChannelDir { slug: String },
    ChannelAbout { slug: String },
    ChannelImageUrl { slug: String },
    ChannelM3u { slug: String },
    TracksDir { slug: String },
    TracksJson { slug: String },
    TrackText { slug: String, stem: String },
    TagsDir { slug: String },
    TagDir { slug: String, tag: String },
    TagTrackText { slug: String, tag: String, stem: String },
    FavoritesDir,
    /// Bare `/favorites/{slug}` — returns a directory stat without catalog
    /// access (§4.1's alias-directory-level rule). Everything below this is
    /// rewritten to `/channels/{slug}/...` and re-classified.
    FavoriteAliasRoot { slug: String },
    DownloadsDir,
    DownloadAliasRoot { slug: String },
    /// The single writable path (§6). Its location is an implementation
    /// decision the spec leaves to the implementer; resolved in DESIGN.md.
    Control,
}

pub fn classify(path: &str) -> Option<VNode> {
    let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segs.is_empty() {
        return Some(VNode::Root);
    }

    match segs[0] {
        "HELP.txt" if segs.len() == 1 => Some(VNode::RootHelp),
        "control" if segs.len() == 1 => Some(VNode::Control),
        "channels" => classify_channels(&segs[1..]),
        "favorites" => classify_alias(&segs[1..], Alias::Favorites),
        "downloads" => classify_alias(&segs[1..], Alias::Downloads),
        _ => None,
    }
}

enum Alias {
    Favorites,
    Downloads,
}

fn classify_alias(rest: &[&str], kind: Alias) -> Option<VNode> {
    match rest {
        [] => Some(match kind {
            Alias::Favorites => VNode::FavoritesDir,
            Alias::Downloads => VNode::DownloadsDir,
        }),
        [slug] => Some(match kind {
            Alias::Favorites => VNode::FavoriteAliasRoot { slug: slug.to_string() },
            Alias::Downloads => VNode::DownloadAliasRoot { slug: slug.to_string() },
        }),
        [slug, tail @ ..] => classify_channels(&[&[*slug], tail].concat()),
    }
}

fn classify_channels(rest: &[&str]) -> Option<VNode> {
    match rest {
        [] => Some(VNode::ChannelsDir),
        [slug] => Some(VNode::ChannelDir { slug: slug.to_string() }),
        [slug, "ABOUT.txt"] => Some(VNode::ChannelAbout { slug: slug.to_string() }),
        [slug, "image.url"] => Some(VNode::ChannelImageUrl { slug: slug.to_string() }),
        [slug, "tracks.m3u"] => Some(VNode::ChannelM3u { slug: slug.to_string() }),
        [slug, "tracks"] => Some(VNode::TracksDir { slug: slug.to_string() }),
        [slug, "tracks", "tracks.json"] => Some(VNode::TracksJson { slug: slug.to_string() }),
        [slug, "tracks", file] => file.strip_suffix(".txt").map(|stem| VNode::TrackText {
            slug: slug.to_string(),
            stem: stem.to_string(),
        }),
        [slug, "tags"] => Some(VNode::TagsDir { slug: slug.to_string() }),
        [slug, "tags", tag] => Some(VNode::TagDir {
            slug: slug.to_string(),
            tag: tag.to_string(),
        }),
        [slug, "tags", tag, file] => file.strip_suffix(".txt").map(|stem| VNode::TagTrackText {
            slug: slug.to_string(),
            tag: tag.to_string(),
            stem: stem.to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_help() {
        assert_eq!(classify("/"), Some(VNode::Root));
        assert_eq!(classify(""), Some(VNode::Root));
        assert_eq!(classify("/HELP.txt"), Some(VNode::RootHelp));
    }

    #[test]
    fn channel_subtree() {
        assert_eq!(
            classify("/channels/deepweb"),
            Some(VNode::ChannelDir { slug: "deepweb".into() })
        );
        assert_eq!(
            classify("/channels/deepweb/tracks/hello-world.txt"),
            Some(VNode::TrackText {
                slug: "deepweb".into(),
                stem: "hello-world".into()
            })
        );
        assert_eq!(
            classify("/channels/deepweb/tags/house/hello-world.txt"),
            Some(VNode::TagTrackText {
                slug: "deepweb".into(),
                tag: "house".into(),
                stem: "hello-world".into()
            })
        );
    }

    #[test]
    fn aliases_rewrite_into_channel_subtree() {
        assert_eq!(
            classify("/favorites/deepweb"),
            Some(VNode::FavoriteAliasRoot { slug: "deepweb".into() })
        );
        assert_eq!(
            classify("/downloads/deepweb/tracks"),
            Some(VNode::TracksDir { slug: "deepweb".into() })
        );
    }

    #[test]
    fn unclassified_paths_are_none() {
        assert_eq!(classify("/nonsense"), None);
        assert_eq!(classify("/channels/slug/bogus"), None);
    }
}
