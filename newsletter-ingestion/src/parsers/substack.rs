use super::{absolute_or_empty, strip_tags, SourceParser};
use interfaces::defs::RawContentItem;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::debug;

/// Generic Substack publication: one post per mail. The post title is the
/// first `<h1>` and the canonical post link is the first anchor pointing at
/// a `/p/` path on the publication's domain.
pub struct SubstackParser;

fn re_h1() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap())
}

fn re_post_link() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["'](https?://[^"']*/p/[^"']+)["']"#).unwrap()
    })
}

impl SourceParser for SubstackParser {
    fn is_target(&self, sender: &str) -> bool {
        sender
            .rsplit('@')
            .next()
            .map(|domain| {
                let domain = domain.to_ascii_lowercase();
                domain == "substack.com" || domain.ends_with(".substack.com")
            })
            .unwrap_or(false)
    }

    fn parse(&self, raw_body: &str) -> Vec<RawContentItem> {
        let title = re_h1()
            .captures(raw_body)
            .map(|c| strip_tags(&c[1]))
            .unwrap_or_default();
        let link = re_post_link()
            .captures(raw_body)
            .map(|c| c[1].trim().to_string());

        if title.is_empty() && raw_body.trim().is_empty() {
            debug!("empty substack body, no items");
            return Vec::new();
        }

        vec![RawContentItem {
            source_sender_id: "substack.com".to_string(),
            title,
            body: raw_body.to_string(),
            link: absolute_or_empty(link),
            section: None,
        }]
    }

    fn name(&self) -> &'static str {
        "substack"
    }
}
