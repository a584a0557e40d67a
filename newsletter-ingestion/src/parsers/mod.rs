pub mod morning_brew;
pub mod substack;
pub mod tldr;

pub use morning_brew::MorningBrewParser;
pub use substack::SubstackParser;
pub use tldr::TldrParser;

use interfaces::defs::RawContentItem;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::debug;

/// A parser for one known newsletter source. Each implementation knows how
/// to recognize its sender and how that source lays out items in markup.
pub trait SourceParser: Send + Sync {
    /// Whether mail from `sender` belongs to this source.
    fn is_target(&self, sender: &str) -> bool;

    /// Extract structured items from a raw body. Re-parses from scratch on
    /// every call. Items always satisfy: `link` is absolute or empty,
    /// `title` and `body` are present (possibly empty, never missing).
    fn parse(&self, raw_body: &str) -> Vec<RawContentItem>;

    fn name(&self) -> &'static str;
}

/// Ordered set of source parsers. Resolution walks the list and returns the
/// first parser claiming the sender; registration order is priority order.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn SourceParser>>,
}

impl ParserRegistry {
    pub fn new(parsers: Vec<Box<dyn SourceParser>>) -> Self {
        Self { parsers }
    }

    /// First parser claiming `sender`, or `None` for unknown senders.
    /// Unknown senders are expected in production traffic; callers skip
    /// them rather than erroring.
    pub fn find_parser(&self, sender: &str) -> Option<&dyn SourceParser> {
        let found = self
            .parsers
            .iter()
            .find(|p| p.is_target(sender))
            .map(|p| p.as_ref());
        if found.is_none() {
            debug!(sender, "no parser claims sender, skipping");
        }
        found
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new(vec![
            Box::new(MorningBrewParser),
            Box::new(TldrParser),
            Box::new(SubstackParser),
        ])
    }
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn re_href() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap())
}

/// Drop markup tags and collapse the remaining whitespace.
pub fn strip_tags(fragment: &str) -> String {
    let text = re_tags().replace_all(fragment, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First hyperlink target in the fragment, if any.
pub(crate) fn first_href(fragment: &str) -> Option<String> {
    re_href()
        .captures(fragment)
        .map(|c| c[1].trim().to_string())
}

/// Items guarantee an absolute URL or the empty string, never a relative
/// path or a tracking pseudo-scheme.
pub(crate) fn absolute_or_empty(link: Option<String>) -> String {
    match link {
        Some(l) => match url::Url::parse(&l) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => l,
            _ => String::new(),
        },
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_in_priority_order() {
        let registry = ParserRegistry::default();
        let p = registry.find_parser("crew@morningbrew.com").unwrap();
        assert_eq!(p.name(), "morning-brew");
        let p = registry.find_parser("dan@tldrnewsletter.com").unwrap();
        assert_eq!(p.name(), "tldr");
        let p = registry.find_parser("author@essays.substack.com").unwrap();
        assert_eq!(p.name(), "substack");
    }

    #[test]
    fn unknown_sender_is_a_skip_not_an_error() {
        let registry = ParserRegistry::default();
        assert!(registry.find_parser("noreply@example.com").is_none());
    }

    #[test]
    fn link_normalization() {
        assert_eq!(
            absolute_or_empty(Some("https://example.com/a".into())),
            "https://example.com/a"
        );
        assert_eq!(absolute_or_empty(Some("/relative/path".into())), "");
        assert_eq!(absolute_or_empty(Some("mailto:x@y.z".into())), "");
        assert_eq!(absolute_or_empty(None), "");
    }

    #[test]
    fn strip_tags_collapses_whitespace() {
        assert_eq!(
            strip_tags("<h2>\n  Markets <span>today</span>\n</h2>"),
            "Markets today"
        );
    }
}
