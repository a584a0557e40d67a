use super::{absolute_or_empty, strip_tags, SourceParser};
use interfaces::defs::RawContentItem;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::debug;

const SENDER_DOMAIN: &str = "tldrnewsletter.com";
const SENDER_ID: &str = "dan@tldrnewsletter.com";

/// TLDR issues are flat link lists: every story is an anchor whose text ends
/// in a "(N minute read)" marker, followed by a blurb that runs until the
/// next story anchor. Navigation anchors (unsubscribe, view online, sponsor
/// buttons) lack the marker and are skipped.
pub struct TldrParser;

fn re_anchor() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap()
    })
}

fn is_story_title(text: &str) -> bool {
    text.to_ascii_lowercase().contains("minute read")
}

impl SourceParser for TldrParser {
    fn is_target(&self, sender: &str) -> bool {
        sender
            .rsplit('@')
            .next()
            .map(|domain| domain.eq_ignore_ascii_case(SENDER_DOMAIN))
            .unwrap_or(false)
    }

    fn parse(&self, raw_body: &str) -> Vec<RawContentItem> {
        let anchors: Vec<_> = re_anchor().captures_iter(raw_body).collect();
        let mut items = Vec::new();
        for (idx, cap) in anchors.iter().enumerate() {
            let title = strip_tags(&cap[2]);
            if !is_story_title(&title) {
                continue;
            }
            let whole = cap.get(0).unwrap();
            let blurb_end = anchors
                .get(idx + 1)
                .map(|next| next.get(0).unwrap().start())
                .unwrap_or(raw_body.len());
            let blurb = &raw_body[whole.end()..blurb_end];
            items.push(RawContentItem {
                source_sender_id: SENDER_ID.to_string(),
                title,
                body: blurb.to_string(),
                link: absolute_or_empty(Some(cap[1].trim().to_string())),
                section: None,
            });
        }
        debug!(items = items.len(), "parsed tldr issue");
        items
    }

    fn name(&self) -> &'static str {
        "tldr"
    }
}
