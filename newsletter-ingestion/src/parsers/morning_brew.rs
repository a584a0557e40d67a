use super::{absolute_or_empty, first_href, strip_tags, SourceParser};
use interfaces::defs::RawContentItem;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::debug;

const SENDER_DOMAIN: &str = "morningbrew.com";
const SENDER_ID: &str = "crew@morningbrew.com";

/// Morning Brew lays its issues out as `<h2>` section headers (MARKETS,
/// TECH, RETAIL, ...) with one or more `<h3>` stories under each. Stories
/// link out through the first anchor in their block.
pub struct MorningBrewParser;

fn re_h2() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").unwrap())
}

fn re_h3() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<h3[^>]*>(.*?)</h3>").unwrap())
}

struct Span {
    heading: String,
    start: usize,
    end: usize,
}

/// Heading matches plus the body range each heading owns (up to the next
/// heading of the same level, or the end of the fragment).
fn heading_spans(re: &Regex, fragment: &str) -> Vec<Span> {
    let matches: Vec<_> = re.captures_iter(fragment).collect();
    let mut spans = Vec::with_capacity(matches.len());
    for (idx, cap) in matches.iter().enumerate() {
        let whole = cap.get(0).unwrap();
        let end = matches
            .get(idx + 1)
            .map(|next| next.get(0).unwrap().start())
            .unwrap_or(fragment.len());
        spans.push(Span {
            heading: strip_tags(&cap[1]),
            start: whole.end(),
            end,
        });
    }
    spans
}

impl SourceParser for MorningBrewParser {
    fn is_target(&self, sender: &str) -> bool {
        sender
            .rsplit('@')
            .next()
            .map(|domain| domain.eq_ignore_ascii_case(SENDER_DOMAIN))
            .unwrap_or(false)
    }

    fn parse(&self, raw_body: &str) -> Vec<RawContentItem> {
        let mut items = Vec::new();
        for section in heading_spans(re_h2(), raw_body) {
            let section_body = &raw_body[section.start..section.end];
            let stories = heading_spans(re_h3(), section_body);
            if stories.is_empty() {
                // Sections without story headings (e.g. the markets table)
                // become a single item.
                items.push(RawContentItem {
                    source_sender_id: SENDER_ID.to_string(),
                    title: section.heading.clone(),
                    body: section_body.to_string(),
                    link: absolute_or_empty(first_href(section_body)),
                    section: Some(section.heading.clone()),
                });
                continue;
            }
            for story in stories {
                let story_body = &section_body[story.start..story.end];
                items.push(RawContentItem {
                    source_sender_id: SENDER_ID.to_string(),
                    title: story.heading,
                    body: story_body.to_string(),
                    link: absolute_or_empty(first_href(story_body)),
                    section: Some(section.heading.clone()),
                });
            }
        }
        debug!(items = items.len(), "parsed morning brew issue");
        items
    }

    fn name(&self) -> &'static str {
        "morning-brew"
    }
}
