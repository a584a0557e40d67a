use newsletter_ingestion::parsers::{MorningBrewParser, TldrParser};
use newsletter_ingestion::{sanitize, NewsletterMessage, ParserRegistry, SourceParser};

const MORNING_BREW_BODY: &str = r#"
<html><body>
<h2><span>MARKETS</span></h2>
<table><tr><td>S&amp;P 500 +0.4%</td></tr></table>
<h2>TECH</h2>
<h3>Chipmakers rally on new fab plans</h3>
<p>Shares jumped after the announcement&nbsp;&mdash; analysts expect more.
<a href="https://www.morningbrew.com/daily/stories/chipmakers-rally">Read more</a></p>
<h3>Streaming wars heat up again</h3>
<p>Two platforms cut prices in the same week.
<a href="/daily/stories/streaming-wars">Read more</a></p>
</body></html>
"#;

const TLDR_BODY: &str = r#"
<html><body>
<a href="https://tldr.tech/view-online">View online</a>
<a href="https://example.com/rust-2030">Rust in 2030 (5 minute read)</a>
<p>Where the language is headed over the next five years.</p>
<a href="https://example.com/pg-perf">Postgres performance tips (8 minute read)</a>
<p>Indexes, partitions, and when not to use either.</p>
<a href="https://tldr.tech/unsubscribe">Unsubscribe</a>
</body></html>
"#;

#[test]
fn morning_brew_sections_and_stories() {
    let items = MorningBrewParser.parse(MORNING_BREW_BODY);
    assert_eq!(items.len(), 3);

    // Markets section has no story headings: one item for the section.
    assert_eq!(items[0].title, "MARKETS");
    assert_eq!(items[0].section.as_deref(), Some("MARKETS"));
    assert_eq!(items[0].link, "");

    assert_eq!(items[1].title, "Chipmakers rally on new fab plans");
    assert_eq!(items[1].section.as_deref(), Some("TECH"));
    assert_eq!(
        items[1].link,
        "https://www.morningbrew.com/daily/stories/chipmakers-rally"
    );

    // Relative links are rejected down to the empty string.
    assert_eq!(items[2].title, "Streaming wars heat up again");
    assert_eq!(items[2].link, "");
}

#[test]
fn tldr_skips_navigation_anchors() {
    let items = TldrParser.parse(TLDR_BODY);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Rust in 2030 (5 minute read)");
    assert_eq!(items[0].link, "https://example.com/rust-2030");
    assert!(items[0].body.contains("next five years"));
    assert_eq!(items[1].title, "Postgres performance tips (8 minute read)");
}

#[test]
fn parse_is_restartable_from_scratch() {
    let first = TldrParser.parse(TLDR_BODY);
    let second = TldrParser.parse(TLDR_BODY);
    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].title, second[0].title);
}

#[test]
fn mail_to_items_end_to_end() {
    let raw = format!(
        "From: crew@morningbrew.com\r\n\
         Subject: Morning Brew\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         \r\n\
         {}\r\n",
        MORNING_BREW_BODY.replace('\n', "\r\n")
    );

    let msg = NewsletterMessage::parse(raw.as_bytes()).unwrap();
    let registry = ParserRegistry::default();
    let parser = registry.find_parser(&msg.sender).expect("known sender");
    let items = parser.parse(&msg.body);
    assert_eq!(items.len(), 3);

    // The raw markup still carries entities; sanitizing the extracted body
    // resolves them.
    let clean = sanitize(&items[0].body);
    assert!(clean.contains("S&P 500"), "entity not decoded: {clean}");
    let clean = sanitize(&items[1].body);
    assert!(clean.contains('\u{2014}'), "mdash not decoded: {clean}");
}

#[test]
fn unknown_sender_resolves_to_no_parser() {
    let registry = ParserRegistry::default();
    assert!(registry.find_parser("digest@unknown-letter.io").is_none());
}
