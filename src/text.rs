use std::sync::LazyLock;

use regex::Regex;

// Ticker boundary is ASCII so CJK text may follow a symbol directly.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?P<ticker>[A-Z]{1,5})(?-u:\b)|#(?P<tag>\w+)").expect("ticker/hashtag regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// Symbol without the leading `$`.
    Ticker(&'a str),
    /// Tag without the leading `#`.
    Hashtag(&'a str),
}

pub fn segments(content: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut last = 0usize;
    for caps in TAG_RE.captures_iter(content) {
        let Some(m) = caps.get(0) else { continue };
        if m.start() > last {
            out.push(Segment::Text(&content[last..m.start()]));
        }
        if let Some(t) = caps.name("ticker") {
            out.push(Segment::Ticker(t.as_str()));
        } else if let Some(t) = caps.name("tag") {
            out.push(Segment::Hashtag(t.as_str()));
        }
        last = m.end();
    }
    if last < content.len() {
        out.push(Segment::Text(&content[last..]));
    }
    out
}

/// Distinct `$TICKER` mentions in order of first appearance.
pub fn mentioned_tickers(content: &str) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for segment in segments(content) {
        if let Segment::Ticker(t) = segment {
            if !seen.iter().any(|s| s == t) {
                seen.push(t.to_string());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_tickers_and_hashtags() {
        assert_eq!(
            segments("Apple ($AAPL) beat #earnings again"),
            vec![
                Segment::Text("Apple ("),
                Segment::Ticker("AAPL"),
                Segment::Text(") beat "),
                Segment::Hashtag("earnings"),
                Segment::Text(" again"),
            ]
        );
    }

    #[test]
    fn ticker_rules() {
        assert_eq!(segments("$ABCDEF"), vec![Segment::Text("$ABCDEF")]);
        assert_eq!(segments("$aapl"), vec![Segment::Text("$aapl")]);
        assert_eq!(segments("$BRK.B"), vec![Segment::Ticker("BRK"), Segment::Text(".B")]);
    }

    #[test]
    fn ticker_followed_by_cjk_text() {
        assert_eq!(
            segments("$TSLA的電池"),
            vec![Segment::Ticker("TSLA"), Segment::Text("的電池")]
        );
        assert_eq!(mentioned_tickers("看好$NVDA和$AMD"), vec!["NVDA", "AMD"]);
    }

    #[test]
    fn hashtags_accept_cjk() {
        assert_eq!(
            segments("#財報分析"),
            vec![Segment::Hashtag("財報分析")]
        );
    }

    #[test]
    fn mentioned_tickers_are_distinct_and_ordered() {
        assert_eq!(
            mentioned_tickers("$TSLA vs $RIVN, and $TSLA again"),
            vec!["TSLA".to_string(), "RIVN".to_string()]
        );
        assert!(mentioned_tickers("no symbols here").is_empty());
    }
}
