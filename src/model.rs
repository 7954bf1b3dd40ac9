use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Bullish,
    Bearish,
}

impl Stance {
    pub fn label(self) -> &'static str {
        match self {
            Stance::Bullish => "bullish",
            Stance::Bearish => "bearish",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author: String,
    pub ticker: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl Post {
    pub fn reply(&self, reply_id: &str) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == reply_id)
    }
}

/// A reply inside a post.
///
/// Tallies and the vote map are private so that the vote ledger is the only
/// code that can change them; `bullish_votes`/`bearish_votes` always equal the
/// number of matching entries in the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replying_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replying_to_author: Option<String>,
    #[serde(default)]
    pub(crate) bullish_votes: u32,
    #[serde(default)]
    pub(crate) bearish_votes: u32,
    #[serde(default)]
    pub(crate) votes: BTreeMap<String, Stance>,
}

impl Reply {
    pub fn new(
        id: String,
        author: String,
        content: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author,
            content,
            created_at,
            replying_to_id: None,
            replying_to_author: None,
            bullish_votes: 0,
            bearish_votes: 0,
            votes: BTreeMap::new(),
        }
    }

    pub fn bullish_votes(&self) -> u32 {
        self.bullish_votes
    }

    pub fn bearish_votes(&self) -> u32 {
        self.bearish_votes
    }

    pub fn votes(&self) -> &BTreeMap<String, Stance> {
        &self.votes
    }

    pub fn stance_of(&self, user: &str) -> Option<Stance> {
        self.votes.get(user).copied()
    }

    pub fn net_score(&self) -> i64 {
        i64::from(self.bullish_votes) - i64::from(self.bearish_votes)
    }

    /// Recomputes both tallies from the vote map. Returns `true` if the stored
    /// tallies disagreed with the map.
    pub(crate) fn reconcile(&mut self) -> bool {
        let (bull, bear) = count_stances(&self.votes);
        let drifted = bull != self.bullish_votes || bear != self.bearish_votes;
        self.bullish_votes = bull;
        self.bearish_votes = bear;
        drifted
    }
}

pub(crate) fn count_stances(votes: &BTreeMap<String, Stance>) -> (u32, u32) {
    votes.values().fold((0, 0), |(bull, bear), s| match s {
        Stance::Bullish => (bull + 1, bear),
        Stance::Bearish => (bull, bear + 1),
    })
}

pub fn load_posts(path: &Path) -> anyhow::Result<Vec<Post>> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let posts: Vec<Post> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse posts from {}", path.display()))?;
    Ok(reconcile_posts(posts))
}

pub(crate) fn reconcile_posts(mut posts: Vec<Post>) -> Vec<Post> {
    for post in &mut posts {
        for reply in &mut post.replies {
            if reply.reconcile() {
                tracing::warn!(
                    post = %post.id,
                    reply = %reply.id,
                    "vote tallies disagreed with the vote map; recounted"
                );
            }
        }
    }
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    posts
}

pub(crate) fn make_id(parts: &[&str], at: DateTime<Utc>, seq: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    hasher.update(at.to_rfc3339().as_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.finalize().to_hex()[..12].to_string()
}

/// Demo board used when no `--posts` file is given.
pub fn sample_posts(now: DateTime<Utc>) -> Vec<Post> {
    let mut r1 = Reply::new(
        "r1".to_string(),
        "WiseObserver456".to_string(),
        "The market is pricing in the new AI features. If they deliver, today's valuation \
         is defensible. It's a bet on future innovation."
            .to_string(),
        now - Duration::minutes(50),
    );
    r1.votes.insert("BraveAnalyst789".to_string(), Stance::Bullish);
    r1.votes.insert("QuickFox311".to_string(), Stance::Bullish);
    r1.votes.insert("CalmOwl902".to_string(), Stance::Bearish);

    let mut r2 = Reply::new(
        "r2".to_string(),
        "BraveAnalyst789".to_string(),
        "Agreed. Services keep growing too, which supports the multiple. #earnings".to_string(),
        now - Duration::minutes(45),
    );
    r2.replying_to_id = Some("r1".to_string());
    r2.replying_to_author = Some("WiseObserver456".to_string());
    r2.votes.insert("WiseObserver456".to_string(), Stance::Bullish);

    let posts = vec![
        Post {
            id: "1".to_string(),
            author: "CalmTrader123".to_string(),
            ticker: "AAPL".to_string(),
            title: "Is it overvalued right now?".to_string(),
            content: "After the recent run I wonder whether Apple ($AAPL) moved too fast. \
                      The P/E looks high against its history. Thoughts, especially with the \
                      product cycle coming up? #earnings"
                .to_string(),
            created_at: now - Duration::hours(2),
            replies: vec![r1, r2],
        },
        Post {
            id: "2".to_string(),
            author: "SharpInvestor234".to_string(),
            ticker: "TSLA".to_string(),
            title: "Deep dive on the new battery tech".to_string(),
            content: "Has anyone read the latest Tesla ($TSLA) patents? Looks like real \
                      progress, and it could hit other EV makers like $RIVN."
                .to_string(),
            created_at: now - Duration::hours(24),
            replies: Vec::new(),
        },
        Post {
            id: "3".to_string(),
            author: "HappyBroker555".to_string(),
            ticker: "NVDA".to_string(),
            title: "What comes next?".to_string(),
            content: "After that rally, is there any room left for Nvidia ($NVDA)?".to_string(),
            created_at: now - Duration::hours(5),
            replies: Vec::new(),
        },
    ];
    reconcile_posts(posts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_recounts_tallies_from_the_vote_map() {
        let json = r#"[{
            "id": "p1",
            "author": "a",
            "ticker": "AAPL",
            "title": "t",
            "content": "c",
            "createdAt": "2026-01-30T00:00:00Z",
            "replies": [{
                "id": "r1",
                "author": "b",
                "content": "x",
                "createdAt": "2026-01-30T01:00:00Z",
                "bullishVotes": 15,
                "bearishVotes": 2,
                "votes": { "carol": "bullish" }
            }]
        }]"#;
        let posts = reconcile_posts(serde_json::from_str(json).unwrap());
        let reply = &posts[0].replies[0];
        assert_eq!((reply.bullish_votes(), reply.bearish_votes()), (1, 0));
        assert_eq!(reply.stance_of("carol"), Some(Stance::Bullish));
    }

    #[test]
    fn sample_board_is_newest_first_and_consistent() {
        let posts = sample_posts(Utc::now());
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["1", "3", "2"]);
        for reply in posts.iter().flat_map(|p| &p.replies) {
            assert_eq!(
                (reply.bullish_votes(), reply.bearish_votes()),
                count_stances(reply.votes())
            );
        }
    }

    #[test]
    fn ids_differ_by_sequence() {
        let at = Utc::now();
        assert_ne!(make_id(&["alice"], at, 1), make_id(&["alice"], at, 2));
        assert_eq!(make_id(&["alice"], at, 1).len(), 12);
    }
}
