use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::error::BoardError;
use crate::form::NewTopic;
use crate::ledger::{self, VoteOutcome};
use crate::model::{Post, Reply, Stance, make_id};

const HOT_WINDOW_HOURS: i64 = 24;
const HOT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    List,
    Bookmarks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplySort {
    #[default]
    Newest,
    MostBullish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddPost(NewTopic),
    AddReply {
        post_id: String,
        content: String,
        replying_to: Option<String>,
    },
    Vote {
        post_id: String,
        reply_id: String,
        stance: Stance,
    },
    ToggleBookmark(String),
    SelectCompany(Option<String>),
    SelectView(View),
    SelectPost(String),
    Back,
    Search(String),
    HashtagClick(String),
    ToggleSidebar,
    OpenComposer,
    CloseComposer,
    SortReplies(ReplySort),
}

/// What an action changed, for front ends that want to echo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    PostAdded(String),
    ReplyAdded(String),
    Voted(VoteOutcome),
    Bookmarked(bool),
    Updated,
}

/// The whole board. Front ends never touch the fields directly to change
/// them; every change goes through [`AppState::apply`].
#[derive(Debug, Clone)]
pub struct AppState {
    posts: Vec<Post>,
    current_user: String,
    selected_post: Option<String>,
    view: View,
    search: String,
    company: Option<String>,
    bookmarks: BTreeSet<String>,
    sidebar_collapsed: bool,
    composing: bool,
    reply_sort: ReplySort,
    seq: u64,
}

impl AppState {
    pub fn new(posts: Vec<Post>, current_user: impl Into<String>) -> Self {
        Self {
            posts,
            current_user: current_user.into(),
            selected_post: None,
            view: View::List,
            search: String::new(),
            company: None,
            bookmarks: BTreeSet::new(),
            sidebar_collapsed: false,
            composing: false,
            reply_sort: ReplySort::Newest,
            seq: 0,
        }
    }

    pub fn apply(&mut self, action: Action, now: DateTime<Utc>) -> Result<Applied, BoardError> {
        match action {
            Action::AddPost(topic) => {
                self.seq += 1;
                let id = make_id(&[&self.current_user, &topic.title], now, self.seq);
                self.posts.insert(
                    0,
                    Post {
                        id: id.clone(),
                        author: self.current_user.clone(),
                        ticker: topic.ticker,
                        title: topic.title,
                        content: topic.content,
                        created_at: now,
                        replies: Vec::new(),
                    },
                );
                self.posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                self.composing = false;
                tracing::info!(post = %id, "post added");
                Ok(Applied::PostAdded(id))
            }
            Action::AddReply {
                post_id,
                content,
                replying_to,
            } => {
                let content = content.trim();
                if content.is_empty() {
                    return Err(BoardError::BlankField("reply"));
                }
                self.seq += 1;
                let seq = self.seq;
                let user = self.current_user.clone();
                let post = self.post_mut(&post_id)?;
                let target = match replying_to {
                    Some(reply_id) => {
                        let parent = post.reply(&reply_id).ok_or_else(|| {
                            BoardError::ReplyNotFound {
                                post_id: post_id.clone(),
                                reply_id: reply_id.clone(),
                            }
                        })?;
                        Some((reply_id, parent.author.clone()))
                    }
                    None => None,
                };
                let id = make_id(&[&post_id, &user], now, seq);
                let mut reply = Reply::new(id.clone(), user, content.to_string(), now);
                if let Some((reply_id, author)) = target {
                    reply.replying_to_id = Some(reply_id);
                    reply.replying_to_author = Some(author);
                }
                post.replies.push(reply);
                tracing::info!(post = %post_id, reply = %id, "reply added");
                Ok(Applied::ReplyAdded(id))
            }
            Action::Vote {
                post_id,
                reply_id,
                stance,
            } => {
                let user = self.current_user.clone();
                let post = self.post_mut(&post_id)?;
                let (replies, outcome) = ledger::cast_vote(post, &reply_id, &user, stance)?;
                post.replies = replies;
                tracing::debug!(post = %post_id, reply = %reply_id, ?outcome, "vote recorded");
                Ok(Applied::Voted(outcome))
            }
            Action::ToggleBookmark(post_id) => {
                self.post(&post_id)?;
                let added = if self.bookmarks.remove(&post_id) {
                    false
                } else {
                    self.bookmarks.insert(post_id);
                    true
                };
                Ok(Applied::Bookmarked(added))
            }
            Action::SelectCompany(company) => {
                self.view = View::List;
                self.company = company.map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty());
                self.selected_post = None;
                Ok(Applied::Updated)
            }
            Action::SelectView(view) => {
                self.view = view;
                self.selected_post = None;
                Ok(Applied::Updated)
            }
            Action::SelectPost(post_id) => {
                self.post(&post_id)?;
                self.selected_post = Some(post_id);
                Ok(Applied::Updated)
            }
            Action::Back => {
                self.selected_post = None;
                Ok(Applied::Updated)
            }
            Action::Search(query) => {
                self.search = query;
                Ok(Applied::Updated)
            }
            Action::HashtagClick(tag) => {
                self.search = tag;
                self.selected_post = None;
                self.view = View::List;
                self.company = None;
                Ok(Applied::Updated)
            }
            Action::ToggleSidebar => {
                self.sidebar_collapsed = !self.sidebar_collapsed;
                Ok(Applied::Updated)
            }
            Action::OpenComposer => {
                self.composing = true;
                Ok(Applied::Updated)
            }
            Action::CloseComposer => {
                self.composing = false;
                Ok(Applied::Updated)
            }
            Action::SortReplies(order) => {
                self.reply_sort = order;
                Ok(Applied::Updated)
            }
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    pub fn sidebar_collapsed(&self) -> bool {
        self.sidebar_collapsed
    }

    pub fn composing(&self) -> bool {
        self.composing
    }

    pub fn reply_sort(&self) -> ReplySort {
        self.reply_sort
    }

    pub fn is_bookmarked(&self, post_id: &str) -> bool {
        self.bookmarks.contains(post_id)
    }

    pub fn post(&self, post_id: &str) -> Result<&Post, BoardError> {
        self.posts
            .iter()
            .find(|p| p.id == post_id)
            .ok_or_else(|| BoardError::PostNotFound(post_id.to_string()))
    }

    fn post_mut(&mut self, post_id: &str) -> Result<&mut Post, BoardError> {
        self.posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| BoardError::PostNotFound(post_id.to_string()))
    }

    pub fn selected_post(&self) -> Option<&Post> {
        let id = self.selected_post.as_deref()?;
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn visible_posts(&self) -> Vec<&Post> {
        let company = match self.view {
            View::Bookmarks => None,
            View::List => self.company.as_deref(),
        };
        let query = self.search.trim().to_lowercase();
        self.posts
            .iter()
            .filter(|p| company.is_none_or(|c| p.ticker == c))
            .filter(|p| query.is_empty() || matches_query(p, &query))
            .collect()
    }

    pub fn bookmarked_posts(&self) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|p| self.bookmarks.contains(&p.id))
            .collect()
    }

    pub fn companies(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .posts
            .iter()
            .map(|p| p.ticker.as_str())
            .filter(|t| !t.is_empty())
            .collect();
        set.into_iter().collect()
    }
}

fn matches_query(post: &Post, query: &str) -> bool {
    let haystack = std::iter::once(post.title.as_str())
        .chain(std::iter::once(post.content.as_str()))
        .chain(post.replies.iter().map(|r| r.content.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    haystack.contains(query) || haystack.contains(&format!("#{query}"))
}

/// Up to three replies from the last 24 hours with the best positive net score.
pub fn hot_replies(post: &Post, now: DateTime<Utc>) -> Vec<&Reply> {
    let since = now - Duration::hours(HOT_WINDOW_HOURS);
    let mut recent: Vec<&Reply> = post
        .replies
        .iter()
        .filter(|r| r.created_at > since)
        .collect();
    recent.sort_by(|a, b| b.net_score().cmp(&a.net_score()));
    recent
        .into_iter()
        .take(HOT_LIMIT)
        .filter(|r| r.net_score() > 0)
        .collect()
}

pub fn sorted_replies(post: &Post, order: ReplySort) -> Vec<&Reply> {
    let mut replies: Vec<&Reply> = post.replies.iter().collect();
    match order {
        ReplySort::Newest => replies.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        ReplySort::MostBullish => replies.sort_by(|a, b| b.bullish_votes().cmp(&a.bullish_votes())),
    }
    replies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::TopicDraft;
    use crate::model::sample_posts;
    use crate::validator::TickerStatus;

    fn board() -> (AppState, DateTime<Utc>) {
        let now = Utc::now();
        (AppState::new(sample_posts(now), "Me"), now)
    }

    fn topic(ticker: &str, title: &str) -> NewTopic {
        TopicDraft {
            title: title.to_string(),
            content: "body".to_string(),
            ticker: ticker.to_string(),
        }
        .submit(&TickerStatus::Valid(ticker.to_string()))
        .unwrap()
    }

    #[test]
    fn new_post_goes_first_and_closes_composer() {
        let (mut state, now) = board();
        state.apply(Action::OpenComposer, now).unwrap();
        let Applied::PostAdded(id) = state.apply(Action::AddPost(topic("MSFT", "Cloud")), now).unwrap()
        else {
            panic!("expected PostAdded");
        };
        assert_eq!(state.posts()[0].id, id);
        assert_eq!(state.posts()[0].author, "Me");
        assert!(!state.composing());
    }

    #[test]
    fn new_post_wins_a_timestamp_tie() {
        let (mut state, now) = board();
        let first = state.apply(Action::AddPost(topic("MSFT", "First")), now).unwrap();
        let second = state.apply(Action::AddPost(topic("AMD", "Second")), now).unwrap();
        assert_eq!(second, Applied::PostAdded(state.posts()[0].id.clone()));
        assert_eq!(first, Applied::PostAdded(state.posts()[1].id.clone()));
    }

    #[test]
    fn reply_to_reply_copies_author() {
        let (mut state, now) = board();
        let applied = state
            .apply(
                Action::AddReply {
                    post_id: "1".to_string(),
                    content: "  me too  ".to_string(),
                    replying_to: Some("r1".to_string()),
                },
                now,
            )
            .unwrap();
        let Applied::ReplyAdded(id) = applied else {
            panic!("expected ReplyAdded");
        };
        let reply = state.post("1").unwrap().reply(&id).unwrap();
        assert_eq!(reply.content, "me too");
        assert_eq!(reply.replying_to_author.as_deref(), Some("WiseObserver456"));
        assert_eq!((reply.bullish_votes(), reply.bearish_votes()), (0, 0));
    }

    #[test]
    fn blank_reply_and_unknown_targets_fail() {
        let (mut state, now) = board();
        let blank = Action::AddReply {
            post_id: "1".to_string(),
            content: " ".to_string(),
            replying_to: None,
        };
        assert_eq!(state.apply(blank, now), Err(BoardError::BlankField("reply")));
        let missing = Action::Vote {
            post_id: "404".to_string(),
            reply_id: "r1".to_string(),
            stance: Stance::Bullish,
        };
        assert_eq!(
            state.apply(missing, now),
            Err(BoardError::PostNotFound("404".to_string()))
        );
    }

    #[test]
    fn votes_are_cast_as_the_current_user() {
        let (mut state, now) = board();
        let vote = Action::Vote {
            post_id: "1".to_string(),
            reply_id: "r2".to_string(),
            stance: Stance::Bearish,
        };
        state.apply(vote.clone(), now).unwrap();
        let r2 = state.post("1").unwrap().reply("r2").unwrap();
        assert_eq!(r2.stance_of("Me"), Some(Stance::Bearish));
        assert_eq!(
            state.apply(vote, now).unwrap(),
            Applied::Voted(VoteOutcome::Withdrawn(Stance::Bearish))
        );
    }

    #[test]
    fn company_and_search_filters() {
        let (mut state, now) = board();
        state
            .apply(Action::SelectCompany(Some("tsla".to_string())), now)
            .unwrap();
        let ids: Vec<_> = state.visible_posts().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, ["2"]);

        state.apply(Action::SelectCompany(None), now).unwrap();
        state.apply(Action::Search("SERVICES".to_string()), now).unwrap();
        let ids: Vec<_> = state.visible_posts().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, ["1"], "reply text is searched too");
    }

    #[test]
    fn hashtag_click_resets_navigation() {
        let (mut state, now) = board();
        state
            .apply(Action::SelectCompany(Some("NVDA".to_string())), now)
            .unwrap();
        state.apply(Action::SelectPost("3".to_string()), now).unwrap();
        state
            .apply(Action::HashtagClick("earnings".to_string()), now)
            .unwrap();
        assert!(state.selected_post().is_none());
        assert_eq!(state.company(), None);
        assert_eq!(state.view(), View::List);
        assert_eq!(state.visible_posts().len(), 1);
    }

    #[test]
    fn bookmarks_toggle_and_ignore_company_filter() {
        let (mut state, now) = board();
        assert_eq!(
            state.apply(Action::ToggleBookmark("2".to_string()), now),
            Ok(Applied::Bookmarked(true))
        );
        state.apply(Action::ToggleBookmark("3".to_string()), now).unwrap();
        state.apply(Action::ToggleBookmark("3".to_string()), now).unwrap();
        let ids: Vec<_> = state.bookmarked_posts().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, ["2"]);

        state
            .apply(Action::SelectCompany(Some("AAPL".to_string())), now)
            .unwrap();
        state.apply(Action::SelectView(View::Bookmarks), now).unwrap();
        assert_eq!(state.visible_posts().len(), 3);
        assert!(state.apply(Action::ToggleBookmark("x".to_string()), now).is_err());
    }

    #[test]
    fn companies_are_sorted_and_distinct() {
        let (mut state, now) = board();
        state.apply(Action::AddPost(topic("AAPL", "Again")), now).unwrap();
        assert_eq!(state.companies(), ["AAPL", "NVDA", "TSLA"]);
    }

    #[test]
    fn hot_replies_need_positive_recent_score() {
        let (state, now) = board();
        let post = state.post("1").unwrap();
        let hot: Vec<_> = hot_replies(post, now).iter().map(|r| r.id.clone()).collect();
        assert_eq!(hot, ["r1", "r2"]);
        assert!(hot_replies(post, now + Duration::hours(25)).is_empty());
    }

    #[test]
    fn reply_ordering() {
        let (state, _) = board();
        let post = state.post("1").unwrap();
        let newest: Vec<_> = sorted_replies(post, ReplySort::Newest)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(newest, ["r2", "r1"]);
        let bullish: Vec<_> = sorted_replies(post, ReplySort::MostBullish)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(bullish, ["r1", "r2"]);
    }
}
