use chrono::{DateTime, Utc};
use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::board::{AppState, ReplySort, View, hot_replies, sorted_replies};
use crate::builtin;
use crate::model::{Post, Reply, Stance};
use crate::summary::{PanelState, SummaryPanels};
use crate::text::{Segment, mentioned_tickers, segments};

pub fn build_page(state: &AppState, panels: &SummaryPanels, now: DateTime<Utc>) -> String {
    let title = match state.selected_post() {
        Some(post) => format!("${} · {}", post.ticker, post.title),
        None => "Ticker Board".to_string(),
    };

    let markup: Markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(builtin::BOARD_CSS)) }
            }
            body class="tb" {
                (render_sidebar(state))
                main class="tb-main" {
                    @if let Some(post) = state.selected_post() {
                        (render_topic(state, post, panels, now))
                    } @else if state.view() == View::Bookmarks {
                        h1 { "Bookmarks" }
                        (render_post_list(&state.bookmarked_posts(), "No bookmarked topics yet."))
                    } @else {
                        h1 { "Topics" }
                        @if !state.search().is_empty() {
                            p class="tb-meta" { "Search: " (state.search()) }
                        }
                        (render_post_list(&state.visible_posts(), "No topics match."))
                    }
                }
            }
        }
    };
    markup.into_string()
}

fn render_sidebar(state: &AppState) -> Markup {
    let sidebar_class = if state.sidebar_collapsed() {
        "tb-sidebar tb-collapsed"
    } else {
        "tb-sidebar"
    };
    let all_active = state.view() == View::List && state.company().is_none();

    html! {
        aside class=(sidebar_class) {
            input class="tb-search" type="search" value=(state.search())
                placeholder="Find topics or keywords...";
            ul {
                li class=[(state.view() == View::Bookmarks).then_some("tb-active")] { "My bookmarks" }
            }
            h2 { "Companies" }
            ul {
                li class=[all_active.then_some("tb-active")] { "All companies" }
                @for company in state.companies() {
                    @let active = state.view() == View::List && state.company() == Some(company);
                    li class=[active.then_some("tb-active")] {
                        span class="tb-ticker" { "$" (company) }
                    }
                }
            }
            p class="tb-meta" { "Signed in as " (state.current_user()) }
        }
    }
}

fn render_post_list(posts: &[&Post], empty: &str) -> Markup {
    html! {
        @if posts.is_empty() {
            p class="tb-empty" { (empty) }
        }
        @for post in posts {
            article id=(format!("post-{}", post.id)) class="tb-card" {
                span class="tb-ticker" { "$" (post.ticker) }
                h2 { (post.title) }
                div class="tb-meta" {
                    (post.author) " · " (format_time(post.created_at)) " · "
                    (post.replies.len()) " replies"
                }
            }
        }
    }
}

fn render_topic(
    state: &AppState,
    post: &Post,
    panels: &SummaryPanels,
    now: DateTime<Utc>,
) -> Markup {
    let hot = hot_replies(post, now);
    let order = state.reply_sort();
    let user = state.current_user();

    html! {
        article id=(format!("post-{}", post.id)) class="tb-card" {
            span class="tb-ticker" { "$" (post.ticker) }
            @if state.is_bookmarked(&post.id) {
                " " span class="tb-bookmarked" { "★ bookmarked" }
            }
            h1 { (post.title) }
            div class="tb-meta" { "Posted by " (post.author) " on " (format_time(post.created_at)) }
            (render_content(&post.content, panels))
        }

        @if !hot.is_empty() {
            section class="tb-card tb-hot" {
                h2 { "Hot replies" }
                @for reply in &hot {
                    div class="tb-meta" {
                        a class="tb-reply-ref" href=(format!("#reply-{}", reply.id)) { (reply.author) }
                        " · net +" (reply.net_score())
                    }
                }
            }
        }

        section {
            h2 {
                (post.replies.len()) " replies · sorted by "
                (match order { ReplySort::Newest => "time", ReplySort::MostBullish => "most bullish" })
            }
            @for reply in sorted_replies(post, order) {
                (render_reply(reply, user, panels))
            }
        }
    }
}

fn render_reply(reply: &Reply, user: &str, panels: &SummaryPanels) -> Markup {
    let stance = reply.stance_of(user);
    html! {
        div id=(format!("reply-{}", reply.id)) class="tb-card tb-reply" {
            div class="tb-meta" {
                strong { (reply.author) } " · " (format_time(reply.created_at))
            }
            @if let (Some(target), Some(author)) = (&reply.replying_to_id, &reply.replying_to_author) {
                a class="tb-reply-ref" href=(format!("#reply-{target}")) { "@" (author) }
            }
            (render_content(&reply.content, panels))
            div class="tb-votes" {
                span class="tb-bull" aria-pressed=(pressed(stance, Stance::Bullish)) {
                    "▲ bullish (" (reply.bullish_votes()) ")"
                }
                span class="tb-bear" aria-pressed=(pressed(stance, Stance::Bearish)) {
                    "▼ bearish (" (reply.bearish_votes()) ")"
                }
            }
        }
    }
}

fn render_content(content: &str, panels: &SummaryPanels) -> Markup {
    html! {
        div class="tb-body" {
            @for segment in segments(content) {
                @match segment {
                    Segment::Text(t) => { (t) }
                    Segment::Ticker(t) => { span class="tb-ticker" data-ticker=(t) { "$" (t) } }
                    Segment::Hashtag(t) => { span class="tb-hashtag" data-tag=(t) { "#" (t) } }
                }
            }
        }
        @for ticker in mentioned_tickers(content) {
            @match panels.get(&ticker) {
                Some(PanelState::Loading) => {
                    div class="tb-summary" { "Loading summary for $" (ticker) "..." }
                }
                Some(PanelState::Ready(text)) => {
                    div class="tb-summary" {
                        h4 { "AI summary for $" (ticker) }
                        p { (text) }
                    }
                }
                Some(PanelState::Failed(message)) => {
                    div class="tb-summary tb-failed" { (message) }
                }
                None => {}
            }
        }
    }
}

fn pressed(current: Option<Stance>, button: Stance) -> &'static str {
    if current == Some(button) { "true" } else { "false" }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}
