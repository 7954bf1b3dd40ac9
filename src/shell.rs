use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc;

use crate::board::{Action, AppState, ReplySort, View, hot_replies, sorted_replies};
use crate::form::TopicDraft;
use crate::html;
use crate::model::{Post, Stance};
use crate::oracle::{MarketOracle, SummaryOutcome};
use crate::summary::{PanelState, SummaryPanels};
use crate::text::mentioned_tickers;
use crate::validator::{TickerStatus, TickerValidator};

const HELP: &str = "\
commands:
  list | bookmarks | company <TICKER|all> | search <text> | tag <hashtag>
  open <post-id> | back | show | sidebar
  bookmark                      toggle bookmark on the open topic
  sort new|bullish              reply order on the open topic
  reply [@<reply-id>] <text>    reply to the open topic
  bull <reply-id> | bear <reply-id>
  summary <TICKER>              fetch the AI summary panel
  new | ticker <text> | title <text> | content <text> | submit | cancel
  render <file.html> | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List,
    Bookmarks,
    Company(Option<String>),
    Search(String),
    Tag(String),
    Open(String),
    Back,
    Show,
    Sidebar,
    Bookmark,
    Sort(ReplySort),
    Reply { to: Option<String>, text: String },
    Vote { reply_id: String, stance: Stance },
    Summary(String),
    New,
    Ticker(String),
    Title(String),
    Content(String),
    Submit,
    Cancel,
    Render(PathBuf),
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));
    let need = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("`{word}` needs {what}"))
        } else {
            Ok(rest.to_string())
        }
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => ShellCommand::List,
        "bookmarks" => ShellCommand::Bookmarks,
        "company" => match rest {
            "" | "all" => ShellCommand::Company(None),
            t => ShellCommand::Company(Some(t.to_string())),
        },
        "search" => ShellCommand::Search(rest.to_string()),
        "tag" => ShellCommand::Tag(need("a hashtag")?.trim_start_matches('#').to_string()),
        "open" => ShellCommand::Open(need("a post id")?),
        "back" => ShellCommand::Back,
        "show" => ShellCommand::Show,
        "sidebar" => ShellCommand::Sidebar,
        "bookmark" => ShellCommand::Bookmark,
        "sort" => match rest {
            "new" | "time" => ShellCommand::Sort(ReplySort::Newest),
            "bullish" => ShellCommand::Sort(ReplySort::MostBullish),
            _ => return Err("`sort` takes `new` or `bullish`".to_string()),
        },
        "reply" => {
            let text = need("some text")?;
            match text.strip_prefix('@') {
                Some(tail) => {
                    let (to, body) = tail
                        .split_once(char::is_whitespace)
                        .ok_or_else(|| "`reply @<id>` needs some text".to_string())?;
                    ShellCommand::Reply {
                        to: Some(to.to_string()),
                        text: body.trim().to_string(),
                    }
                }
                None => ShellCommand::Reply { to: None, text },
            }
        }
        "bull" => ShellCommand::Vote {
            reply_id: need("a reply id")?,
            stance: Stance::Bullish,
        },
        "bear" => ShellCommand::Vote {
            reply_id: need("a reply id")?,
            stance: Stance::Bearish,
        },
        "summary" => ShellCommand::Summary(need("a ticker")?.trim_start_matches('$').to_uppercase()),
        "new" => ShellCommand::New,
        // An empty ticker is a real edit: it clears the field.
        "ticker" => ShellCommand::Ticker(rest.to_string()),
        "title" => ShellCommand::Title(rest.to_string()),
        "content" => ShellCommand::Content(rest.to_string()),
        "submit" => ShellCommand::Submit,
        "cancel" => ShellCommand::Cancel,
        "render" => ShellCommand::Render(PathBuf::from(need("an output path")?)),
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        "" => ShellCommand::Show,
        other => return Err(format!("unknown command `{other}`; try `help`")),
    };
    Ok(cmd)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

pub struct Shell<O> {
    state: AppState,
    panels: SummaryPanels,
    draft: TopicDraft,
    validator: TickerValidator,
    oracle: Arc<O>,
    summaries: mpsc::UnboundedSender<(String, SummaryOutcome)>,
}

impl<O> Shell<O>
where
    O: MarketOracle + 'static,
{
    pub fn new(
        state: AppState,
        oracle: Arc<O>,
        quiet_period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<(String, SummaryOutcome)>) {
        let validator = TickerValidator::spawn(oracle.clone(), quiet_period);
        let (summaries, summary_rx) = mpsc::unbounded_channel();
        let shell = Self {
            state,
            panels: SummaryPanels::new(),
            draft: TopicDraft::default(),
            validator,
            oracle,
            summaries,
        };
        (shell, summary_rx)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn panels(&self) -> &SummaryPanels {
        &self.panels
    }

    pub fn validator(&self) -> &TickerValidator {
        &self.validator
    }

    pub fn execute(&mut self, cmd: ShellCommand, now: DateTime<Utc>) -> anyhow::Result<Flow> {
        let out = match cmd {
            ShellCommand::Quit => return Ok(Flow::Quit),
            ShellCommand::Help => HELP.to_string(),
            ShellCommand::List => self.navigate(Action::SelectView(View::List), now)?,
            ShellCommand::Bookmarks => self.navigate(Action::SelectView(View::Bookmarks), now)?,
            ShellCommand::Company(company) => self.navigate(Action::SelectCompany(company), now)?,
            ShellCommand::Search(query) => self.navigate(Action::Search(query), now)?,
            ShellCommand::Tag(tag) => self.navigate(Action::HashtagClick(tag), now)?,
            ShellCommand::Open(id) => self.navigate(Action::SelectPost(id), now)?,
            ShellCommand::Back => self.navigate(Action::Back, now)?,
            ShellCommand::Sidebar => self.navigate(Action::ToggleSidebar, now)?,
            ShellCommand::Sort(order) => self.navigate(Action::SortReplies(order), now)?,
            ShellCommand::Show => self.screen(now),
            ShellCommand::Bookmark => {
                let post_id = self.open_post_id()?;
                self.state.apply(Action::ToggleBookmark(post_id), now)?;
                self.screen(now)
            }
            ShellCommand::Reply { to, text } => {
                let post_id = self.open_post_id()?;
                self.state.apply(
                    Action::AddReply {
                        post_id,
                        content: text,
                        replying_to: to,
                    },
                    now,
                )?;
                self.screen(now)
            }
            ShellCommand::Vote { reply_id, stance } => {
                let post_id = self.open_post_id()?;
                self.state.apply(
                    Action::Vote {
                        post_id,
                        reply_id,
                        stance,
                    },
                    now,
                )?;
                self.screen(now)
            }
            ShellCommand::Summary(ticker) => self.request_summary(ticker),
            ShellCommand::New => {
                self.state.apply(Action::OpenComposer, now)?;
                self.draft_screen()
            }
            ShellCommand::Ticker(raw) => {
                self.compose()?;
                self.validator.edit(raw.clone());
                self.draft.ticker = raw;
                self.draft_screen()
            }
            ShellCommand::Title(title) => {
                self.compose()?;
                self.draft.title = title;
                self.draft_screen()
            }
            ShellCommand::Content(content) => {
                self.compose()?;
                self.draft.content = content;
                self.draft_screen()
            }
            ShellCommand::Submit => {
                self.compose()?;
                let topic = self.draft.submit(&self.validator.status())?;
                self.state.apply(Action::AddPost(topic), now)?;
                self.reset_draft();
                self.screen(now)
            }
            ShellCommand::Cancel => {
                self.state.apply(Action::CloseComposer, now)?;
                self.reset_draft();
                "discarded the draft".to_string()
            }
            ShellCommand::Render(path) => {
                let page = html::build_page(&self.state, &self.panels, now);
                std::fs::write(&path, page)
                    .with_context(|| format!("write {}", path.display()))?;
                format!("wrote {}", path.display())
            }
        };
        Ok(Flow::Continue(out))
    }

    pub fn on_summary(&mut self, ticker: &str, outcome: SummaryOutcome) -> String {
        let line = if outcome.is_failure() {
            format!("[${ticker}] {}", outcome.text())
        } else {
            format!("[${ticker} summary]\n{}", outcome.text())
        };
        self.panels.finish(ticker, outcome);
        line
    }

    pub fn on_status(&self, status: &TickerStatus) -> Option<String> {
        if !self.state.composing() {
            return None;
        }
        let mark = match status {
            TickerStatus::Valid(_) => "ok",
            TickerStatus::Invalid(_) => "x",
            _ => "..",
        };
        Some(format!("ticker [{mark}] {}", status.message()))
    }

    fn navigate(&mut self, action: Action, now: DateTime<Utc>) -> anyhow::Result<String> {
        self.state.apply(action, now)?;
        Ok(self.screen(now))
    }

    fn open_post_id(&self) -> anyhow::Result<String> {
        self.state
            .selected_post()
            .map(|p| p.id.clone())
            .context("open a topic first")
    }

    fn compose(&mut self) -> anyhow::Result<()> {
        if !self.state.composing() {
            anyhow::bail!("start a draft with `new` first");
        }
        Ok(())
    }

    fn reset_draft(&mut self) {
        self.draft = TopicDraft::default();
        self.validator.edit("");
    }

    fn request_summary(&mut self, ticker: String) -> String {
        if !self.panels.begin(&ticker) {
            return match self.panels.get(&ticker) {
                Some(PanelState::Ready(text)) => format!("[${ticker} summary]\n{text}"),
                _ => format!("summary for ${ticker} is already loading"),
            };
        }
        let oracle = self.oracle.clone();
        let tx = self.summaries.clone();
        let msg = format!("fetching summary for ${ticker}...");
        tokio::spawn(async move {
            let outcome = oracle.fetch_summary(&ticker).await;
            let _ = tx.send((ticker, outcome));
        });
        msg
    }

    fn draft_screen(&self) -> String {
        let status = self.validator.status();
        let mut out = String::new();
        let _ = writeln!(out, "new topic");
        let _ = writeln!(out, "  ticker:  {}  ({})", self.draft.ticker, status.message());
        let _ = writeln!(out, "  title:   {}", self.draft.title);
        let _ = writeln!(out, "  content: {}", self.draft.content);
        let ready = self.draft.can_submit(&status);
        let _ = write!(
            out,
            "  submit:  {}",
            if ready { "ready" } else { "disabled" }
        );
        out
    }

    fn screen(&self, now: DateTime<Utc>) -> String {
        if let Some(post) = self.state.selected_post() {
            return self.topic_screen(post, now);
        }
        let (heading, posts) = match self.state.view() {
            View::Bookmarks => ("bookmarks".to_string(), self.state.bookmarked_posts()),
            View::List => {
                let mut heading = match self.state.company() {
                    Some(c) => format!("topics for ${c}"),
                    None => "all topics".to_string(),
                };
                if !self.state.search().is_empty() {
                    let _ = write!(heading, " matching {:?}", self.state.search());
                }
                (heading, self.state.visible_posts())
            }
        };

        let mut out = String::new();
        if !self.state.sidebar_collapsed() {
            let companies = self.state.companies().join(" ");
            let _ = writeln!(out, "companies: {companies}");
        }
        let _ = writeln!(out, "== {heading} ==");
        if posts.is_empty() {
            let _ = write!(out, "(nothing here)");
        }
        for post in posts {
            let mark = if self.state.is_bookmarked(&post.id) { "*" } else { " " };
            let _ = writeln!(
                out,
                "{mark}[{}] ${:<5} {}  ({}, {} replies)",
                post.id,
                post.ticker,
                post.title,
                post.author,
                post.replies.len()
            );
        }
        out.trim_end().to_string()
    }

    fn topic_screen(&self, post: &Post, now: DateTime<Utc>) -> String {
        let user = self.state.current_user();
        let mut out = String::new();
        let mark = if self.state.is_bookmarked(&post.id) { " [bookmarked]" } else { "" };
        let _ = writeln!(out, "${} | {}{mark}", post.ticker, post.title);
        let _ = writeln!(out, "by {} at {}", post.author, post.created_at.format("%Y-%m-%d %H:%M"));
        let _ = writeln!(out, "{}", post.content);
        self.write_panels(&mut out, &post.content);

        let hot = hot_replies(post, now);
        if !hot.is_empty() {
            let _ = writeln!(out, "-- hot --");
            for reply in hot {
                let _ = writeln!(out, "  [{}] {} (+{})", reply.id, reply.author, reply.net_score());
            }
        }

        let _ = writeln!(out, "-- {} replies --", post.replies.len());
        for reply in sorted_replies(post, self.state.reply_sort()) {
            let to = reply
                .replying_to_author
                .as_deref()
                .map(|a| format!(" @{a}"))
                .unwrap_or_default();
            let mine = reply
                .stance_of(user)
                .map(|s| format!(" (you: {})", s.label()))
                .unwrap_or_default();
            let _ = writeln!(out, "[{}] {}{to}: {}", reply.id, reply.author, reply.content);
            let _ = writeln!(
                out,
                "    bullish {} / bearish {}{mine}",
                reply.bullish_votes(),
                reply.bearish_votes()
            );
            self.write_panels(&mut out, &reply.content);
        }
        out.trim_end().to_string()
    }

    fn write_panels(&self, out: &mut String, content: &str) {
        for ticker in mentioned_tickers(content) {
            match self.panels.get(&ticker) {
                Some(PanelState::Loading) => {
                    let _ = writeln!(out, "    [${ticker}] loading...");
                }
                Some(PanelState::Ready(text)) => {
                    let _ = writeln!(out, "    [${ticker}] {text}");
                }
                Some(PanelState::Failed(message)) => {
                    let _ = writeln!(out, "    [${ticker}] {message}");
                }
                None => {}
            }
        }
    }
}

pub async fn run<O>(
    mut shell: Shell<O>,
    mut summaries: mpsc::UnboundedReceiver<(String, SummaryOutcome)>,
) -> anyhow::Result<()>
where
    O: MarketOracle + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut status = shell.validator().subscribe();

    println!("signed in as {}. type `help` for commands.", shell.state().current_user());
    println!("{}", shell.screen(Utc::now()));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else { break };
                let cmd = match parse_command(&line) {
                    Ok(cmd) => cmd,
                    Err(msg) => {
                        println!("{msg}");
                        continue;
                    }
                };
                match shell.execute(cmd, Utc::now()) {
                    Ok(Flow::Continue(out)) => println!("{out}"),
                    Ok(Flow::Quit) => break,
                    Err(err) => println!("error: {err:#}"),
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    anyhow::bail!("ticker validator stopped");
                }
                let current = status.borrow_and_update().clone();
                if let Some(line) = shell.on_status(&current) {
                    println!("{line}");
                }
            }
            Some((ticker, outcome)) = summaries.recv() => {
                println!("{}", shell.on_summary(&ticker, outcome));
            }
        }
    }
    Ok(())
}
