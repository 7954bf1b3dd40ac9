mod board;
mod builtin;
mod cli;
mod error;
mod form;
mod gemini;
mod html;
mod identity;
mod ledger;
mod model;
mod oracle;
mod shell;
mod summary;
mod text;
mod validator;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;

pub use board::{Action, Applied, AppState, ReplySort, View, hot_replies, sorted_replies};
pub use cli::{Args as CliArgs, Command, ServiceArgs, ViewArg};
pub use error::BoardError;
pub use form::{NewTopic, TopicDraft};
pub use gemini::{GeminiClient, GeminiConfig, parse_verdict};
pub use html::build_page;
pub use identity::{Identity, IdentityStore, generate_anonymous_name};
pub use ledger::{VoteOutcome, cast_vote};
pub use model::{Post, Reply, Stance, load_posts, sample_posts};
pub use oracle::{MarketOracle, SummaryOutcome};
pub use shell::{Flow, Shell, ShellCommand, parse_command};
pub use summary::{PanelState, SummaryPanels};
pub use text::{Segment, mentioned_tickers, segments};
pub use validator::{
    DEFAULT_QUIET_PERIOD, Effect, TickerMachine, TickerStatus, TickerValidator, normalize_ticker,
};

pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let client = Arc::new(GeminiClient::new(&args.service.gemini_config())?);

    match &args.command {
        Command::Validate { ticker } => {
            let ticker = normalize_ticker(ticker);
            if ticker.is_empty() {
                anyhow::bail!("ticker must not be empty");
            }
            let valid = client.validate_ticker(&ticker).await;
            println!("{ticker}: {}", if valid { "VALID" } else { "INVALID" });
            Ok(())
        }
        Command::Summary { ticker } => {
            let ticker = normalize_ticker(ticker.trim_start_matches('$'));
            let outcome = client.fetch_summary(&ticker).await;
            println!("{}", outcome.text());
            Ok(())
        }
        Command::Render {
            out,
            view,
            post,
            search,
            company,
        } => {
            let mut state = load_state(&args)?;
            let now = Utc::now();
            if let Some(company) = company {
                state.apply(Action::SelectCompany(Some(company.clone())), now)?;
            }
            if let Some(query) = search {
                state.apply(Action::Search(query.clone()), now)?;
            }
            if *view == ViewArg::Bookmarks {
                state.apply(Action::SelectView(View::Bookmarks), now)?;
            }
            if let Some(post_id) = post {
                state.apply(Action::SelectPost(post_id.clone()), now)?;
            }
            let page = build_page(&state, &SummaryPanels::new(), now);
            write_page(out, &page)?;
            tracing::info!(path = %out.display(), "rendered board");
            Ok(())
        }
        Command::Shell => {
            let state = load_state(&args)?;
            let quiet = Duration::from_millis(args.quiet_period_ms);
            let (shell, summaries) = Shell::new(state, client, quiet);
            shell::run(shell, summaries).await
        }
    }
}

fn load_state(args: &CliArgs) -> anyhow::Result<AppState> {
    let posts = match &args.posts {
        Some(path) => load_posts(path)?,
        None => sample_posts(Utc::now()),
    };
    let identity = IdentityStore::new(&args.identity_file).load_or_create();
    if !identity.persisted {
        tracing::warn!(name = %identity.name, "identity is not persisted; it will change next run");
    }
    tracing::debug!(posts = posts.len(), user = %identity.name, "board loaded");
    Ok(AppState::new(posts, identity.name))
}

fn write_page(out: &Path, page: &str) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    std::fs::write(out, page).with_context(|| format!("write {}", out.display()))
}
