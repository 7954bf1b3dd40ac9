use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::gemini::GeminiConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    List,
    Bookmarks,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// JSON file with the initial posts. Defaults to a small demo board.
    #[arg(long, global = true)]
    pub posts: Option<PathBuf>,

    /// Where the anonymous display name is remembered between runs.
    #[arg(
        long,
        global = true,
        env = "TICKER_BOARD_IDENTITY",
        default_value = ".ticker-board/identity.json"
    )]
    pub identity_file: PathBuf,

    /// Idle time after the last ticker edit before it is validated.
    #[arg(long, global = true, default_value_t = 800)]
    pub quiet_period_ms: u64,

    #[command(flatten)]
    pub service: ServiceArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ServiceArgs {
    /// Gemini API key. Without it every ticker is treated as invalid.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API (must end with `/`).
    #[arg(
        long,
        global = true,
        default_value = "https://generativelanguage.googleapis.com/"
    )]
    pub api_base: Url,

    #[arg(long, global = true, default_value = "gemini-2.5-flash")]
    pub model: String,

    /// HTTP User-Agent used for API requests.
    #[arg(long, global = true, default_value = "ticker-board/0.1")]
    pub user_agent: String,

    /// Max concurrent API requests.
    #[arg(long, global = true, default_value_t = 4)]
    pub max_concurrency: usize,

    #[arg(long, global = true, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl ServiceArgs {
    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            user_agent: self.user_agent.clone(),
            max_concurrency: self.max_concurrency,
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive board on stdin/stdout.
    Shell,
    /// Write a static HTML snapshot of the board.
    Render {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value = "list")]
        view: ViewArg,
        /// Render the topic page of this post instead of a list.
        #[arg(long)]
        post: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
    /// Ask the service whether a ticker is valid.
    Validate { ticker: String },
    /// Print the AI summary for a ticker.
    Summary { ticker: String },
}
