use std::future::Future;

/// What a summary request produced. Both variants carry text that can be shown
/// to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Summary(String),
    Failed(String),
}

impl SummaryOutcome {
    pub fn text(&self) -> &str {
        match self {
            SummaryOutcome::Summary(s) | SummaryOutcome::Failed(s) => s,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SummaryOutcome::Failed(_))
    }
}

/// External market knowledge service.
///
/// Neither call surfaces an error: `validate_ticker` answers `false` whenever it
/// cannot get a definite "valid" verdict, and `fetch_summary` folds failures
/// into [`SummaryOutcome::Failed`].
pub trait MarketOracle: Send + Sync {
    fn validate_ticker(&self, ticker: &str) -> impl Future<Output = bool> + Send;

    fn fetch_summary(&self, ticker: &str) -> impl Future<Output = SummaryOutcome> + Send;
}

pub fn summary_failure_message(ticker: &str) -> String {
    format!(
        "Could not fetch information for ${ticker}. The API may be unavailable or the ticker may be invalid."
    )
}

pub const MISSING_KEY_MESSAGE: &str = "API key is not configured. Please contact the administrator.";
