use std::collections::HashMap;

use crate::oracle::SummaryOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Loading,
    Ready(String),
    Failed(String),
}

/// AI summary panels keyed by ticker. A failure only ever lands in the panel
/// of the ticker it belongs to.
#[derive(Debug, Default)]
pub struct SummaryPanels {
    panels: HashMap<String, PanelState>,
}

impl SummaryPanels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `ticker` as loading. Returns `false` when a fetch is already
    /// running or a summary is already shown; failed panels may retry.
    pub fn begin(&mut self, ticker: &str) -> bool {
        match self.panels.get(ticker) {
            Some(PanelState::Loading | PanelState::Ready(_)) => false,
            Some(PanelState::Failed(_)) | None => {
                self.panels.insert(ticker.to_string(), PanelState::Loading);
                true
            }
        }
    }

    pub fn finish(&mut self, ticker: &str, outcome: SummaryOutcome) {
        let state = match outcome {
            SummaryOutcome::Summary(text) => PanelState::Ready(text),
            SummaryOutcome::Failed(message) => PanelState::Failed(message),
        };
        self.panels.insert(ticker.to_string(), state);
    }

    pub fn get(&self, ticker: &str) -> Option<&PanelState> {
        self.panels.get(ticker)
    }
}
