use crate::error::BoardError;
use crate::validator::{TickerStatus, normalize_ticker};

/// Unsubmitted state of the "new topic" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicDraft {
    pub title: String,
    pub content: String,
    pub ticker: String,
}

/// A topic that passed the form gate. Only [`TopicDraft::submit`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTopic {
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) ticker: String,
}

impl NewTopic {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }
}

impl TopicDraft {
    pub fn can_submit(&self, status: &TickerStatus) -> bool {
        self.submit(status).is_ok()
    }

    pub fn submit(&self, status: &TickerStatus) -> Result<NewTopic, BoardError> {
        let ticker = normalize_ticker(&self.ticker);
        if ticker.is_empty() {
            return Err(BoardError::BlankField("ticker"));
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Err(BoardError::BlankField("title"));
        }
        let content = self.content.trim();
        if content.is_empty() {
            return Err(BoardError::BlankField("content"));
        }
        if !status.is_valid_for(&ticker) {
            return Err(BoardError::TickerNotValidated(ticker));
        }
        Ok(NewTopic {
            title: title.to_string(),
            content: content.to_string(),
            ticker,
        })
    }
}
