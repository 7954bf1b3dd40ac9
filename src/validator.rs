use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::oracle::MarketOracle;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerStatus {
    Idle,
    Pending(String),
    Validating(String),
    Valid(String),
    Invalid(String),
}

impl TickerStatus {
    pub fn ticker(&self) -> Option<&str> {
        match self {
            TickerStatus::Idle => None,
            TickerStatus::Pending(t)
            | TickerStatus::Validating(t)
            | TickerStatus::Valid(t)
            | TickerStatus::Invalid(t) => Some(t),
        }
    }

    pub fn is_valid_for(&self, ticker: &str) -> bool {
        matches!(self, TickerStatus::Valid(t) if t == ticker)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, TickerStatus::Pending(_) | TickerStatus::Validating(_))
    }

    pub fn message(&self) -> String {
        match self {
            TickerStatus::Idle => "This field is required.".to_string(),
            TickerStatus::Pending(t) | TickerStatus::Validating(t) => {
                format!("Validating ticker {t}...")
            }
            TickerStatus::Valid(t) => format!("Ticker {t} is valid."),
            TickerStatus::Invalid(t) => format!("{t} is not a valid US stock ticker."),
        }
    }
}

pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Nothing,
    Disarm,
    Arm { generation: u64, ticker: String },
}

/// Debounce state of one ticker input field.
///
/// Every effective edit bumps `generation`; a timer only fires into a request
/// if it was armed for the current generation. Responses are matched by
/// ticker, so one that arrives for a value the user has since left is
/// dropped. At most one request per ticker is outstanding at a time.
#[derive(Debug, Clone)]
pub struct TickerMachine {
    current: String,
    generation: u64,
    status: TickerStatus,
    in_flight: HashSet<String>,
    last_validated: Option<(String, bool)>,
}

impl Default for TickerMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TickerMachine {
    pub fn new() -> Self {
        Self {
            current: String::new(),
            generation: 0,
            status: TickerStatus::Idle,
            in_flight: HashSet::new(),
            last_validated: None,
        }
    }

    pub fn status(&self) -> &TickerStatus {
        &self.status
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn input(&mut self, raw: &str) -> Effect {
        let ticker = normalize_ticker(raw);
        if ticker == self.current {
            return Effect::Nothing;
        }
        self.current = ticker;
        self.generation += 1;

        if self.current.is_empty() {
            self.last_validated = None;
            self.status = TickerStatus::Idle;
            return Effect::Disarm;
        }

        if let Some((cached, valid)) = &self.last_validated {
            if *cached == self.current {
                self.status = verdict(&self.current, *valid);
                return Effect::Disarm;
            }
        }

        if self.in_flight.contains(&self.current) {
            self.status = TickerStatus::Validating(self.current.clone());
            return Effect::Disarm;
        }

        self.status = TickerStatus::Pending(self.current.clone());
        Effect::Arm {
            generation: self.generation,
            ticker: self.current.clone(),
        }
    }

    /// Returns the ticker to send to the oracle, or `None` if the timer was
    /// superseded by a later edit.
    pub fn timer_fired(&mut self, generation: u64) -> Option<String> {
        if generation != self.generation || !matches!(self.status, TickerStatus::Pending(_)) {
            return None;
        }
        self.status = TickerStatus::Validating(self.current.clone());
        self.in_flight.insert(self.current.clone());
        Some(self.current.clone())
    }

    /// Applies an oracle verdict. Returns `false` if it was stale.
    pub fn resolved(&mut self, ticker: &str, valid: bool) -> bool {
        self.in_flight.remove(ticker);
        if ticker != self.current {
            return false;
        }
        self.last_validated = Some((ticker.to_string(), valid));
        self.status = verdict(ticker, valid);
        true
    }
}

fn verdict(ticker: &str, valid: bool) -> TickerStatus {
    if valid {
        TickerStatus::Valid(ticker.to_string())
    } else {
        TickerStatus::Invalid(ticker.to_string())
    }
}

/// Handle to a running validator task. Dropping every handle stops the task.
#[derive(Clone)]
pub struct TickerValidator {
    edits: mpsc::UnboundedSender<String>,
    status: watch::Receiver<TickerStatus>,
}

impl TickerValidator {
    pub fn spawn<O>(oracle: Arc<O>, quiet_period: Duration) -> Self
    where
        O: MarketOracle + 'static,
    {
        let (edits, edit_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(TickerStatus::Idle);
        tokio::spawn(drive(oracle, quiet_period, edit_rx, status_tx));
        Self { edits, status }
    }

    pub fn edit(&self, raw: impl Into<String>) {
        if self.edits.send(raw.into()).is_err() {
            tracing::warn!("ticker validator task has stopped; edit ignored");
        }
    }

    pub fn status(&self) -> TickerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TickerStatus> {
        self.status.clone()
    }
}

async fn drive<O>(
    oracle: Arc<O>,
    quiet_period: Duration,
    mut edits: mpsc::UnboundedReceiver<String>,
    status: watch::Sender<TickerStatus>,
) where
    O: MarketOracle + 'static,
{
    let mut machine = TickerMachine::new();
    let mut armed: Option<(u64, Instant)> = None;
    let (verdict_tx, mut verdicts) = mpsc::unbounded_channel::<(String, bool)>();

    loop {
        let deadline = armed.map_or_else(Instant::now, |(_, at)| at);
        tokio::select! {
            edit = edits.recv() => {
                let Some(raw) = edit else { break };
                match machine.input(&raw) {
                    Effect::Nothing => {}
                    Effect::Disarm => armed = None,
                    Effect::Arm { generation, ticker } => {
                        tracing::trace!(%ticker, generation, "armed quiet-period timer");
                        armed = Some((generation, Instant::now() + quiet_period));
                    }
                }
            }
            () = tokio::time::sleep_until(deadline), if armed.is_some() => {
                let Some((generation, _)) = armed.take() else { continue };
                if let Some(ticker) = machine.timer_fired(generation) {
                    tracing::debug!(%ticker, "validating ticker");
                    let oracle = oracle.clone();
                    let verdict_tx = verdict_tx.clone();
                    tokio::spawn(async move {
                        let valid = oracle.validate_ticker(&ticker).await;
                        let _ = verdict_tx.send((ticker, valid));
                    });
                }
            }
            Some((ticker, valid)) = verdicts.recv() => {
                if !machine.resolved(&ticker, valid) {
                    tracing::debug!(%ticker, valid, "discarded stale ticker verdict");
                }
            }
        }
        status.send_if_modified(|current| {
            if current == machine.status() {
                return false;
            }
            *current = machine.status().clone();
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm_generation(effect: Effect) -> u64 {
        match effect {
            Effect::Arm { generation, .. } => generation,
            other => panic!("expected Arm, got {other:?}"),
        }
    }

    #[test]
    fn rapid_edits_leave_only_the_last_timer_live() {
        let mut m = TickerMachine::new();
        let gens: Vec<u64> = ["a", "aa", "aap", "aapl"]
            .into_iter()
            .map(|s| arm_generation(m.input(s)))
            .collect();
        for g in &gens[..3] {
            assert_eq!(m.timer_fired(*g), None);
        }
        assert_eq!(m.timer_fired(gens[3]).as_deref(), Some("AAPL"));
        assert_eq!(m.status(), &TickerStatus::Validating("AAPL".to_string()));
    }

    #[test]
    fn whitespace_and_case_changes_are_not_edits() {
        let mut m = TickerMachine::new();
        arm_generation(m.input("aapl"));
        assert_eq!(m.input("  AAPL "), Effect::Nothing);
    }

    #[test]
    fn clearing_resets_to_idle_and_forgets() {
        let mut m = TickerMachine::new();
        let g = arm_generation(m.input("AAPL"));
        m.timer_fired(g);
        assert!(m.resolved("AAPL", true));
        assert_eq!(m.input(""), Effect::Disarm);
        assert_eq!(m.status(), &TickerStatus::Idle);
        // Forgotten, so the same value is validated again.
        arm_generation(m.input("AAPL"));
    }

    #[test]
    fn returning_to_last_validated_reuses_the_verdict() {
        let mut m = TickerMachine::new();
        let g = arm_generation(m.input("ZZZZZ"));
        m.timer_fired(g);
        m.resolved("ZZZZZ", false);
        arm_generation(m.input("ZZZZ"));
        assert_eq!(m.input("ZZZZZ"), Effect::Disarm);
        assert_eq!(m.status(), &TickerStatus::Invalid("ZZZZZ".to_string()));
    }

    #[test]
    fn stale_verdicts_are_dropped() {
        let mut m = TickerMachine::new();
        let g = arm_generation(m.input("AAPL"));
        m.timer_fired(g);
        arm_generation(m.input("MSFT"));
        assert!(!m.resolved("AAPL", true));
        assert_eq!(m.status(), &TickerStatus::Pending("MSFT".to_string()));
    }

    #[test]
    fn returning_to_an_in_flight_value_waits_for_it() {
        let mut m = TickerMachine::new();
        let g = arm_generation(m.input("AAPL"));
        m.timer_fired(g);
        arm_generation(m.input("AAPLX"));
        assert_eq!(m.input("AAPL"), Effect::Disarm);
        assert_eq!(m.status(), &TickerStatus::Validating("AAPL".to_string()));
        assert!(m.resolved("AAPL", true));
        assert!(m.status().is_valid_for("AAPL"));
    }

    #[test]
    fn each_in_flight_ticker_is_requested_once() {
        let mut m = TickerMachine::new();
        let g = arm_generation(m.input("AAPL"));
        assert_eq!(m.timer_fired(g).as_deref(), Some("AAPL"));
        let g = arm_generation(m.input("MSFT"));
        assert_eq!(m.timer_fired(g).as_deref(), Some("MSFT"));

        // Both requests are still running.
        assert_eq!(m.input("AAPL"), Effect::Disarm);
        assert_eq!(m.status(), &TickerStatus::Validating("AAPL".to_string()));
        assert!(!m.resolved("MSFT", true));
        assert!(m.resolved("AAPL", false));
        assert_eq!(m.status(), &TickerStatus::Invalid("AAPL".to_string()));

        // Once answered, MSFT is no longer in flight and is asked again.
        arm_generation(m.input("MSFT"));
    }

    #[test]
    fn messages() {
        assert_eq!(TickerStatus::Idle.message(), "This field is required.");
        assert!(
            TickerStatus::Invalid("ZZZZZ".to_string())
                .message()
                .contains("not a valid")
        );
    }
}
