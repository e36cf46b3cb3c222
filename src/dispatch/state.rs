//! Failover state carried across relay attempts.
//!
//! # Transitions
//! ```text
//! start            host = cached host (level 0) | none (level 1)
//! --error          raw_info = none, level = 0, host = none   → retry
//! --switched       raw_info = relay's, level += 1, host = none → retry
//! anything else                                              → finish
//! attempts == max_retry                                      → exhausted
//! ```

use crate::protocol::{fields, HeaderList};

/// What a relay response asks the dispatcher to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelaySignal {
    /// The relay failed to serve the request.
    Error(String),
    /// The relay rerouted internally and wants a higher level.
    Switched { raw_info: Option<String> },
    /// A usable response.
    Resolved,
}

impl RelaySignal {
    pub fn classify(headers: &HeaderList) -> Self {
        if let Some(message) = headers.get(fields::ERROR).filter(|m| !m.is_empty()) {
            return Self::Error(message.to_string());
        }
        if headers.has(fields::SWITCHED) {
            let raw_info = headers
                .get(fields::RAW_INFO)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            return Self::Switched { raw_info };
        }
        Self::Resolved
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::Switched { .. } => "switched",
            Self::Resolved => "ok",
        }
    }
}

/// Outcome of applying a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Retry,
    Finish,
}

/// Loop-carried dispatch state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchState {
    host: Option<String>,
    level: u32,
    raw_info: Option<String>,
    attempts: u32,
    max_retry: u32,
}

impl DispatchState {
    /// Start a chain; a cached host begins at level 0, anything else at 1.
    pub fn new(cached_host: Option<String>, max_retry: u32) -> Self {
        let level = if cached_host.is_some() { 0 } else { 1 };
        Self {
            host: cached_host,
            level,
            raw_info: None,
            attempts: 0,
            max_retry,
        }
    }

    /// Count an attempt. `false` once the retry bound is reached.
    pub fn next_attempt(&mut self) -> bool {
        if self.attempts >= self.max_retry {
            return false;
        }
        self.attempts += 1;
        true
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn select_host(&mut self, host: String) {
        self.host = Some(host);
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Routing metadata to send as `--raw-info`.
    pub fn raw_info(&self) -> Option<&str> {
        self.raw_info.as_deref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn apply(&mut self, signal: RelaySignal) -> Step {
        match signal {
            RelaySignal::Error(_) => {
                self.raw_info = None;
                self.level = 0;
                self.host = None;
                Step::Retry
            }
            RelaySignal::Switched { raw_info } => {
                self.raw_info = raw_info;
                self.level += 1;
                self.host = None;
                Step::Retry
            }
            RelaySignal::Resolved => Step::Finish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderList {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            RelaySignal::classify(&headers(&[("--error", "upstream down")])),
            RelaySignal::Error("upstream down".into())
        );
        assert_eq!(
            RelaySignal::classify(&headers(&[("--switched", "1"), ("--raw-info", "abc")])),
            RelaySignal::Switched { raw_info: Some("abc".into()) }
        );
        assert_eq!(
            RelaySignal::classify(&headers(&[("--switched", "1")])),
            RelaySignal::Switched { raw_info: None }
        );
        assert_eq!(RelaySignal::classify(&headers(&[("content-type", "a")])), RelaySignal::Resolved);
        assert_eq!(RelaySignal::classify(&headers(&[("--error", "")])), RelaySignal::Resolved);
    }

    #[test]
    fn test_error_wins_over_switched() {
        let h = headers(&[("--switched", "1"), ("--error", "boom")]);
        assert!(matches!(RelaySignal::classify(&h), RelaySignal::Error(_)));
    }

    #[test]
    fn test_initial_level() {
        assert_eq!(DispatchState::new(None, 5).level(), 1);
        let cached = DispatchState::new(Some("node-1".into()), 5);
        assert_eq!(cached.level(), 0);
        assert_eq!(cached.host(), Some("node-1"));
    }

    #[test]
    fn test_error_resets() {
        let mut state = DispatchState::new(None, 5);
        state.select_host("node-1".into());
        state.apply(RelaySignal::Switched { raw_info: Some("r".into()) });
        state.select_host("node-2".into());

        assert_eq!(state.apply(RelaySignal::Error("x".into())), Step::Retry);
        assert_eq!(state.level(), 0);
        assert_eq!(state.host(), None);
        assert_eq!(state.raw_info(), None);
    }

    #[test]
    fn test_switched_escalates() {
        let mut state = DispatchState::new(Some("node-1".into()), 5);
        assert_eq!(state.apply(RelaySignal::Switched { raw_info: Some("r1".into()) }), Step::Retry);
        assert_eq!(state.level(), 1);
        assert_eq!(state.host(), None);
        assert_eq!(state.raw_info(), Some("r1"));

        state.apply(RelaySignal::Switched { raw_info: None });
        assert_eq!(state.level(), 2);
        assert_eq!(state.raw_info(), None);
    }

    #[test]
    fn test_resolved_keeps_host() {
        let mut state = DispatchState::new(None, 5);
        state.select_host("node-1".into());
        assert_eq!(state.apply(RelaySignal::Resolved), Step::Finish);
        assert_eq!(state.host(), Some("node-1"));
    }

    #[test]
    fn test_retry_bound() {
        let mut state = DispatchState::new(None, 3);
        let mut runs = 0;
        while state.next_attempt() {
            runs += 1;
            state.apply(RelaySignal::Error("x".into()));
        }
        assert_eq!(runs, 3);
        assert_eq!(state.attempts(), 3);
    }
}
