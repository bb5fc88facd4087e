//! Per-topic exponential backoff with a hard ceiling.
//!
//! Callers name the operation they are retrying (a "topic"), which scopes the
//! backoff state: a whole batch download, or one symbol's fundamentals fetch.
//! Each failure waits the topic's current delay and doubles it for next time.
//! Once the delay has reached the ceiling the next failure returns
//! [`BackoffLimitExceeded`], which stage runners treat as fatal.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Tunables for a [`BackoffTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay waited after the first failure of a topic.
    pub initial: Duration,
    /// Once the delay reaches this value, the next failure gives up.
    pub ceiling: Duration,
    /// Growth factor applied after each wait.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            ceiling: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

/// A topic kept failing until its delay reached the ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backoff limit exceeded for '{topic}' after {attempts} attempts (ceiling {ceiling:?})")]
pub struct BackoffLimitExceeded {
    pub topic: String,
    pub attempts: u32,
    pub ceiling: Duration,
}

#[derive(Debug, Clone, Copy)]
struct TopicState {
    delay: Duration,
    attempts: u32,
}

/// Snapshot of one topic's backoff state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicStats {
    pub topic: String,
    pub attempts: u32,
    /// Delay the next failure would wait.
    pub next_delay: Duration,
}

/// Tracks backoff state for any number of topics.
///
/// One tracker is built per pipeline run and shared by reference, so state
/// never leaks between runs.
#[derive(Debug)]
pub struct BackoffTracker {
    config: BackoffConfig,
    topics: Mutex<HashMap<String, TopicState>>,
}

impl BackoffTracker {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            topics: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Record a failure on `topic`: wait the current delay and grow it.
    ///
    /// Returns the delay that was waited, or [`BackoffLimitExceeded`] without
    /// waiting when the delay has already reached the ceiling.
    pub fn record_failure(&self, topic: &str) -> Result<Duration, BackoffLimitExceeded> {
        let delay = {
            let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
            let state = topics.entry(topic.to_string()).or_insert(TopicState {
                delay: self.config.initial,
                attempts: 0,
            });
            state.attempts += 1;

            if state.delay >= self.config.ceiling {
                return Err(BackoffLimitExceeded {
                    topic: topic.to_string(),
                    attempts: state.attempts,
                    ceiling: self.config.ceiling,
                });
            }

            let waited = state.delay;
            state.delay = waited.mul_f64(self.config.multiplier).min(self.config.ceiling);
            waited
        };

        tracing::warn!(topic, delay_ms = delay.as_millis() as u64, "backing off");
        std::thread::sleep(delay);
        Ok(delay)
    }

    /// Clear `topic`'s state after a successful attempt.
    pub fn record_success(&self, topic: &str) {
        let removed = self
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic);
        if let Some(state) = removed {
            tracing::debug!(topic, attempts = state.attempts, "backoff cleared");
        }
    }

    /// Clear one topic, or every topic when `topic` is `None`.
    pub fn reset(&self, topic: Option<&str>) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        match topic {
            Some(t) => {
                topics.remove(t);
            }
            None => topics.clear(),
        }
    }

    /// Delay the next failure on `topic` would wait, if the topic is backing off.
    pub fn current_delay(&self, topic: &str) -> Option<Duration> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(|s| s.delay)
    }

    /// All topics currently backing off, sorted by name.
    pub fn stats(&self) -> Vec<TopicStats> {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stats: Vec<TopicStats> = topics
            .iter()
            .map(|(topic, s)| TopicStats {
                topic: topic.clone(),
                attempts: s.attempts,
                next_delay: s.delay,
            })
            .collect();
        stats.sort_by(|a, b| a.topic.cmp(&b.topic));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> BackoffTracker {
        BackoffTracker::new(BackoffConfig {
            initial: Duration::from_millis(1),
            ceiling: Duration::from_millis(8),
            multiplier: 2.0,
        })
    }

    #[test]
    fn doubles_until_ceiling_then_fails() {
        let t = fast();
        assert_eq!(t.record_failure("x").unwrap(), Duration::from_millis(1));
        assert_eq!(t.record_failure("x").unwrap(), Duration::from_millis(2));
        assert_eq!(t.record_failure("x").unwrap(), Duration::from_millis(4));
        assert_eq!(t.current_delay("x"), Some(Duration::from_millis(8)));

        let err = t.record_failure("x").unwrap_err();
        assert_eq!(err.topic, "x");
        assert_eq!(err.attempts, 4);
        assert_eq!(err.ceiling, Duration::from_millis(8));

        // Stays exhausted until a success clears it
        assert!(t.record_failure("x").is_err());
    }

    #[test]
    fn success_resets_to_initial() {
        let t = fast();
        t.record_failure("x").unwrap();
        t.record_failure("x").unwrap();
        t.record_success("x");
        assert_eq!(t.current_delay("x"), None);
        assert_eq!(t.record_failure("x").unwrap(), Duration::from_millis(1));
    }

    #[test]
    fn topics_are_independent() {
        let t = fast();
        t.record_failure("a").unwrap();
        t.record_failure("a").unwrap();
        assert_eq!(t.record_failure("b").unwrap(), Duration::from_millis(1));

        let stats = t.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].topic, "a");
        assert_eq!(stats[0].attempts, 2);
        assert_eq!(stats[0].next_delay, Duration::from_millis(4));
    }

    #[test]
    fn growth_is_capped_at_ceiling() {
        let t = BackoffTracker::new(BackoffConfig {
            initial: Duration::from_millis(3),
            ceiling: Duration::from_millis(5),
            multiplier: 2.0,
        });
        assert_eq!(t.record_failure("x").unwrap(), Duration::from_millis(3));
        assert_eq!(t.current_delay("x"), Some(Duration::from_millis(5)));
        assert!(t.record_failure("x").is_err());
    }

    #[test]
    fn reset_one_or_all() {
        let t = fast();
        t.record_failure("a").unwrap();
        t.record_failure("b").unwrap();
        t.reset(Some("a"));
        assert_eq!(t.stats().len(), 1);
        t.reset(None);
        assert!(t.stats().is_empty());
    }

    #[test]
    fn success_on_unknown_topic_is_noop() {
        let t = fast();
        t.record_success("never-failed");
        assert!(t.stats().is_empty());
    }
}
