use crate::cli::Args;
use crate::config::replies::{ self, Intent, RepliesError, ReplyRule, ReplyTable };

use log::{ debug, info };
use rand::Rng;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Number of quick actions offered before the user has said anything.
pub const QUICK_ACTIONS_SHOWN: usize = 4;

/// Uniform range the simulated "typing" pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingDelay {
    min: Duration,
    max: Duration,
}

impl TypingDelay {
    pub fn new(min: Duration, max: Duration) -> Result<Self, String> {
        if min > max {
            return Err(
                format!(
                    "Typing delay minimum ({} ms) exceeds maximum ({} ms)",
                    min.as_millis(),
                    max.as_millis()
                )
            );
        }
        Ok(Self { min, max })
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Result<Self, String> {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub fn none() -> Self {
        Self { min: Duration::ZERO, max: Duration::ZERO }
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let (lo, hi) = (self.min.as_millis() as u64, self.max.as_millis() as u64);
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

impl Default for TypingDelay {
    fn default() -> Self {
        Self { min: Duration::from_millis(1000), max: Duration::from_millis(2000) }
    }
}

/// The rule-based reply engine plus the knobs the chat widget needs.
#[derive(Clone)]
pub struct Assistant {
    table: Arc<ReplyTable>,
    replies_path: Option<PathBuf>,
    typing_delay: TypingDelay,
}

impl Assistant {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let typing_delay = TypingDelay::from_millis(
            args.typing_delay_min_ms,
            args.typing_delay_max_ms
        )?;
        let replies_path = args.replies_path.clone().map(PathBuf::from);
        let table = match &replies_path {
            Some(path) => {
                let table = replies::load_replies(path)?;
                info!("Loaded {} reply rules from {}", table.rules.len(), path.display());
                table
            }
            None => {
                info!("Using built-in reply table");
                replies::default_table()
            }
        };

        Ok(Self { table, replies_path, typing_delay })
    }

    pub fn with_table(table: Arc<ReplyTable>, typing_delay: TypingDelay) -> Self {
        Self { table, replies_path: None, typing_delay }
    }

    pub fn typing_delay(&self) -> TypingDelay {
        self.typing_delay
    }

    pub fn greeting(&self) -> &str {
        &self.table.greeting
    }

    pub fn quick_actions(&self) -> &[String] {
        let shown = self.table.quick_actions.len().min(QUICK_ACTIONS_SHOWN);
        &self.table.quick_actions[..shown]
    }

    fn matching_rule(&self, utterance: &str) -> Option<&ReplyRule> {
        let normalized = utterance.to_lowercase();
        self.table.rules.iter().find(|rule| rule.matches(&normalized))
    }

    /// Which rule the utterance falls under. Total: anything that matches
    /// no keyword is `Intent::Fallback`.
    pub fn classify(&self, utterance: &str) -> Intent {
        self.matching_rule(utterance)
            .map(|rule| rule.intent)
            .unwrap_or(Intent::Fallback)
    }

    pub fn reply(&self, utterance: &str) -> &str {
        let (intent, response) = match self.matching_rule(utterance) {
            Some(rule) => (rule.intent, rule.response.as_str()),
            None => (Intent::Fallback, self.table.fallback.as_str()),
        };
        debug!("Reply intent '{}' for utterance {:?}", intent, utterance);
        response
    }

    /// Returns `Ok(true)` when a newer replies file replaced the table.
    pub fn reload_replies_if_changed(&mut self) -> Result<bool, RepliesError> {
        let Some(path) = &self.replies_path else {
            return Ok(false);
        };
        match replies::reload_replies_if_changed(path, &self.table)? {
            Some(table) => {
                info!("Reply table reloaded: {} rules", table.rules.len());
                self.table = table;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
