/*!
 * Pipeline configuration.
 *
 * This module handles the pipeline configuration including loading from
 * JSON and validating configuration settings. All fields carry serde
 * defaults so a partial configuration file is always usable.
 */

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Batch planning strategy, selectable per job
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BatchStrategy {
    /// All segments in one batch
    Single,
    /// Complexity-based batching with an early exit for small inputs
    #[default]
    Smart,
    /// Fixed-size batches
    Fixed,
    /// Character-budget batching for destination-length-sensitive jobs
    CharacterBudget,
}

/// Configuration for the batch planner
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchingConfig {
    /// Strategy used to group segments into batches
    #[serde(default)]
    pub strategy: BatchStrategy,

    /// Preferred number of segments per batch
    #[serde(default = "default_optimal_size")]
    pub optimal_size: usize,

    /// Maximum cumulative complexity per smart batch
    #[serde(default = "default_max_complexity")]
    pub max_complexity: u32,

    /// Character budget per batch for the character-budget strategy
    #[serde(default = "default_character_budget")]
    pub character_budget: usize,

    /// Balance character-budget batches toward flatter sizes
    #[serde(default)]
    pub balanced: bool,
}

fn default_optimal_size() -> usize {
    25
}

fn default_max_complexity() -> u32 {
    400
}

fn default_character_budget() -> usize {
    1000
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            strategy: BatchStrategy::default(),
            optimal_size: default_optimal_size(),
            max_complexity: default_max_complexity(),
            character_budget: default_character_budget(),
            balanced: false,
        }
    }
}

/// Configuration for the streaming coordinator
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoordinatorConfig {
    /// Base per-batch timeout in milliseconds
    #[serde(default = "default_batch_timeout_base_ms")]
    pub batch_timeout_base_ms: u64,

    /// Additional per-item timeout in milliseconds, scaled by batch size
    #[serde(default = "default_batch_timeout_per_item_ms")]
    pub batch_timeout_per_item_ms: u64,

    /// Per-item timeout during fallback, in milliseconds
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,

    /// Fixed delay between fallback items, in milliseconds
    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,

    /// Job-level "no progress" timeout window, in milliseconds
    #[serde(default = "default_no_progress_timeout_ms")]
    pub no_progress_timeout_ms: u64,

    /// Cooperative cancellation polling interval, in milliseconds
    #[serde(default = "default_cancel_poll_ms")]
    pub cancel_poll_ms: u64,

    /// Abort the remainder of a job on the first unrecoverable segment.
    /// When false, failed segments keep their original text and the job
    /// continues with `has_errors` set.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
}

fn default_batch_timeout_base_ms() -> u64 {
    10_000
}

fn default_batch_timeout_per_item_ms() -> u64 {
    1_000
}

fn default_item_timeout_ms() -> u64 {
    8_000
}

fn default_fallback_delay_ms() -> u64 {
    3_000
}

fn default_no_progress_timeout_ms() -> u64 {
    60_000
}

fn default_cancel_poll_ms() -> u64 {
    50
}

fn default_fail_fast() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_timeout_base_ms: default_batch_timeout_base_ms(),
            batch_timeout_per_item_ms: default_batch_timeout_per_item_ms(),
            item_timeout_ms: default_item_timeout_ms(),
            fallback_delay_ms: default_fallback_delay_ms(),
            no_progress_timeout_ms: default_no_progress_timeout_ms(),
            cancel_poll_ms: default_cancel_poll_ms(),
            fail_fast: default_fail_fast(),
        }
    }
}

/// Configuration for the match-and-apply engine
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatcherConfig {
    /// Minimum similarity score accepted by the fuzzy tier
    #[serde(default = "default_min_fuzzy_score")]
    pub min_fuzzy_score: f64,

    /// Allow the last-resort rescue tier for blank holders
    #[serde(default)]
    pub rescue_blank_holders: bool,
}

fn default_min_fuzzy_score() -> f64 {
    0.25
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_fuzzy_score: default_min_fuzzy_score(),
            rescue_blank_holders: false,
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PipelineConfig {
    /// Batch planner settings
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Streaming coordinator settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Match-and-apply engine settings
    #[serde(default)]
    pub matcher: MatcherConfig,
}

impl PipelineConfig {
    /// Load a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.batching.optimal_size == 0 {
            return Err(anyhow!("batching.optimal_size must be at least 1"));
        }
        if self.batching.character_budget == 0 {
            return Err(anyhow!("batching.character_budget must be at least 1"));
        }
        if self.coordinator.item_timeout_ms == 0 {
            return Err(anyhow!("coordinator.item_timeout_ms must be non-zero"));
        }
        if self.coordinator.cancel_poll_ms == 0 {
            return Err(anyhow!("coordinator.cancel_poll_ms must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.matcher.min_fuzzy_score) {
            return Err(anyhow!("matcher.min_fuzzy_score must be within 0.0..=1.0"));
        }
        Ok(())
    }
}
