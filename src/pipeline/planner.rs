/*!
 * Batch planning.
 *
 * Groups expanded segments into backend-appropriate batches using one of
 * several strategies. Pure functions over segments plus strategy
 * parameters. Every strategy guarantees that the ordered concatenation of
 * batch contents exactly equals the input segment sequence.
 */

use crate::config::{BatchStrategy, BatchingConfig};
use crate::pipeline::segmenter::ExpandedSegment;

/// Smart-mode early exit: at or below this segment count, one batch
const SMART_SINGLE_BATCH_MAX_SEGMENTS: usize = 20;

/// Smart-mode early exit: below this total complexity, one batch
const SMART_SINGLE_BATCH_MAX_COMPLEXITY: u32 = 300;

/// Ordered, non-overlapping group of segment indices submitted together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Segment indices, in original order
    pub indices: Vec<usize>,
}

impl Batch {
    fn new() -> Self {
        Self { indices: Vec::new() }
    }

    /// Number of segments in the batch
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the batch holds no segments
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Heuristic cost of translating one segment.
///
/// `min(len * 0.5, 100) + sentences * 2 + min(words * 0.5, 20)`, rounded.
pub fn complexity(text: &str) -> u32 {
    if text.trim().is_empty() {
        return 0;
    }

    let len = text.chars().count() as f64;
    let words = text.split_whitespace().count() as f64;
    let terminators = text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
    let sentences = terminators.max(1) as f64;

    ((len * 0.5).min(100.0) + sentences * 2.0 + (words * 0.5).min(20.0)).round() as u32
}

/// Group segments into batches according to the configured strategy
pub fn plan(segments: &[ExpandedSegment], config: &BatchingConfig) -> Vec<Batch> {
    if segments.is_empty() {
        return Vec::new();
    }

    match config.strategy {
        BatchStrategy::Single => vec![all_in_one(segments)],
        BatchStrategy::Smart => plan_smart(segments, config.optimal_size, config.max_complexity),
        BatchStrategy::Fixed => plan_fixed(segments, config.optimal_size),
        BatchStrategy::CharacterBudget => {
            plan_character_budget(segments, config.character_budget, config.balanced)
        }
    }
}

fn all_in_one(segments: &[ExpandedSegment]) -> Batch {
    Batch {
        indices: segments.iter().map(|s| s.index).collect(),
    }
}

/// Complexity-based batching with an early exit for small inputs
fn plan_smart(segments: &[ExpandedSegment], optimal_size: usize, max_complexity: u32) -> Vec<Batch> {
    let total: u32 = segments.iter().map(|s| complexity(&s.text)).sum();
    if segments.len() <= SMART_SINGLE_BATCH_MAX_SEGMENTS || total < SMART_SINGLE_BATCH_MAX_COMPLEXITY
    {
        return vec![all_in_one(segments)];
    }

    let mut batches = Vec::new();
    let mut current = Batch::new();
    let mut current_complexity: u32 = 0;

    for seg in segments {
        let cost = complexity(&seg.text);
        let over_complexity = !current.is_empty() && current_complexity + cost > max_complexity;
        if current.len() >= optimal_size || over_complexity {
            batches.push(std::mem::replace(&mut current, Batch::new()));
            current_complexity = 0;
        }
        current.indices.push(seg.index);
        current_complexity += cost;
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Fixed-size chunking, last batch may be smaller
fn plan_fixed(segments: &[ExpandedSegment], optimal_size: usize) -> Vec<Batch> {
    segments
        .chunks(optimal_size.max(1))
        .map(|chunk| Batch {
            indices: chunk.iter().map(|s| s.index).collect(),
        })
        .collect()
}

/// Character-budget batching for destination-length-sensitive jobs.
///
/// If everything fits in one budget, one batch. Otherwise batches fill
/// while under a per-batch character target derived from the ideal batch
/// count; a segment that alone exceeds the budget is placed alone.
fn plan_character_budget(segments: &[ExpandedSegment], budget: usize, balanced: bool) -> Vec<Batch> {
    let total: usize = segments.iter().map(|s| s.text.chars().count()).sum();
    if total <= budget {
        return vec![all_in_one(segments)];
    }

    let ideal_batch_count = total.div_ceil(budget).max(1);
    let divisor = if balanced {
        (ideal_batch_count + 1).min(segments.len()).max(1)
    } else {
        ideal_batch_count
    };
    let target = total.div_ceil(divisor);

    let mut batches = Vec::new();
    let mut current = Batch::new();
    let mut current_chars: usize = 0;

    for seg in segments {
        let chars = seg.text.chars().count();

        if chars > budget {
            // Oversized segment gets a batch of its own
            if !current.is_empty() {
                batches.push(std::mem::replace(&mut current, Batch::new()));
                current_chars = 0;
            }
            batches.push(Batch { indices: vec![seg.index] });
            continue;
        }

        if !current.is_empty() && current_chars >= target {
            batches.push(std::mem::replace(&mut current, Batch::new()));
            current_chars = 0;
        }
        current.indices.push(seg.index);
        current_chars += chars;
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
