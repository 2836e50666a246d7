/*!
 * Matching translations back onto destination text holders.
 *
 * Binds reassembled translations (partial or final) onto caller-supplied
 * text holders using tiered exact and fuzzy matching, with an authority
 * policy deciding whether a new result may overwrite an already applied
 * one. A holder the engine cannot confidently match is left untouched and
 * reported, never written.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::config::MatcherConfig;
use crate::pipeline::reassembler::ReassembledUnit;

static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\s+").unwrap()
});

/// Longest string length still scored with edit distance in the fuzzy tier
const FUZZY_EDIT_DISTANCE_MAX_LEN: usize = 64;

/// Opaque destination for translated text.
///
/// The engine assumes nothing about holder internals beyond these two
/// operations.
pub trait TextHolder {
    /// The text currently living in the holder
    fn current_text(&self) -> String;

    /// Write translated text into the holder
    fn write(&mut self, text: &str);
}

/// Which matching tier bound a holder to a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Exact match on the full original text
    Exact,
    /// Exact match after trimming surrounding whitespace
    Trimmed,
    /// Exact match after collapsing internal whitespace runs
    CollapsedWhitespace,
    /// Exact match after removing all whitespace
    NoWhitespace,
    /// Best-scoring fuzzy candidate above the threshold
    Fuzzy,
    /// Last-resort salvage of a blank holder; low confidence
    Rescue,
}

/// Authority of an applied result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Streaming result; may be replaced by a more complete one
    Partial,
    /// Job-completed result; always replaces non-final text
    Final,
}

/// One successful holder binding from an apply pass
#[derive(Debug, Clone)]
pub struct AppliedEntry {
    /// Index of the holder in the caller's slice
    pub holder_index: usize,
    /// Index of the original unit whose translation was written
    pub original_index: usize,
    /// Tier that produced the binding
    pub tier: MatchTier,
    /// Authority of the written result
    pub authority: Authority,
}

/// Diagnostic outcome of one apply pass
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// Holders written during this pass
    pub applied: Vec<AppliedEntry>,
    /// Holders the engine could not confidently match
    pub unmatched: Vec<usize>,
}

/// Remembered binding between a holder and an original unit
#[derive(Debug, Clone)]
struct Binding {
    original_index: usize,
    tier: MatchTier,
    authority: Authority,
    text: String,
}

/// Binds reassembled translations onto destination text holders
#[derive(Debug, Default)]
pub struct MatchAndApplyEngine {
    config: MatcherConfig,
    bindings: HashMap<usize, Binding>,
}

impl MatchAndApplyEngine {
    /// Create an engine with the given matcher configuration
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            bindings: HashMap::new(),
        }
    }

    /// Apply a set of reassembled translations onto the holders.
    ///
    /// Holders already bound by a previous pass are re-evaluated under the
    /// authority policy; unbound holders go through the matching tiers in
    /// order, first hit wins. Unmatched holders are reported, not written.
    pub fn apply<H: TextHolder>(
        &mut self,
        results: &[ReassembledUnit],
        holders: &mut [H],
        authority: Authority,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        let index = TierIndex::build(results);

        for (holder_index, holder) in holders.iter_mut().enumerate() {
            if let Some(binding) = self.bindings.get_mut(&holder_index) {
                let result = results
                    .iter()
                    .find(|r| r.original_index == binding.original_index);
                if let Some(result) = result {
                    if should_replace(binding, &result.text, authority) {
                        holder.write(&result.text);
                        binding.text = result.text.clone();
                        binding.authority = authority;
                        report.applied.push(AppliedEntry {
                            holder_index,
                            original_index: binding.original_index,
                            tier: binding.tier,
                            authority,
                        });
                    }
                }
                continue;
            }

            let current = holder.current_text();
            match self.locate(&current, results, &index) {
                Some((result_pos, tier)) => {
                    let result = &results[result_pos];
                    holder.write(&result.text);
                    debug!(
                        "holder {} bound to unit {} via {:?} tier",
                        holder_index, result.original_index, tier
                    );
                    self.bindings.insert(
                        holder_index,
                        Binding {
                            original_index: result.original_index,
                            tier,
                            authority,
                            text: result.text.clone(),
                        },
                    );
                    report.applied.push(AppliedEntry {
                        holder_index,
                        original_index: result.original_index,
                        tier,
                        authority,
                    });
                }
                None => report.unmatched.push(holder_index),
            }
        }

        if self.config.rescue_blank_holders {
            self.rescue_blank_holders(results, holders, authority, &mut report);
        }

        report
    }

    /// Forget all remembered holder bindings (new document, new page)
    pub fn reset(&mut self) {
        self.bindings.clear();
    }

    /// Tiers 1-5, in order, against the holder's current text
    fn locate(
        &self,
        current: &str,
        results: &[ReassembledUnit],
        index: &TierIndex,
    ) -> Option<(usize, MatchTier)> {
        if let Some(&pos) = index.exact.get(current) {
            return Some((pos, MatchTier::Exact));
        }
        if let Some(&pos) = index.trimmed.get(current.trim()) {
            return Some((pos, MatchTier::Trimmed));
        }
        let collapsed = collapse_whitespace(current);
        if let Some(&pos) = index.collapsed.get(collapsed.as_str()) {
            return Some((pos, MatchTier::CollapsedWhitespace));
        }
        let stripped = strip_whitespace(current);
        if !stripped.is_empty() {
            if let Some(&pos) = index.stripped.get(stripped.as_str()) {
                return Some((pos, MatchTier::NoWhitespace));
            }
        }

        // Fuzzy tier: highest-scoring candidate above the threshold,
        // earliest result wins on ties.
        let mut best: Option<(usize, f64)> = None;
        for (pos, result) in results.iter().enumerate() {
            let score = fuzzy_score(current, &result.original_text);
            if score < self.config.min_fuzzy_score {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((pos, score)),
            }
        }
        best.map(|(pos, _)| (pos, MatchTier::Fuzzy))
    }

    /// Last-resort salvage: a blank, unbound holder takes the longest
    /// translation not yet assigned to any holder. Best effort only, with
    /// no correctness guarantee; always logged.
    fn rescue_blank_holders<H: TextHolder>(
        &mut self,
        results: &[ReassembledUnit],
        holders: &mut [H],
        authority: Authority,
        report: &mut ApplyReport,
    ) {
        let mut still_unmatched = Vec::new();

        for &holder_index in &report.unmatched {
            if !holders[holder_index].current_text().trim().is_empty() {
                still_unmatched.push(holder_index);
                continue;
            }

            let assigned: HashSet<usize> =
                self.bindings.values().map(|b| b.original_index).collect();
            let candidate = results
                .iter()
                .enumerate()
                .filter(|(_, r)| !assigned.contains(&r.original_index) && !r.text.trim().is_empty())
                .max_by_key(|(_, r)| r.text.chars().count());

            let Some((_, result)) = candidate else {
                still_unmatched.push(holder_index);
                continue;
            };

            warn!(
                "rescue tier: assigning longest unassigned translation (unit {}) to blank holder {}",
                result.original_index, holder_index
            );
            holders[holder_index].write(&result.text);
            self.bindings.insert(
                holder_index,
                Binding {
                    original_index: result.original_index,
                    tier: MatchTier::Rescue,
                    authority,
                    text: result.text.clone(),
                },
            );
            report.applied.push(AppliedEntry {
                holder_index,
                original_index: result.original_index,
                tier: MatchTier::Rescue,
                authority,
            });
        }

        report.unmatched = still_unmatched;
    }
}

/// Authority policy: a final result always replaces non-final text; among
/// streaming results a replacement must be substantially more complete.
fn should_replace(existing: &Binding, new_text: &str, authority: Authority) -> bool {
    if authority == Authority::Final {
        return true;
    }
    if existing.authority == Authority::Final {
        return false;
    }
    if new_text == existing.text {
        return false;
    }

    let old_len = existing.text.chars().count() as f64;
    let new_len = new_text.chars().count() as f64;
    if new_len >= old_len * 1.10 {
        return true;
    }

    let old_words = existing.text.split_whitespace().count() as f64;
    let new_words = new_text.split_whitespace().count() as f64;
    if new_words >= old_words * 1.20 && new_words > old_words {
        return true;
    }

    let old_unique = unique_chars(&existing.text) as f64;
    let new_unique = unique_chars(new_text) as f64;
    new_unique >= old_unique * 1.10 && new_unique > old_unique
}

fn unique_chars(text: &str) -> usize {
    text.chars().collect::<HashSet<char>>().len()
}

/// Precomputed lookup maps for the exact tiers, keyed on original text.
/// Earliest result wins on duplicate keys.
struct TierIndex {
    exact: HashMap<String, usize>,
    trimmed: HashMap<String, usize>,
    collapsed: HashMap<String, usize>,
    stripped: HashMap<String, usize>,
}

impl TierIndex {
    fn build(results: &[ReassembledUnit]) -> Self {
        let mut exact = HashMap::new();
        let mut trimmed = HashMap::new();
        let mut collapsed = HashMap::new();
        let mut stripped = HashMap::new();

        for (pos, result) in results.iter().enumerate() {
            let original = &result.original_text;
            exact.entry(original.clone()).or_insert(pos);
            trimmed.entry(original.trim().to_string()).or_insert(pos);
            collapsed
                .entry(collapse_whitespace(original))
                .or_insert(pos);
            let bare = strip_whitespace(original);
            if !bare.is_empty() {
                stripped.entry(bare).or_insert(pos);
            }
        }

        Self {
            exact,
            trimmed,
            collapsed,
            stripped,
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUNS.replace_all(text.trim(), " ").into_owned()
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Similarity between a holder's text and an original, in 0.0..=1.0.
///
/// Scores containment (one string fully contains the other), token
/// overlap, and, for short strings, normalized edit distance; the best of
/// the three wins.
fn fuzzy_score(a: &str, b: &str) -> f64 {
    let a_norm = collapse_whitespace(a).to_lowercase();
    let b_norm = collapse_whitespace(b).to_lowercase();
    if a_norm.is_empty() || b_norm.is_empty() {
        return 0.0;
    }
    if a_norm == b_norm {
        return 1.0;
    }

    let a_len = a_norm.chars().count();
    let b_len = b_norm.chars().count();
    let (shorter, longer) = if a_len <= b_len { (a_len, b_len) } else { (b_len, a_len) };

    let mut best: f64 = 0.0;

    if a_norm.contains(&b_norm) || b_norm.contains(&a_norm) {
        best = shorter as f64 / longer as f64;
    }

    let a_tokens: HashSet<&str> = a_norm.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b_norm.split_whitespace().collect();
    let union = a_tokens.union(&b_tokens).count();
    if union > 0 {
        let overlap = a_tokens.intersection(&b_tokens).count() as f64 / union as f64;
        best = best.max(overlap);
    }

    if longer <= FUZZY_EDIT_DISTANCE_MAX_LEN {
        let distance = levenshtein_distance(&a_norm, &b_norm);
        best = best.max(1.0 - distance as f64 / longer as f64);
    }

    best
}

/// Levenshtein distance with the two-row optimization
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr_row[0] = i;

        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };

            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}
