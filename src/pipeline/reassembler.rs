/*!
 * Reassembly of per-segment translations.
 *
 * Converts a completed (or still-partial) set of per-segment translations
 * back into per-original-unit text, restoring line structure. Valid on
 * partial inputs so streaming application can run before job completion.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::pipeline::segmenter::Segmentation;

/// Runs of three or more line breaks collapse to a paragraph break
static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\n{3,}").unwrap()
});

/// One original unit's reassembled translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledUnit {
    /// Index of the original unit
    pub original_index: usize,
    /// The unit's original raw text
    pub original_text: String,
    /// Reassembled text: translations where present, originals otherwise
    pub text: String,
    /// True when every translatable segment of the unit had a translation
    pub complete: bool,
}

/// Reassemble per-unit translations from per-segment results.
///
/// Walks the expanded segments in order. Each segment emits its translation
/// if present, else its original text; empty-line segments always emit a
/// blank line. Segments of a multiline unit are rejoined with line breaks
/// mirroring the original paragraph breaks, then runs of three or more
/// consecutive line breaks collapse to exactly two.
pub fn reassemble(
    segmentation: &Segmentation,
    translations: &HashMap<usize, String>,
) -> Vec<ReassembledUnit> {
    let mut out: Vec<ReassembledUnit> = segmentation
        .units
        .iter()
        .map(|unit| ReassembledUnit {
            original_index: unit.index,
            original_text: unit.raw_text.clone(),
            text: String::new(),
            complete: true,
        })
        .collect();

    let mut pieces: Vec<Vec<String>> = vec![Vec::new(); segmentation.units.len()];

    for seg in &segmentation.segments {
        let unit = &mut out[seg.original_index];
        if seg.is_empty_line {
            pieces[seg.original_index].push(String::new());
            continue;
        }
        match translations.get(&seg.index) {
            Some(translated) => pieces[seg.original_index].push(translated.clone()),
            None => {
                if seg.is_translatable() {
                    unit.complete = false;
                }
                pieces[seg.original_index].push(seg.text.clone());
            }
        }
    }

    for (unit_index, unit) in out.iter_mut().enumerate() {
        let joined = if segmentation.multiline[unit_index] {
            pieces[unit_index].join("\n")
        } else {
            pieces[unit_index].concat()
        };
        unit.text = EXCESS_BLANK_LINES.replace_all(&joined, "\n\n").into_owned();
    }

    out
}
