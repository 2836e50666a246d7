/*!
 * Text segmentation.
 *
 * Splits a sequence of original text units into atomic segments suitable
 * for backend submission, recording how to put them back together. Pure
 * functions, no I/O.
 */

use crate::errors::ValidationError;

/// One user-supplied text unit, immutable for the lifetime of a job.
///
/// `raw_text` may contain internal line breaks representing paragraphs
/// and empty lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalUnit {
    /// Position of the unit in the translation request
    pub index: usize,
    /// The unit's text as supplied by the caller
    pub raw_text: String,
}

impl OriginalUnit {
    /// Create a new original unit
    pub fn new(index: usize, raw_text: impl Into<String>) -> Self {
        Self {
            index,
            raw_text: raw_text.into(),
        }
    }
}

/// Smallest atomic unit of text sent to a translation backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedSegment {
    /// Global segment index, contiguous across all units
    pub index: usize,
    /// Segment text; empty placeholder for empty-line segments
    pub text: String,
    /// Index of the unit this segment came from
    pub original_index: usize,
    /// Whether this segment stands for an internal blank line
    pub is_empty_line: bool,
}

impl ExpandedSegment {
    /// Whether this segment carries text worth sending to a backend
    pub fn is_translatable(&self) -> bool {
        !self.is_empty_line && !self.text.trim().is_empty()
    }
}

/// Segments plus the origin map needed for reassembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    /// The original units, in request order
    pub units: Vec<OriginalUnit>,
    /// Expanded segments, in unit order then line order
    pub segments: Vec<ExpandedSegment>,
    /// Per-unit flag: raw text contained internal line breaks
    pub multiline: Vec<bool>,
}

impl Segmentation {
    /// Number of segments that will actually reach a backend
    pub fn translatable_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_translatable()).count()
    }
}

/// Split original units into expanded segments.
///
/// A unit without internal line breaks maps to exactly one segment. A unit
/// with line breaks yields one segment per line; blank lines become
/// empty-line segments carrying an empty placeholder so batch payloads
/// never submit empty strings to backends.
pub fn segment(units: &[OriginalUnit]) -> Result<Segmentation, ValidationError> {
    if units.is_empty() {
        return Err(ValidationError::NoUnits);
    }

    for (position, unit) in units.iter().enumerate() {
        if unit.index != position {
            return Err(ValidationError::IndexMismatch {
                position,
                index: unit.index,
            });
        }
    }

    let mut segments = Vec::with_capacity(units.len());
    let mut multiline = Vec::with_capacity(units.len());

    for unit in units {
        if !unit.raw_text.contains('\n') {
            multiline.push(false);
            segments.push(ExpandedSegment {
                index: segments.len(),
                text: unit.raw_text.clone(),
                original_index: unit.index,
                is_empty_line: false,
            });
            continue;
        }

        multiline.push(true);
        for line in unit.raw_text.split('\n') {
            let is_empty_line = line.trim().is_empty();
            segments.push(ExpandedSegment {
                index: segments.len(),
                text: if is_empty_line { String::new() } else { line.to_string() },
                original_index: unit.index,
                is_empty_line,
            });
        }
    }

    Ok(Segmentation {
        units: units.to_vec(),
        segments,
        multiline,
    })
}
