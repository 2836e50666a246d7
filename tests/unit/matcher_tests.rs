/*!
 * Tests for the match-and-apply engine's tiers and authority policy
 */

use streamlate::{Authority, MatchAndApplyEngine, MatchTier, MatcherConfig, ReassembledUnit, TextHolder};

use crate::common::TestHolder;

fn unit(index: usize, original: &str, translated: &str) -> ReassembledUnit {
    ReassembledUnit {
        original_index: index,
        original_text: original.to_string(),
        text: translated.to_string(),
        complete: true,
    }
}

#[test]
fn test_apply_streamingThenFinal_shouldLeaveFinalText() {
    let mut engine = MatchAndApplyEngine::default();
    let mut holders = vec![TestHolder::new("Hello")];

    engine.apply(&[unit(0, "Hello", "He")], &mut holders, Authority::Partial);
    assert_eq!(holders[0].current_text(), "He");

    engine.apply(&[unit(0, "Hello", "Hello")], &mut holders, Authority::Final);
    assert_eq!(holders[0].current_text(), "Hello");
}

#[test]
fn test_apply_paddedHolderText_shouldUseTrimmedTierNotFuzzy() {
    let mut engine = MatchAndApplyEngine::default();
    let mut holders = vec![TestHolder::new(" Hello ")];

    let report = engine.apply(&[unit(0, "Hello", "Bonjour")], &mut holders, Authority::Final);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].tier, MatchTier::Trimmed);
    assert_eq!(holders[0].current_text(), "Bonjour");
}

#[test]
fn test_apply_multipleHolders_shouldBindEachInDocumentOrder() {
    let mut engine = MatchAndApplyEngine::default();
    let results = vec![
        unit(0, "First sentence here.", "Premiere phrase ici."),
        unit(1, "Second sentence here.", "Deuxieme phrase ici."),
    ];
    let mut holders = vec![
        TestHolder::new("First sentence here."),
        TestHolder::new("Second sentence here."),
    ];

    let report = engine.apply(&results, &mut holders, Authority::Final);
    assert_eq!(report.applied.len(), 2);
    assert_eq!(holders[0].current_text(), "Premiere phrase ici.");
    assert_eq!(holders[1].current_text(), "Deuxieme phrase ici.");
}

#[test]
fn test_apply_growingStreamingResults_shouldReplaceOnlyWhenSubstantiallyLonger() {
    let mut engine = MatchAndApplyEngine::default();
    let mut holders = vec![TestHolder::new("Greeting")];

    engine.apply(
        &[unit(0, "Greeting", "Bonjour tout le monde")],
        &mut holders,
        Authority::Partial,
    );
    // A marginally different streaming result does not win
    engine.apply(
        &[unit(0, "Greeting", "Bonjour tout le monde!")],
        &mut holders,
        Authority::Partial,
    );
    assert_eq!(holders[0].current_text(), "Bonjour tout le monde");

    // A substantially longer one does
    engine.apply(
        &[unit(0, "Greeting", "Bonjour tout le monde, mes amis")],
        &mut holders,
        Authority::Partial,
    );
    assert_eq!(holders[0].current_text(), "Bonjour tout le monde, mes amis");
}

#[test]
fn test_apply_unmatchableHolder_shouldBeReportedNotWritten() {
    let mut engine = MatchAndApplyEngine::default();
    let mut holders = vec![TestHolder::new("No translation exists for this text 987")];

    let report = engine.apply(&[unit(0, "Hello", "Bonjour")], &mut holders, Authority::Final);
    assert_eq!(report.unmatched, vec![0]);
    assert_eq!(holders[0].current_text(), "No translation exists for this text 987");
}

#[test]
fn test_apply_rescueEnabled_shouldSalvageBlankHolderWithLongestTranslation() {
    let mut engine = MatchAndApplyEngine::new(MatcherConfig {
        rescue_blank_holders: true,
        ..MatcherConfig::default()
    });
    let results = vec![
        unit(0, "Hi", "Salut"),
        unit(1, "The long paragraph", "Le long paragraphe traduit"),
    ];
    let mut holders = vec![TestHolder::new("   ")];

    let report = engine.apply(&results, &mut holders, Authority::Final);
    assert_eq!(report.applied[0].tier, MatchTier::Rescue);
    assert_eq!(holders[0].current_text(), "Le long paragraphe traduit");
}
