//! Integration tests for record normalization
//!
//! Covers:
//! - Both flag encodings decode identically
//! - Malformed records are collected, never fatal
//! - Envelope and flat datasets, numeric id order
//! - Lenient grammar rules and turn segmentation

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use tutorlens::core::{NormalizerConfig, PhraseComponent, RecordNormalizer};
use tutorlens::types::{StudentAction, TutorAction};
use tutorlens::Error;

fn make_record(student: Value, tutor: Value) -> Value {
    json!({
        "past_convo": [
            "Dov'è il gatto?",
            "sopra la sedia?",
            "No, guarda meglio.",
            "sotto il tavolo rosso"
        ],
        "prep": "sotto",
        "obj": "il tavolo",
        "color": "rosso",
        "engPrep": "under",
        "engObj": "the table",
        "engColor": "red",
        "grammarRules": "[['sotto', 'under: position below something']] extra notes, [['ignored']]",
        "studentActions": student,
        "tutorResponses": ["Esatto!", "Sì, sotto il tavolo rosso."],
        "tutorActions": tutor,
    })
}

fn good_record() -> Value {
    make_record(
        json!([true, false, false, false]),
        json!([
            [false, false, false, true, false],
            [false, false, true, true, false]
        ]),
    )
}

// =============================================================================
// FLAG ENCODINGS
// =============================================================================

#[test]
fn test_string_and_bool_flags_decode_identically() {
    let normalizer = RecordNormalizer::new();

    let native = good_record();
    let stringly = make_record(
        json!(["True", "false", "FALSE", " false "]),
        json!([
            ["false", "false", "false", "true", "false"],
            [false, "False", "TRUE", true, "false"]
        ]),
    );

    let a = normalizer.normalize("7", &native).unwrap();
    let b = normalizer.normalize("7", &stringly).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.student_actions, [StudentAction::Guess].into());
    assert_eq!(
        a.tutor_responses[1].actions,
        [TutorAction::Correction, TutorAction::Confirmation].into()
    );
}

#[test]
fn test_mixed_case_student_flags() {
    let normalizer = RecordNormalizer::new();
    let tutor = json!([
        [true, false, false, false, false],
        [false, true, false, false, false]
    ]);

    let native = make_record(json!([true, false, true, false]), tutor.clone());
    let stringly = make_record(json!(["True", "false", "TRUE", "False"]), tutor);

    let a = normalizer.normalize("0", &native).unwrap();
    let b = normalizer.normalize("0", &stringly).unwrap();
    assert_eq!(a.student_actions, b.student_actions);
    assert_eq!(
        a.student_actions,
        [StudentAction::Guess, StudentAction::Affirmation].into()
    );
}

#[test]
fn test_flag_length_mismatch_is_malformed() {
    let normalizer = RecordNormalizer::new();
    let record = make_record(
        json!([true, false, false]),
        json!([
            [false, false, false, true, false],
            [false, false, true, true, false]
        ]),
    );

    let err = normalizer.normalize("3", &record).unwrap_err();
    assert!(matches!(err, Error::MalformedRecord { ref id, .. } if id == "3"));
}

#[test]
fn test_non_boolean_flag_is_malformed() {
    let normalizer = RecordNormalizer::new();
    let record = make_record(
        json!([1, 0, 0, 0]),
        json!([
            [false, false, false, false, false],
            [false, false, false, false, false]
        ]),
    );
    assert!(matches!(
        normalizer.normalize("3", &record),
        Err(Error::MalformedRecord { .. })
    ));
}

// =============================================================================
// CONTEXT
// =============================================================================

#[test]
fn test_context_fields() {
    let conv = RecordNormalizer::new().normalize("1", &good_record()).unwrap();

    assert_eq!(conv.id, "1");
    assert_eq!(conv.context.target_phrase.source, "sotto il tavolo rosso");
    assert_eq!(conv.context.target_phrase.target, "under the table red");
    assert_eq!(conv.context.grammar_rules, vec!["sotto".to_string()]);
    assert_eq!(conv.context.conversation_history.len(), 4);
    assert_eq!(conv.context.image_path, None);
}

#[test]
fn test_phrase_order_is_configurable() {
    let normalizer = RecordNormalizer::with_config(NormalizerConfig {
        phrase_order: vec![PhraseComponent::Preposition, PhraseComponent::Object],
    });
    let conv = normalizer.normalize("1", &good_record()).unwrap();
    assert_eq!(conv.context.target_phrase.source, "sotto il tavolo");
    assert_eq!(conv.context.target_phrase.target, "under the table");
}

#[test]
fn test_unparsable_grammar_is_not_fatal() {
    let mut record = good_record();
    record["grammarRules"] = json!("[['sotto', 'under'");

    let conv = RecordNormalizer::new().normalize("1", &record).unwrap();
    assert!(conv.context.grammar_rules.is_empty());
    assert_eq!(conv.tutor_responses.len(), 2);
}

#[test]
fn test_image_path_carried() {
    let mut record = good_record();
    record["img"] = json!("images/17.png");

    let conv = RecordNormalizer::new().normalize("1", &record).unwrap();
    assert_eq!(conv.context.image_path.as_deref(), Some("images/17.png"));
}

// =============================================================================
// TURNS
// =============================================================================

#[test]
fn test_turn_segmentation() {
    let turns = RecordNormalizer::new()
        .normalize_turns("9", &good_record())
        .unwrap();

    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].index, 0);
    assert_eq!(turns[0].tutor_prompt, "Dov'è il gatto?");
    assert_eq!(turns[0].student_response, "sopra la sedia?");
    assert_eq!(turns[1].index, 1);
    assert_eq!(turns[1].student_response, "sotto il tavolo rosso");
    assert_eq!(turns[0].tutor_responses, turns[1].tutor_responses);
    assert_eq!(turns[0].context, turns[1].context);
}

#[test]
fn test_odd_history_drops_last_utterance() {
    let mut record = good_record();
    record["past_convo"] = json!(["a", "b", "c"]);

    let turns = RecordNormalizer::new().normalize_turns("9", &record).unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].student_response, "b");
}

// =============================================================================
// DATASETS
// =============================================================================

#[test]
fn test_batch_collects_failures() {
    let mut broken = good_record();
    broken.as_object_mut().unwrap().remove("engColor");

    let mut mismatched = good_record();
    mismatched["tutorResponses"] = json!(["only one"]);

    let dataset = json!({
        "prepDataset": {
            "10": good_record(),
            "2": broken,
            "1": good_record(),
            "3": mismatched,
        }
    });

    let out = RecordNormalizer::new().normalize_dataset(&dataset).unwrap();

    let ids: Vec<&str> = out.conversations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "10"]);
    assert_eq!(out.failure_count(), 2);

    let failed: Vec<&str> = out.failures.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(failed, vec!["2", "3"]);
    assert!(out
        .failures
        .iter()
        .all(|f| matches!(f.error, Error::MalformedRecord { .. })));
}

#[test]
fn test_flat_dataset_accepted() {
    let dataset = json!({ "0": good_record(), "1": good_record() });
    let out = RecordNormalizer::new().normalize_dataset(&dataset).unwrap();
    assert_eq!(out.conversations.len(), 2);
    assert_eq!(out.turns().len(), 4);
}

#[test]
fn test_non_object_dataset_rejected() {
    assert!(RecordNormalizer::new().normalize_dataset(&json!([1, 2])).is_err());
}

#[test]
fn test_deeply_nested_grammar_does_not_abort_batch() {
    let mut deep = good_record();
    deep["grammarRules"] = json!(format!("{}]] tail", "[".repeat(100_000)));

    let dataset = json!({ "0": deep, "1": good_record() });
    let out = RecordNormalizer::new().normalize_dataset(&dataset).unwrap();

    assert_eq!(out.failure_count(), 0);
    assert_eq!(out.conversations.len(), 2);
    assert!(out.conversations[0].context.grammar_rules.is_empty());
    assert_eq!(out.conversations[1].context.grammar_rules, vec!["sotto".to_string()]);
}
