use proptest::prelude::*;

use quasimode_core::suggestion::{
    best, markup_text, nearness, select_top, AutoCompletion, Suggestion, SuggestionError,
};

#[test]
fn identical_completion_has_no_diff_tags() {
    let completion =
        AutoCompletion::new(Suggestion::new("open emacs", "open emacs")).expect("tokens match");
    let xml = completion.to_xml();
    assert!(!xml.contains("<ins>"));
    assert!(!xml.contains("<alt>"));
    assert_eq!(xml, "open emacs");
    assert_eq!(completion.to_text(), "open emacs");
}

#[test]
fn inserted_and_help_spans_are_tagged() {
    let suggestion = Suggestion::new("op", "open ").with_help("file to open");
    assert_eq!(suggestion.to_xml(), "op<ins>en </ins><help>file to open</help>");
}

#[test]
fn literal_prefix_is_marked_separately() {
    let suggestion = Suggestion::new("open notes", "open notes.txt").with_literal_prefix("open ");
    assert_eq!(
        suggestion.to_xml(),
        "<prefix>open </prefix>notes<ins>.txt</ins>"
    );
}

#[test]
fn markup_escapes_angle_brackets_and_ampersands() {
    let suggestion = Suggestion::new("a", "a<b>&c");
    let xml = suggestion.to_xml();
    assert!(xml.contains("&lt;b&gt;&amp;c"));
    assert_eq!(markup_text(&xml), "a<b>&c");
}

#[test]
fn completion_tokens_must_occur_in_suggestion() {
    let error = AutoCompletion::new(Suggestion::new("open foo", "open emacs"))
        .expect_err("foo is not in the completion");
    assert_eq!(
        error,
        SuggestionError::TokenMismatch {
            token: "foo".to_string(),
            source_text: "open foo".to_string(),
            suggested: "open emacs".to_string(),
        }
    );

    assert!(AutoCompletion::new(Suggestion::new("what?", "what is that/")).is_ok());
}

#[test]
fn equality_ignores_everything_but_suggested_text() {
    let a = Suggestion::new("cal", "calendar").with_help("one");
    let b = Suggestion::new("calen", "calendar");
    assert_eq!(a, b);
    assert_ne!(a, Suggestion::new("cal", "calculator"));
}

#[test]
fn top_selection_is_ordered_and_bounded() {
    let pool = ["calendar", "call mom", "calculator", "cal", "local"]
        .iter()
        .map(|text| Suggestion::new("cal", *text))
        .collect::<Vec<_>>();
    let top = select_top(pool.clone(), 3);
    let texts: Vec<&str> = top.iter().map(Suggestion::to_text).collect();
    assert_eq!(texts[0], "cal");
    assert_eq!(top.len(), 3);
    assert!(top.windows(2).all(|w| w[0].ranking(&w[1]).is_le()));
    assert_eq!(best(&pool).map(Suggestion::to_text), Some("cal"));
    assert!(select_top(pool, 0).is_empty());
}

proptest! {
    #[test]
    fn markup_round_trips_to_suggested_text(
        source in "[a-zA-Z0-9 <>&?]{0,12}",
        suggested in "[a-zA-Z0-9 <>&?]{0,16}",
        help in "[a-z ]{0,8}",
    ) {
        let suggestion = Suggestion::new(source, suggested.clone()).with_help(help);
        prop_assert_eq!(markup_text(&suggestion.to_xml()), suggested);
    }

    #[test]
    fn markup_round_trips_with_literal_prefix(
        typed in "[a-z ]{0,10}",
        rest in "[a-z .]{0,10}",
    ) {
        let suggested = format!("open {rest}");
        let suggestion = Suggestion::new(format!("open {typed}"), suggested.clone())
            .with_literal_prefix("open ");
        prop_assert_eq!(markup_text(&suggestion.to_xml()), suggested);
    }

    #[test]
    fn ranking_orders_by_nearness_then_text(
        source in "[a-z]{0,8}",
        a in "[a-z]{0,8}",
        b in "[a-z]{0,8}",
    ) {
        let sa = Suggestion::new(source.clone(), a.clone());
        let sb = Suggestion::new(source, b.clone());
        if sa.nearness() > sb.nearness() {
            prop_assert!(sa.ranking(&sb).is_lt());
        } else if sa.nearness() == sb.nearness() {
            prop_assert_eq!(sa.ranking(&sb), a.cmp(&b));
        }
    }

    #[test]
    fn nearness_is_symmetric_and_normalized(a in "\\PC{0,10}", b in "\\PC{0,10}") {
        let ab = nearness(&a, &b);
        prop_assert!((0.0..=1.0).contains(&ab));
        prop_assert_eq!(ab, nearness(&b, &a));
        prop_assert_eq!(nearness(&a, &a), 1.0);
    }

    #[test]
    fn empty_completion_never_counts(source in "\\PC{0,16}") {
        prop_assert!(!AutoCompletion::none(source.clone()).has_completion());
        let wrapped = AutoCompletion::new(Suggestion::new(source, "")).expect("empty completion is always valid");
        prop_assert!(!wrapped.has_completion());
    }
}

#[test]
fn completion_tokens_match_ignoring_case_and_shift() {
    assert!(AutoCompletion::new(Suggestion::new("OPEN Rep", "open report1.txt")).is_ok());
    assert!(AutoCompletion::new(Suggestion::new("open report!", "open report1.txt")).is_ok());
    assert!(AutoCompletion::new(Suggestion::new("open report2", "open report1.txt")).is_err());
}
