use quasimode_core::expression::CommandExpression;
use quasimode_core::manager::RegistryError;

#[test]
fn parameterized_expression_splits_prefix_and_argument() {
    let expression = CommandExpression::parse("open {file}").unwrap();
    assert_eq!(expression.prefix(), "open ");
    assert!(expression.has_argument());
    assert_eq!(expression.argument_name(), Some("file"));
    assert_eq!(expression.to_string(), "open {file}");
}

#[test]
fn exact_expression_has_no_argument() {
    let expression = CommandExpression::parse("calendar").unwrap();
    assert!(!expression.has_argument());
    assert_eq!(expression.prefix(), "calendar");
}

#[test]
fn equality_uses_normalized_text() {
    let a = CommandExpression::parse("open   {file}").unwrap();
    let b = CommandExpression::parse(" open {file} ").unwrap();
    assert_eq!(a, b);
}

#[test]
fn placeholder_must_be_single_and_trailing() {
    for bad in ["open {file} now", "copy {a} {b}", "open {}", "", "close }", "open {fi{le}"] {
        let error = CommandExpression::parse(bad).expect_err("expression should be rejected");
        assert!(
            matches!(error, RegistryError::MalformedExpression { .. }),
            "unexpected error for '{bad}': {error:?}"
        );
    }
}

#[test]
fn parameterized_match_needs_more_than_the_prefix_or_the_trimmed_prefix() {
    let expression = CommandExpression::parse("open {file}").unwrap();
    assert!(expression.matches("open notes.txt"));
    assert!(expression.matches("open"));
    assert!(!expression.matches("open "));
    assert!(!expression.matches("ope"));
    assert!(!expression.matches("opening"));
}

#[test]
fn exact_match_requires_equality() {
    let expression = CommandExpression::parse("calendar").unwrap();
    assert!(expression.matches("calendar"));
    assert!(!expression.matches("calendar "));
    assert!(!expression.matches("cal"));
}
