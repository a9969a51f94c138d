use quasimode_core::command::{CommandError, FnCommand, SharedCommand};
use quasimode_core::factory::{generator, CommandFactory, PostfixPolicy, PrefixFactory};

fn open_factory(postfixes: &[&str]) -> PrefixFactory {
    let build = generator(|postfix: &str| -> Result<SharedCommand, CommandError> {
        Ok(FnCommand::new(&format!("open {postfix}"), "Open a file", || Ok(())).shared())
    });
    PrefixFactory::fixed("open ", "file to open", postfixes.iter().copied(), build)
}

fn search_factory() -> PrefixFactory {
    let build = generator(|query: &str| -> Result<SharedCommand, CommandError> {
        Ok(FnCommand::new(&format!("search {query}"), "Search the web", || Ok(())).shared())
    });
    PrefixFactory::arbitrary("search ", "search terms", build)
}

#[test]
fn partial_prefix_completes_to_help_text() {
    let mut factory = open_factory(&["emacs", "notepad"]);
    let completion = factory.auto_complete("op").expect("prefix should complete");
    assert_eq!(completion.to_text(), "open ");
    assert_eq!(completion.help_text(), Some("file to open"));
}

#[test]
fn postfix_match_sets_insertion_span() {
    let mut factory = open_factory(&["text editor", "notepad"]);
    let completion = factory.auto_complete("open edit").expect("postfix should complete");
    assert_eq!(completion.to_text(), "open text editor");
    assert_eq!(completion.insertion_span(), Some((5, 9)));
}

#[test]
fn matching_is_case_and_shift_tolerant() {
    let mut factory = open_factory(&["Report!.txt"]);
    let completion = factory.auto_complete("open report1").expect("shift twin should match");
    assert_eq!(completion.to_text(), "open Report!.txt");
}

#[test]
fn lexicographically_first_match_wins_autocompletion() {
    let mut factory = open_factory(&["notes b", "notes a", "my notes"]);
    let completion = factory.auto_complete("open notes").unwrap();
    assert_eq!(completion.to_text(), "open my notes");

    let all: Vec<String> = factory
        .retrieve_suggestions("open notes")
        .iter()
        .map(|s| s.to_text().to_string())
        .collect();
    assert_eq!(all, vec!["open my notes", "open notes a", "open notes b"]);
}

#[test]
fn word_boundary_retry_applies_with_a_real_prefix() {
    let mut factory = open_factory(&["google-chrome"]);
    let completion = factory
        .auto_complete("open google chrome")
        .expect("word-boundary retry should match");
    assert_eq!(completion.to_text(), "open google-chrome");
}

#[test]
fn help_suggestion_is_prepended_for_partial_prefix() {
    let mut factory = open_factory(&["emacs"]);
    let suggestions = factory.retrieve_suggestions("open");
    assert_eq!(suggestions[0].to_text(), "open ");
    assert_eq!(suggestions[0].help_text(), Some("file to open"));
}

#[test]
fn fixed_factory_only_builds_known_postfixes() {
    let mut factory = open_factory(&["emacs"]);
    let command = factory.command_obj("open emacs").unwrap().expect("known postfix");
    assert_eq!(command.name(), "open emacs");
    assert!(factory.command_obj("open vim").unwrap().is_none());
    assert!(factory.command_obj("close emacs").unwrap().is_none());
}

#[test]
fn postfix_changes_are_visible_to_matching() {
    let mut factory = open_factory(&["emacs"]);
    assert!(factory.auto_complete("open vim").is_none());
    assert!(factory.add_postfix("vim"));
    assert!(!factory.add_postfix("vim"));
    assert_eq!(factory.auto_complete("open vim").unwrap().to_text(), "open vim");

    assert!(factory.remove_postfix("vim"));
    assert!(factory.auto_complete("open vim").is_none());

    factory.set_postfixes(["nano"]);
    assert_eq!(factory.postfixes(), ["nano".to_string()]);
}

#[test]
fn arbitrary_factory_echoes_typed_text() {
    let mut factory = search_factory();
    assert!(matches!(factory.policy(), PostfixPolicy::Arbitrary));

    let help = factory.auto_complete("sea").unwrap();
    assert_eq!(help.to_text(), "search ");
    assert_eq!(help.help_text(), Some("search terms"));

    let echo = factory.auto_complete("search rust traits").unwrap();
    assert_eq!(echo.to_text(), "search rust traits");

    assert!(factory.auto_complete("open").is_none());
    assert!(!factory.add_postfix("anything"));

    let command = factory.command_obj("search rust").unwrap().unwrap();
    assert_eq!(command.name(), "search rust");
}
