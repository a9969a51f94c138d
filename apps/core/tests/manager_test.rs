use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quasimode_core::command::{CommandError, FnCommand, SharedCommand};
use quasimode_core::factory::{generator, CommandFactory, PrefixFactory};
use quasimode_core::manager::{
    CommandManager, PriorityOverride, Registrant, RegistryError, ALL_NAMED_COMMANDS,
};
use quasimode_core::suggestion::{AutoCompletion, Suggestion};

fn named(name: &str) -> SharedCommand {
    FnCommand::new(name, &format!("{name} description"), || Ok(())).shared()
}

fn arbitrary(prefix: &'static str) -> PrefixFactory {
    let build = generator(move |postfix: &str| -> Result<SharedCommand, CommandError> {
        Ok(named(&format!("{prefix}{postfix}")))
    });
    PrefixFactory::arbitrary(prefix, "argument", build)
}

struct BrokenFactory {
    calls: Arc<AtomicUsize>,
}

impl CommandFactory for BrokenFactory {
    fn prefix(&self) -> &str {
        ""
    }

    fn help_text(&self) -> &str {
        ""
    }

    fn auto_complete(&mut self, _text: &str) -> Option<AutoCompletion> {
        None
    }

    fn retrieve_suggestions(&mut self, _text: &str) -> Vec<Suggestion> {
        Vec::new()
    }

    fn command_obj(&mut self, _text: &str) -> Result<Option<SharedCommand>, CommandError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CommandError::Generation {
            prefix: String::new(),
            message: "plugin crashed".to_string(),
        })
    }
}

#[test]
fn sentinel_is_always_registered_and_cannot_be_removed() {
    let mut manager = CommandManager::new();
    assert_eq!(manager.expressions(), vec![ALL_NAMED_COMMANDS.to_string()]);
    assert_eq!(
        manager.unregister_command(ALL_NAMED_COMMANDS),
        Err(RegistryError::SentinelRemoval)
    );
    assert!(manager
        .register_object(ALL_NAMED_COMMANDS, named("x"))
        .is_err());
}

#[test]
fn duplicate_exact_name_conflicts_and_leaves_registry_unchanged() {
    let mut manager = CommandManager::new();
    manager.register_object("calendar", named("calendar")).unwrap();
    manager.register_factory("open {file}", arbitrary("open ")).unwrap();
    let before = format!("{manager:?}");

    let error = manager
        .register_object("calendar", named("calendar"))
        .expect_err("duplicate should conflict");
    assert_eq!(error, RegistryError::Conflict("calendar".to_string()));
    assert_eq!(format!("{manager:?}"), before);

    let error = manager
        .register_factory("open  {file}", arbitrary("open "))
        .expect_err("duplicate expression should conflict");
    assert!(matches!(error, RegistryError::Conflict(_)));
    assert_eq!(format!("{manager:?}"), before);
}

#[test]
fn registrant_shape_must_fit_the_expression() {
    let mut manager = CommandManager::new();
    assert_eq!(
        manager.register_command("open {file}", Registrant::Command(named("open"))),
        Err(RegistryError::ExpectedFactory("open {file}".to_string()))
    );
    assert_eq!(
        manager.register_factory("calendar", arbitrary("calendar")),
        Err(RegistryError::ExpectedCommand("calendar".to_string()))
    );
    assert!(matches!(
        manager.register_factory("open {file}", arbitrary("launch ")),
        Err(RegistryError::PrefixMismatch { .. })
    ));
    assert!(matches!(
        manager.register_object("open {a} {b}", named("x")),
        Err(RegistryError::MalformedExpression { .. })
    ));
}

#[test]
fn unregister_removes_factories_and_named_commands() {
    let mut manager = CommandManager::new();
    manager.register_object("calendar", named("calendar")).unwrap();
    manager.register_factory("open {file}", arbitrary("open ")).unwrap();

    manager.unregister_command("open {file}").unwrap();
    manager.unregister_command("calendar").unwrap();
    assert!(manager.get_command("calendar").is_none());
    assert!(manager.get_command("open notes").is_none());
    assert_eq!(
        manager.unregister_command("calendar"),
        Err(RegistryError::NotRegistered("calendar".to_string()))
    );
    assert_eq!(manager.expressions(), vec![ALL_NAMED_COMMANDS.to_string()]);
}

#[test]
fn shortest_exact_prefix_resolution_prefers_open_over_open_with() {
    let mut manager = CommandManager::new();
    manager.register_factory("open with {file}", arbitrary("open with ")).unwrap();
    manager.register_factory("open {file}", arbitrary("open ")).unwrap();

    let expression = manager.get_command_expression("open foo").unwrap();
    assert_eq!(expression.as_str(), "open {file}");
    assert_eq!(manager.get_command_prefix("open foo").as_deref(), Some("open "));
    assert_eq!(manager.get_command("open foo").unwrap().name(), "open foo");

    let expression = manager.get_command_expression("open with foo").unwrap();
    assert_eq!(expression.as_str(), "open with {file}");
}

#[test]
fn calendar_beats_calculate_help_completion_by_nearness() {
    let mut manager = CommandManager::new();
    manager.register_object("calendar", named("calendar")).unwrap();
    manager.register_factory("calculate {expr}", arbitrary("calculate ")).unwrap();

    let completion = manager.auto_complete("cal").expect("cal should complete");
    assert_eq!(completion.to_text(), "calendar");

    let completion = manager.auto_complete("calc").expect("calc should complete");
    assert_eq!(completion.to_text(), "calculate ");
    assert_eq!(completion.help_text(), Some("argument"));
}

#[test]
fn priority_override_wins_for_its_trigger() {
    let mut manager = CommandManager::new().with_priority_overrides(vec![PriorityOverride {
        trigger: "cal".to_string(),
        expression: "calculate {expr}".to_string(),
    }]);
    manager.register_object("calendar", named("calendar")).unwrap();
    manager.register_factory("calculate {expr}", arbitrary("calculate ")).unwrap();

    assert_eq!(manager.auto_complete("cal").unwrap().to_text(), "calculate ");
}

#[test]
fn retrieve_suggestions_unions_all_factories() {
    let mut manager = CommandManager::new();
    manager.register_object("calendar", named("calendar")).unwrap();
    manager.register_object("call mom", named("call mom")).unwrap();
    manager.register_factory("calculate {expr}", arbitrary("calculate ")).unwrap();

    let mut texts: Vec<String> = manager
        .retrieve_suggestions("cal")
        .iter()
        .map(|s| s.to_text().to_string())
        .collect();
    texts.sort();
    assert_eq!(texts, vec!["calculate ", "calendar", "call mom"]);
    assert!(manager.retrieve_suggestions("").is_empty());
}

#[test]
fn broken_factory_is_treated_as_producing_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut manager = CommandManager::new();
    manager.register_object("calendar", named("calendar")).unwrap();
    manager
        .register_factory("{anything}", BrokenFactory { calls: Arc::clone(&calls) })
        .unwrap();

    let command = manager.get_command("calendar").expect("named command still resolves");
    assert_eq!(command.name(), "calendar");
    assert!(manager.get_command("whatever").is_none());
    assert!(calls.load(Ordering::SeqCst) >= 2);
}

#[test]
fn named_commands_resolve_only_on_exact_text() {
    let mut manager = CommandManager::new();
    manager.register_object("calendar", named("calendar")).unwrap();
    assert!(manager.get_command("calendar").is_some());
    assert!(manager.get_command("calend").is_none());
    assert_eq!(manager.command_names(), ["calendar".to_string()]);
}
