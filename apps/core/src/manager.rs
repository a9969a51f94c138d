use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use tracing::{debug, error, info, warn};

use crate::command::SharedCommand;
use crate::expression::CommandExpression;
use crate::factory::{complete_from_corpus, suggest_from_corpus, CommandFactory};
use crate::matching::PostfixCorpus;
use crate::suggestion::{AutoCompletion, Suggestion};

pub const ALL_NAMED_COMMANDS: &str = "{all named commands}";
const ALL_NAMED_COMMANDS_ARGUMENT: &str = "all named commands";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("command '{0}' is already registered")]
    Conflict(String),
    #[error("malformed command expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },
    #[error("'{0}' takes an argument and must be registered with a factory")]
    ExpectedFactory(String),
    #[error("'{0}' is an exact name and must be registered with a command object")]
    ExpectedCommand(String),
    #[error("factory prefix '{prefix}' does not match expression '{expression}'")]
    PrefixMismatch { expression: String, prefix: String },
    #[error("command '{0}' is not registered")]
    NotRegistered(String),
    #[error("the named-command registry cannot be removed")]
    SentinelRemoval,
}

pub enum Registrant {
    Command(SharedCommand),
    Factory(Box<dyn CommandFactory>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityOverride {
    pub trigger: String,
    pub expression: String,
}

#[derive(Default)]
struct NamedCommandRegistry {
    corpus: PostfixCorpus,
    commands: HashMap<String, SharedCommand>,
}

impl NamedCommandRegistry {
    fn register(&mut self, name: &str, command: SharedCommand) -> Result<(), RegistryError> {
        if self.commands.contains_key(name) {
            return Err(RegistryError::Conflict(name.to_string()));
        }
        self.corpus.add(name);
        self.commands.insert(name.to_string(), command);
        Ok(())
    }

    fn unregister(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.commands.remove(name).is_none() {
            return Err(RegistryError::NotRegistered(name.to_string()));
        }
        self.corpus.remove(name);
        Ok(())
    }

    fn names(&self) -> &[String] {
        self.corpus.postfixes()
    }
}

impl CommandFactory for NamedCommandRegistry {
    fn prefix(&self) -> &str {
        ""
    }

    fn help_text(&self) -> &str {
        ""
    }

    fn auto_complete(&mut self, text: &str) -> Option<AutoCompletion> {
        complete_from_corpus("", "", &mut self.corpus, text)
    }

    fn retrieve_suggestions(&mut self, text: &str) -> Vec<Suggestion> {
        suggest_from_corpus("", "", &mut self.corpus, text)
    }

    fn command_obj(
        &mut self,
        text: &str,
    ) -> Result<Option<SharedCommand>, crate::command::CommandError> {
        Ok(self.commands.get(text).cloned())
    }
}

struct FactoryEntry {
    expression: CommandExpression,
    factory: Box<dyn CommandFactory>,
}

fn split_entry(entry: &mut FactoryEntry) -> (&CommandExpression, &mut dyn CommandFactory) {
    (&entry.expression, entry.factory.as_mut())
}

struct Candidate {
    expression: CommandExpression,
    command: SharedCommand,
}

pub struct CommandManager {
    sentinel: CommandExpression,
    named: NamedCommandRegistry,
    factories: Vec<FactoryEntry>,
    priority_overrides: Vec<PriorityOverride>,
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CommandManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandManager")
            .field("expressions", &self.expressions())
            .field("named_commands", &self.named.names())
            .field("priority_overrides", &self.priority_overrides)
            .finish()
    }
}

impl CommandManager {
    pub fn new() -> Self {
        Self {
            sentinel: CommandExpression::catch_all(ALL_NAMED_COMMANDS_ARGUMENT),
            named: NamedCommandRegistry::default(),
            factories: Vec::new(),
            priority_overrides: Vec::new(),
        }
    }

    pub fn with_priority_overrides(mut self, overrides: Vec<PriorityOverride>) -> Self {
        self.priority_overrides = overrides;
        self
    }

    pub fn register_command(
        &mut self,
        name: &str,
        registrant: Registrant,
    ) -> Result<(), RegistryError> {
        let expression = CommandExpression::parse(name).inspect_err(|error| {
            warn!(%error, "rejected command registration");
        })?;
        if expression == self.sentinel {
            return Err(RegistryError::Conflict(expression.to_string()));
        }

        if expression.has_argument() {
            let Registrant::Factory(factory) = registrant else {
                return Err(RegistryError::ExpectedFactory(expression.to_string()));
            };
            if factory.prefix() != expression.prefix() {
                return Err(RegistryError::PrefixMismatch {
                    expression: expression.to_string(),
                    prefix: factory.prefix().to_string(),
                });
            }
            let slot = self
                .factories
                .binary_search_by(|entry| entry.expression.as_str().cmp(expression.as_str()));
            match slot {
                Ok(_) => return Err(RegistryError::Conflict(expression.to_string())),
                Err(index) => self.factories.insert(
                    index,
                    FactoryEntry {
                        expression: expression.clone(),
                        factory,
                    },
                ),
            }
        } else {
            let Registrant::Command(command) = registrant else {
                return Err(RegistryError::ExpectedCommand(expression.to_string()));
            };
            self.named.register(expression.as_str(), command)?;
        }

        info!(%expression, "registered command");
        Ok(())
    }

    pub fn register_object(&mut self, name: &str, command: SharedCommand) -> Result<(), RegistryError> {
        self.register_command(name, Registrant::Command(command))
    }

    pub fn register_factory<F>(&mut self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        F: CommandFactory + 'static,
    {
        self.register_command(name, Registrant::Factory(Box::new(factory)))
    }

    pub fn unregister_command(&mut self, name: &str) -> Result<(), RegistryError> {
        let expression = CommandExpression::parse(name)
            .map_err(|_| RegistryError::NotRegistered(name.to_string()))?;
        if expression == self.sentinel {
            return Err(RegistryError::SentinelRemoval);
        }

        if let Some(index) = self
            .factories
            .iter()
            .position(|entry| entry.expression == expression)
        {
            self.factories.remove(index);
        } else {
            self.named.unregister(expression.as_str())?;
        }

        info!(%expression, "unregistered command");
        Ok(())
    }

    pub fn expressions(&self) -> Vec<String> {
        std::iter::once(self.sentinel.to_string())
            .chain(self.factories.iter().map(|entry| entry.expression.to_string()))
            .collect()
    }

    pub fn command_names(&self) -> &[String] {
        self.named.names()
    }

    pub fn get_command(&mut self, text: &str) -> Option<SharedCommand> {
        self.resolve(text).map(|candidate| candidate.command)
    }

    pub fn get_command_prefix(&mut self, text: &str) -> Option<String> {
        self.resolve(text)
            .map(|candidate| candidate.expression.prefix().to_string())
    }

    pub fn get_command_expression(&mut self, text: &str) -> Option<CommandExpression> {
        self.resolve(text).map(|candidate| candidate.expression)
    }

    pub fn get_command_entry(&mut self, text: &str) -> Option<(CommandExpression, SharedCommand)> {
        self.resolve(text)
            .map(|candidate| (candidate.expression, candidate.command))
    }

    pub fn factory_prefixes(&self) -> Vec<String> {
        self.factories
            .iter()
            .map(|entry| entry.expression.prefix().to_string())
            .collect()
    }

    pub fn auto_complete(&mut self, text: &str) -> Option<AutoCompletion> {
        if text.is_empty() {
            return None;
        }

        let mut results: Vec<(String, AutoCompletion)> = Vec::new();
        for (expression, factory) in self.entries_mut() {
            if let Some(completion) = factory.auto_complete(text) {
                if completion.has_completion() {
                    results.push((expression.to_string(), completion));
                }
            }
        }

        if results.len() > 1 {
            for rule in &self.priority_overrides {
                if !text.starts_with(rule.trigger.as_str()) {
                    continue;
                }
                if let Some(index) = results.iter().position(|(expr, _)| *expr == rule.expression) {
                    debug!(trigger = %rule.trigger, expression = %rule.expression, "priority override applied");
                    return Some(results.swap_remove(index).1);
                }
            }
        }

        results
            .into_iter()
            .map(|(_, completion)| completion)
            .min_by(|a, b| a.ranking(b))
    }

    pub fn retrieve_suggestions(&mut self, text: &str) -> Vec<Suggestion> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        for (_, factory) in self.entries_mut() {
            out.extend(factory.retrieve_suggestions(text));
        }
        out
    }

    fn entries_mut(
        &mut self,
    ) -> impl Iterator<Item = (&CommandExpression, &mut dyn CommandFactory)> + '_ {
        let named: &mut dyn CommandFactory = &mut self.named;
        std::iter::once((&self.sentinel, named))
            .chain(self.factories.iter_mut().map(split_entry))
    }

    fn candidates(&mut self, text: &str) -> Vec<Candidate> {
        let mut out = Vec::new();
        for (expression, factory) in self.entries_mut() {
            if !expression.matches(text) {
                continue;
            }
            match factory.command_obj(text) {
                Ok(Some(command)) => out.push(Candidate {
                    expression: expression.clone(),
                    command,
                }),
                Ok(None) => {}
                Err(error) => {
                    error!(%expression, %error, "factory failed to produce a command");
                }
            }
        }
        out
    }

    fn resolve(&mut self, text: &str) -> Option<Candidate> {
        let mut candidates = self.candidates(text);
        if candidates.len() <= 1 {
            return candidates.pop();
        }

        for shortened in shortened_texts(text) {
            let wanted = format!("{shortened} ");
            if let Some(index) = candidates
                .iter()
                .position(|candidate| candidate.expression.prefix() == wanted)
            {
                return Some(candidates.swap_remove(index));
            }
        }

        candidates
            .into_iter()
            .min_by(|a, b| a.expression.as_str().cmp(b.expression.as_str()))
    }
}

fn shortened_texts(text: &str) -> Vec<String> {
    let base = if text.ends_with(char::is_whitespace) {
        text.trim_end()
    } else {
        match text.rfind(char::is_whitespace) {
            Some(index) => &text[..index],
            None => "",
        }
    };
    let words: Vec<&str> = base.split_whitespace().collect();
    (1..=words.len())
        .rev()
        .map(|count| words[..count].join(" "))
        .collect()
}
