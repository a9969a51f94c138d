use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::keys::KeyCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("command '{name}' failed: {message}")]
    Execution { name: String, message: String },
    #[error("factory '{prefix}' could not build a command: {message}")]
    Generation { prefix: String, message: String },
}

impl CommandError {
    pub fn execution(name: &str, message: impl Into<String>) -> Self {
        Self::Execution {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

pub type KeyRemap = HashMap<KeyCode, String>;

pub trait CommandObject: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn help(&self) -> &str {
        self.description()
    }

    fn key_remap(&self) -> Option<&KeyRemap> {
        None
    }

    fn run(&self) -> Result<(), CommandError>;

    fn on_parameter_modified(
        &self,
        _key_code: KeyCode,
        _previous: &str,
        _current: &str,
        _session_id: u64,
    ) {
    }

    fn parameter_suggestions(&self) -> Option<Vec<String>> {
        None
    }

    fn set_parameter_suggestions(&self, _suggestions: Option<Vec<String>>) {}

    fn on_session_ended(&self, _session_id: u64) {}
}

pub type SharedCommand = Arc<dyn CommandObject>;

type Action = dyn Fn() -> Result<(), String> + Send + Sync;

pub struct FnCommand {
    name: String,
    description: String,
    help: Option<String>,
    key_remap: Option<KeyRemap>,
    action: Box<Action>,
}

impl FnCommand {
    pub fn new<F>(name: &str, description: &str, action: F) -> Self
    where
        F: Fn() -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            help: None,
            key_remap: None,
            action: Box::new(action),
        }
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn with_key_remap(mut self, remap: KeyRemap) -> Self {
        self.key_remap = Some(remap);
        self
    }

    pub fn shared(self) -> SharedCommand {
        Arc::new(self)
    }
}

impl Debug for FnCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCommand")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl CommandObject for FnCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn help(&self) -> &str {
        self.help.as_deref().unwrap_or(&self.description)
    }

    fn key_remap(&self) -> Option<&KeyRemap> {
        self.key_remap.as_ref()
    }

    fn run(&self) -> Result<(), CommandError> {
        (self.action)().map_err(|message| CommandError::execution(&self.name, message))
    }
}
