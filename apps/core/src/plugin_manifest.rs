use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::command::{CommandError, CommandObject, SharedCommand};
use crate::expression::CommandExpression;
use crate::factory::{generator, PrefixFactory};
use crate::manager::CommandManager;

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MessageLog {
    pub fn push(&self, message: String) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
    }

    pub fn drain(&self) -> Vec<String> {
        std::mem::take(
            &mut *self
                .messages
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct ManifestReport {
    pub manifests_loaded: usize,
    pub registered: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManifestAction {
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Message {
        text: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CommandManifest {
    id: String,
    enabled: bool,
    commands: Vec<ManifestCommandEntry>,
    factories: Vec<ManifestFactoryEntry>,
}

impl Default for CommandManifest {
    fn default() -> Self {
        Self {
            id: String::new(),
            enabled: true,
            commands: Vec::new(),
            factories: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestCommandEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    help: Option<String>,
    action: ManifestAction,
}

#[derive(Debug, Deserialize)]
struct ManifestFactoryEntry {
    expression: String,
    #[serde(default)]
    help_text: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    postfixes: Option<Vec<String>>,
    action: ManifestAction,
}

#[derive(Debug, Clone)]
pub struct ManifestCommand {
    name: String,
    description: String,
    help: Option<String>,
    postfix: String,
    action: ManifestAction,
    messages: MessageLog,
}

impl ManifestCommand {
    fn substitute(&self, text: &str) -> String {
        text.replace("{postfix}", &self.postfix)
    }
}

impl CommandObject for ManifestCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn help(&self) -> &str {
        self.help.as_deref().unwrap_or(&self.description)
    }

    fn run(&self) -> Result<(), CommandError> {
        match &self.action {
            ManifestAction::Command { command, args } => {
                let args: Vec<String> = args.iter().map(|arg| self.substitute(arg)).collect();
                spawn_detached(&self.substitute(command), &args)
                    .map(drop)
                    .map_err(|e| CommandError::execution(&self.name, format!("spawn failed: {e}")))
            }
            ManifestAction::Message { text } => {
                self.messages.push(self.substitute(text));
                Ok(())
            }
        }
    }
}

// The child is reaped on a waiter thread so finished launches leave no zombies.
fn spawn_detached(program: &str, args: &[String]) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = Command::new(program).args(args).spawn()?;
    let program = program.to_string();
    thread::Builder::new()
        .name("manifest-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => {
                debug!(%program, %status, "manifest command exited");
                Some(status)
            }
            Err(error) => {
                warn!(%program, %error, "could not wait for manifest command");
                None
            }
        })
}

pub fn load_into(manager: &mut CommandManager, paths: &[PathBuf], messages: &MessageLog) -> ManifestReport {
    let mut report = ManifestReport::default();
    for path in paths {
        for manifest_path in discover_manifest_paths(path) {
            match load_manifest(&manifest_path) {
                Ok(manifest) if !manifest.enabled => {
                    info!(manifest = %manifest_path.display(), "skipping disabled manifest");
                }
                Ok(manifest) => {
                    report.manifests_loaded += 1;
                    register_manifest(manager, manifest, messages, &mut report);
                }
                Err(error) => report.warnings.push(format!(
                    "command manifest '{}' failed: {error}",
                    manifest_path.display()
                )),
            }
        }
    }
    for warning in &report.warnings {
        warn!("{warning}");
    }
    report
}

fn discover_manifest_paths(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    if !path.is_dir() {
        return Vec::new();
    }

    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|entry_path| {
            entry_path
                .extension()
                .and_then(|v| v.to_str())
                .is_some_and(|v| v.eq_ignore_ascii_case("json") || v.eq_ignore_ascii_case("json5"))
        })
        .collect()
}

fn load_manifest(path: &Path) -> Result<CommandManifest, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("read failed for '{}': {e}", path.display()))?;
    let manifest: CommandManifest = json5::from_str(&raw)
        .map_err(|e| format!("invalid manifest in '{}': {e}", path.display()))?;
    if manifest.id.trim().is_empty() {
        return Err("missing manifest id".to_string());
    }
    Ok(manifest)
}

fn register_manifest(
    manager: &mut CommandManager,
    manifest: CommandManifest,
    messages: &MessageLog,
    report: &mut ManifestReport,
) {
    let manifest_id = manifest.id.trim().to_string();

    for entry in manifest.commands {
        let name = entry.name.trim().to_string();
        if name.is_empty() {
            report
                .warnings
                .push(format!("manifest '{manifest_id}': command without a name"));
            continue;
        }
        let command = ManifestCommand {
            name: name.clone(),
            description: entry.description,
            help: entry.help,
            postfix: String::new(),
            action: entry.action,
            messages: messages.clone(),
        };
        match manager.register_object(&name, Arc::new(command)) {
            Ok(()) => report.registered.push(name),
            Err(error) => report
                .warnings
                .push(format!("manifest '{manifest_id}': {error}")),
        }
    }

    for entry in manifest.factories {
        let expression = match CommandExpression::parse(&entry.expression) {
            Ok(expression) if expression.has_argument() => expression,
            Ok(expression) => {
                report.warnings.push(format!(
                    "manifest '{manifest_id}': factory expression '{expression}' has no argument"
                ));
                continue;
            }
            Err(error) => {
                report
                    .warnings
                    .push(format!("manifest '{manifest_id}': {error}"));
                continue;
            }
        };

        let prefix = expression.prefix().to_string();
        let description = entry.description;
        let action = entry.action;
        let log = messages.clone();
        let generate = generator(move |postfix: &str| -> Result<SharedCommand, CommandError> {
            Ok(Arc::new(ManifestCommand {
                name: format!("{prefix}{postfix}"),
                description: description.clone(),
                help: None,
                postfix: postfix.to_string(),
                action: action.clone(),
                messages: log.clone(),
            }))
        });

        let prefix = expression.prefix();
        let factory = match entry.postfixes {
            Some(postfixes) => PrefixFactory::fixed(prefix, &entry.help_text, postfixes, generate),
            None => PrefixFactory::arbitrary(prefix, &entry.help_text, generate),
        };
        match manager.register_factory(expression.as_str(), factory) {
            Ok(()) => report.registered.push(expression.to_string()),
            Err(error) => report
                .warnings
                .push(format!("manifest '{manifest_id}': {error}")),
        }
    }
}
