use std::sync::Arc;

use tracing::{debug, error, info};

use crate::command::{CommandError, SharedCommand};
use crate::config::{Config, ConfigError};
use crate::display::{Frame, ParameterPopup, QuasimodeDisplay};
use crate::keys::{parse_key, Key, KeyCode};
use crate::manager::CommandManager;
use crate::suggestion::{best, Suggestion};
use crate::suggestion_list::{ListPolicy, SuggestionList};
use crate::tasks::TaskRegistry;

const DID_YOU_MEAN_MIN_NEARNESS: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuasimodeSettings {
    pub trigger_key: Key,
    pub cancel_keys: Vec<Key>,
    pub modal: bool,
    pub reveal_delay_ms: u64,
    pub double_tap_window_ms: u64,
    pub double_tap_prefix: Option<String>,
    pub no_match_fallback: Option<String>,
    pub min_not_a_command_length: usize,
}

impl Default for QuasimodeSettings {
    fn default() -> Self {
        Self {
            trigger_key: Key::Named("CapsLock".to_string()),
            cancel_keys: vec![Key::Escape],
            modal: false,
            reveal_delay_ms: 400,
            double_tap_window_ms: 300,
            double_tap_prefix: Some("open ".to_string()),
            no_match_fallback: None,
            min_not_a_command_length: 2,
        }
    }
}

impl QuasimodeSettings {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let key = |name: &str| parse_key(name).map_err(|e| ConfigError::Invalid(e.to_string()));
        Ok(Self {
            trigger_key: key(&cfg.trigger_key)?,
            cancel_keys: cfg
                .cancel_keys
                .iter()
                .map(|name| key(name))
                .collect::<Result<_, _>>()?,
            modal: cfg.modal,
            reveal_delay_ms: cfg.suggestion_reveal_delay_ms,
            double_tap_window_ms: cfg.double_tap_window_ms,
            double_tap_prefix: cfg.double_tap_prefix.clone(),
            no_match_fallback: cfg.no_match_fallback.clone(),
            min_not_a_command_length: cfg.min_not_a_command_length,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuasimodeState {
    Idle,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Executed { command: String },
    NotACommand { text: String, hint: Option<String> },
    Dismissed,
    Cancelled,
}

/// State owned by the one active session. Dropping it unregisters the
/// session's redraw responder.
struct Session {
    id: u64,
    dirty: bool,
    text_changed: bool,
    reveal_elapsed_ms: u64,
    revealed: usize,
    popup: Option<ParameterPopup>,
    hooked: Vec<SharedCommand>,
}

impl Session {
    fn new(id: u64) -> Self {
        Self {
            id,
            dirty: true,
            text_changed: true,
            reveal_elapsed_ms: 0,
            revealed: 0,
            popup: None,
            hooked: Vec::new(),
        }
    }

    fn mark_edited(&mut self) {
        self.dirty = true;
        self.text_changed = true;
    }

    fn remember(&mut self, command: &SharedCommand) {
        if !self.hooked.iter().any(|seen| Arc::ptr_eq(seen, command)) {
            self.hooked.push(Arc::clone(command));
        }
    }

    fn param_command(&self) -> Option<&SharedCommand> {
        self.hooked.last()
    }
}

pub struct Quasimode<D: QuasimodeDisplay> {
    settings: QuasimodeSettings,
    manager: CommandManager,
    list: SuggestionList,
    display: D,
    tasks: TaskRegistry,
    session: Option<Session>,
    last_session_id: u64,
    last_activation_ms: Option<u64>,
    pending_hint: Option<String>,
}

impl<D: QuasimodeDisplay> Quasimode<D> {
    pub fn new(
        settings: QuasimodeSettings,
        policy: ListPolicy,
        manager: CommandManager,
        display: D,
    ) -> Self {
        Self {
            settings,
            manager,
            list: SuggestionList::new(policy),
            display,
            tasks: TaskRegistry::new(),
            session: None,
            last_session_id: 0,
            last_activation_ms: None,
            pending_hint: None,
        }
    }

    pub fn from_config(cfg: &Config, manager: CommandManager, display: D) -> Result<Self, ConfigError> {
        Ok(Self::new(
            QuasimodeSettings::from_config(cfg)?,
            ListPolicy::from(cfg),
            manager,
            display,
        ))
    }

    pub fn state(&self) -> QuasimodeState {
        if self.session.is_some() {
            QuasimodeState::Active
        } else {
            QuasimodeState::Idle
        }
    }

    pub fn settings(&self) -> &QuasimodeSettings {
        &self.settings
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.id)
    }

    pub fn user_text(&self) -> &str {
        self.list.user_text()
    }

    pub fn manager(&self) -> &CommandManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut CommandManager {
        &mut self.manager
    }

    pub fn suggestion_list(&mut self) -> (&mut SuggestionList, &mut CommandManager) {
        (&mut self.list, &mut self.manager)
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn tasks_mut(&mut self) -> &mut TaskRegistry {
        &mut self.tasks
    }

    pub fn parameter_popup(&self) -> Option<&ParameterPopup> {
        self.session.as_ref().and_then(|session| session.popup.as_ref())
    }

    pub fn on_trigger_down(&mut self, now_ms: u64) -> Result<Option<SessionOutcome>, CommandError> {
        if self.session.is_some() {
            if self.settings.modal {
                return self.end_session(true).map(Some);
            }
            return Ok(None);
        }

        let double_tap = self.last_activation_ms.is_some_and(|last| {
            now_ms.saturating_sub(last) <= self.settings.double_tap_window_ms
        });
        self.last_activation_ms = Some(now_ms);

        let id = now_ms.max(self.last_session_id + 1);
        self.last_session_id = id;
        self.list.clear_state();
        self.list.set_did_you_mean_hint(self.pending_hint.take());
        if double_tap {
            if let Some(prefix) = &self.settings.double_tap_prefix {
                self.list.set_user_text(prefix);
            }
        }
        self.session = Some(Session::new(id));
        info!(session_id = id, double_tap, "quasimode session started");
        Ok(None)
    }

    pub fn on_trigger_up(&mut self, _now_ms: u64) -> Result<Option<SessionOutcome>, CommandError> {
        if self.session.is_none() || self.settings.modal {
            return Ok(None);
        }
        self.end_session(true).map(Some)
    }

    pub fn on_cancel(&mut self) -> Option<SessionOutcome> {
        self.session.as_ref()?;
        match self.end_session(false) {
            Ok(outcome) => Some(outcome),
            Err(_) => Some(SessionOutcome::Cancelled),
        }
    }

    pub fn on_key(&mut self, key: Key) -> Result<Option<SessionOutcome>, CommandError> {
        if self.session.is_none() || key == self.settings.trigger_key {
            return Ok(None);
        }
        if key == Key::Escape || self.settings.cancel_keys.contains(&key) {
            return Ok(self.on_cancel());
        }

        let code = key.code();
        match key {
            Key::Char { code, ch } => {
                let mut text = self.list.user_text().to_string();
                let remapped = self
                    .typed_command(&text)
                    .and_then(|(_, command)| command.key_remap().and_then(|remap| remap.get(&code).cloned()));
                match remapped {
                    Some(literal) => text.push_str(&literal),
                    None => text.push(ch),
                }
                self.edit_text(code, text);
            }
            Key::Backspace => {
                let mut text = self.list.user_text().to_string();
                if text.pop().is_some() {
                    self.edit_text(code, text);
                }
            }
            Key::Delete => {
                let text = self.list.user_text().to_string();
                let rewound = match self.typed_prefix(&text) {
                    Some(prefix) if text != prefix => prefix,
                    _ => String::new(),
                };
                self.edit_text(code, rewound);
            }
            Key::Up | Key::Down => {
                let direction = if key == Key::Up { -1 } else { 1 };
                self.list.cycle_active_suggestion(&mut self.manager, direction);
                if let Some(session) = self.session.as_mut() {
                    if session.popup.as_ref().is_some_and(|popup| popup.index != 0) {
                        session.popup = None;
                        if let Some(command) = session.param_command() {
                            command.set_parameter_suggestions(None);
                        }
                    }
                    session.dirty = true;
                }
            }
            Key::Tab | Key::Right => {
                if !self.cycle_popup() {
                    self.auto_type(code);
                }
            }
            Key::Return => {
                self.auto_type(code);
                return self.end_session(true).map(Some);
            }
            Key::Escape | Key::Named(_) => {}
        }
        Ok(None)
    }

    pub fn on_tick(&mut self, elapsed_ms: u64) {
        self.tasks.tick();

        let Some(session) = self.session.as_mut() else {
            return;
        };

        let mut needs_draw = poll_popup(session);
        if session.dirty {
            session.dirty = false;
            if session.text_changed {
                session.text_changed = false;
                session.reveal_elapsed_ms = 0;
                session.revealed = 0;
            }
            needs_draw = true;
        } else {
            let total = self
                .list
                .suggestions(&mut self.manager)
                .len()
                .saturating_sub(1);
            session.reveal_elapsed_ms = session.reveal_elapsed_ms.saturating_add(elapsed_ms);
            let target = if session.reveal_elapsed_ms >= self.settings.reveal_delay_ms {
                total
            } else {
                (session.revealed + 1).min(total)
            };
            if target != session.revealed {
                session.revealed = target;
                needs_draw = true;
            }
        }

        if needs_draw {
            let frame = build_frame(&mut self.list, &mut self.manager, session);
            self.display.draw(&frame);
        }
    }

    fn typed_prefix(&self, text: &str) -> Option<String> {
        self.manager
            .factory_prefixes()
            .into_iter()
            .filter(|prefix| !prefix.is_empty() && text.starts_with(prefix.as_str()))
            .max_by_key(String::len)
    }

    /// The command whose prefix is already typed: the active command first,
    /// else the one the text (or the text without trailing spaces) names.
    /// Named commands count their whole name as the prefix.
    fn typed_command(&mut self, text: &str) -> Option<(String, SharedCommand)> {
        let active = self
            .list
            .active_suggestion(&mut self.manager)
            .map(|suggestion| suggestion.to_text().to_string());
        for probe in active.as_deref().into_iter().chain([text, text.trim_end()]) {
            let Some((expression, command)) = self.manager.get_command_entry(probe) else {
                continue;
            };
            let prefix = if expression.prefix().is_empty() {
                probe
            } else {
                expression.prefix()
            };
            if text.starts_with(prefix) {
                return Some((prefix.to_string(), command));
            }
        }
        None
    }

    fn edit_text(&mut self, code: KeyCode, text: String) {
        let previous = self.list.user_text().to_string();
        if previous == text {
            return;
        }
        self.list.set_user_text(&text);

        let typed = self.typed_command(&text);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.mark_edited();
        if let Some((prefix, command)) = typed {
            let old_param = previous.strip_prefix(prefix.as_str()).unwrap_or("");
            let new_param = text.strip_prefix(prefix.as_str()).unwrap_or("");
            command.on_parameter_modified(code, old_param, new_param, session.id);
            session.remember(&command);
        }
    }

    fn auto_type(&mut self, code: KeyCode) {
        let Some(suggestion) = self.list.active_suggestion(&mut self.manager) else {
            return;
        };
        self.edit_text(code, suggestion.to_text().to_string());
    }

    fn cycle_popup(&mut self) -> bool {
        let text = self.list.user_text().to_string();
        let typed = match self.typed_command(&text) {
            Some((prefix, _)) => Some(prefix),
            None => self.typed_prefix(&text),
        };
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(popup) = session.popup.as_mut() else {
            return false;
        };
        if popup.entries.is_empty() {
            return false;
        }

        popup.index = (popup.index + 1) % (popup.entries.len() + 1);
        session.dirty = true;
        if popup.index == 0 {
            return true;
        }
        if let Some(prefix) = typed {
            let spliced = format!("{prefix}{}", popup.entries[popup.index - 1]);
            self.list.set_user_text(&spliced);
        }
        true
    }

    fn end_session(&mut self, execute: bool) -> Result<SessionOutcome, CommandError> {
        let Some(session) = self.session.take() else {
            return Ok(SessionOutcome::Dismissed);
        };

        let text = self.list.user_text().to_string();
        if !execute {
            info!(session_id = session.id, "quasimode session cancelled");
            self.finish(&session);
            return Ok(SessionOutcome::Cancelled);
        }

        let long_enough = text.chars().count() >= self.settings.min_not_a_command_length;
        let mut resolved = self
            .list
            .active_command(&mut self.manager)
            .map(|command| (command.name().to_string(), command));
        if resolved.is_none() && long_enough {
            if let Some(template) = &self.settings.no_match_fallback {
                let fallback = template.replace("{text}", &text);
                resolved = self
                    .manager
                    .get_command(&fallback)
                    .map(|command| (command.name().to_string(), command));
                if resolved.is_some() {
                    debug!(%fallback, "no-match fallback applied");
                }
            }
        }

        let outcome = match resolved {
            Some((name, command)) => {
                self.finish(&session);
                info!(session_id = session.id, command = %name, "executing command");
                if let Err(e) = command.run() {
                    error!(session_id = session.id, command = %name, text = %text, error = %e, "command failed");
                    return Err(e);
                }
                SessionOutcome::Executed { command: name }
            }
            None if long_enough => {
                let hint = self.did_you_mean(&text);
                self.finish(&session);
                let message = match &hint {
                    Some(hint) => format!("\"{text}\" is not a command. Did you mean \"{hint}\"?"),
                    None => format!("\"{text}\" is not a command."),
                };
                self.display.show_message(&message);
                self.pending_hint.clone_from(&hint);
                SessionOutcome::NotACommand { text, hint }
            }
            None => {
                self.finish(&session);
                SessionOutcome::Dismissed
            }
        };
        info!(session_id = session.id, ?outcome, "quasimode session ended");
        Ok(outcome)
    }

    fn did_you_mean(&mut self, text: &str) -> Option<String> {
        let mut candidates: Vec<Suggestion> = self
            .list
            .suggestions(&mut self.manager)
            .iter()
            .skip(1)
            .map(|entry| Suggestion::new(text, entry.to_text()))
            .collect();
        candidates.extend(
            self.manager
                .command_names()
                .iter()
                .map(|name| Suggestion::new(text, name.as_str())),
        );
        candidates.extend(
            self.manager
                .factory_prefixes()
                .iter()
                .map(|prefix| prefix.trim_end())
                .filter(|prefix| !prefix.is_empty())
                .map(|prefix| Suggestion::new(text, prefix)),
        );
        best(&candidates)
            .filter(|candidate| candidate.nearness() >= DID_YOU_MEAN_MIN_NEARNESS)
            .map(|candidate| candidate.to_text().to_string())
    }

    fn finish(&mut self, session: &Session) {
        self.list.clear_state();
        self.display.hide();
        for command in &session.hooked {
            command.on_session_ended(session.id);
        }
    }
}

fn poll_popup(session: &mut Session) -> bool {
    let Some(command) = session.param_command() else {
        return false;
    };
    match command.parameter_suggestions() {
        Some(entries) if !entries.is_empty() => {
            if session.popup.as_ref().is_some_and(|popup| popup.entries == entries) {
                return false;
            }
            session.popup = Some(ParameterPopup { entries, index: 0 });
            true
        }
        _ => session.popup.take().is_some(),
    }
}

fn build_frame(list: &mut SuggestionList, manager: &mut CommandManager, session: &Session) -> Frame {
    let description = list
        .active_command(manager)
        .map(|command| command.description().to_string())
        .unwrap_or_default();
    let active_index = list.active_index();
    let did_you_mean = list.did_you_mean_hint().map(str::to_string);
    let entries = list.suggestions(manager);
    let auto_completion = entries.first().map(Suggestion::to_xml).unwrap_or_default();
    let suggestions: Vec<String> = entries.iter().skip(1).map(Suggestion::to_xml).collect();
    Frame {
        description,
        auto_completion,
        revealed: session.revealed.min(suggestions.len()),
        suggestions,
        active_index,
        parameter_popup: session.popup.clone(),
        did_you_mean,
    }
}
