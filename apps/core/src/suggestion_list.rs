use std::collections::HashMap;

use tracing::{debug, info};

use crate::command::SharedCommand;
use crate::config::Config;
use crate::manager::CommandManager;
use crate::suggestion::{select_top, AutoCompletion, Suggestion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPolicy {
    pub min_autocomplete_chars: usize,
    pub max_suggestions: usize,
    pub calculator_prefix: Option<String>,
    pub fallback_prefix: Option<String>,
    pub backfill_with_fallback: bool,
}

impl Default for ListPolicy {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ListPolicy {
    fn from(cfg: &Config) -> Self {
        Self {
            min_autocomplete_chars: cfg.min_autocomplete_chars,
            max_suggestions: cfg.max_suggestions,
            calculator_prefix: cfg.calculator_prefix.clone(),
            fallback_prefix: cfg.fallback_prefix.clone(),
            backfill_with_fallback: cfg.backfill_with_fallback,
        }
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    auto_completion: AutoCompletion,
    /// Entry 0 stands for the autocompletion (or the raw text without one).
    entries: Vec<Suggestion>,
}

#[derive(Debug, Clone)]
pub struct SuggestionList {
    policy: ListPolicy,
    user_text: String,
    active_index: usize,
    hint: Option<String>,
    applied_prefix: Option<String>,
    snapshot: Option<Snapshot>,
}

impl SuggestionList {
    pub fn new(policy: ListPolicy) -> Self {
        Self {
            policy,
            user_text: String::new(),
            active_index: 0,
            hint: None,
            applied_prefix: None,
            snapshot: None,
        }
    }

    pub fn policy(&self) -> &ListPolicy {
        &self.policy
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn set_user_text(&mut self, text: &str) {
        if self.user_text == text {
            return;
        }
        self.user_text = text.to_string();
        if let Some(prefix) = &self.applied_prefix {
            if !self.user_text.starts_with(prefix.as_str()) {
                self.applied_prefix = None;
            }
        }
        self.active_index = 0;
        self.snapshot = None;
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn set_active_index(&mut self, index: usize) {
        if self.active_index != index {
            self.active_index = index;
            self.snapshot = None;
        }
    }

    pub fn did_you_mean_hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn set_did_you_mean_hint(&mut self, hint: Option<String>) {
        if self.hint != hint {
            self.hint = hint;
            self.snapshot = None;
        }
    }

    pub fn applied_prefix(&self) -> Option<&str> {
        self.applied_prefix.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn clear_state(&mut self) {
        self.user_text.clear();
        self.active_index = 0;
        self.hint = None;
        self.applied_prefix = None;
        self.snapshot = None;
    }

    pub fn auto_completion(&mut self, manager: &mut CommandManager) -> &AutoCompletion {
        &self.refresh(manager).auto_completion
    }

    pub fn suggestions(&mut self, manager: &mut CommandManager) -> &[Suggestion] {
        &self.refresh(manager).entries
    }

    pub fn active_suggestion(&mut self, manager: &mut CommandManager) -> Option<Suggestion> {
        let index = self.active_index;
        let entries = &self.refresh(manager).entries;
        if entries.is_empty() {
            return None;
        }
        entries.get(index.min(entries.len() - 1)).cloned()
    }

    pub fn active_command(&mut self, manager: &mut CommandManager) -> Option<SharedCommand> {
        let suggestion = self.active_suggestion(manager)?;
        manager.get_command(suggestion.to_text())
    }

    pub fn active_command_name(&mut self, manager: &mut CommandManager) -> Option<String> {
        let suggestion = self.active_suggestion(manager)?;
        manager
            .get_command(suggestion.to_text())
            .map(|_| suggestion.to_text().to_string())
    }

    pub fn cycle_active_suggestion(&mut self, manager: &mut CommandManager, direction: i32) {
        let len = self.refresh(manager).entries.len();
        if len == 0 {
            return;
        }
        let len = len as i64;
        let current = (self.active_index as i64).min(len - 1);
        let next = (current + i64::from(direction)).rem_euclid(len) as usize;
        self.active_index = next;
    }

    fn refresh(&mut self, manager: &mut CommandManager) -> &Snapshot {
        let snapshot = match self.snapshot.take() {
            Some(snapshot) => snapshot,
            None => self.compute(manager),
        };
        self.snapshot.insert(snapshot)
    }

    fn compute(&mut self, manager: &mut CommandManager) -> Snapshot {
        if self.user_text.is_empty() {
            return Snapshot {
                auto_completion: AutoCompletion::none(""),
                entries: Vec::new(),
            };
        }

        let long_enough = self.user_text.chars().count() >= self.policy.min_autocomplete_chars;
        let mut completion = if long_enough {
            manager.auto_complete(&self.user_text)
        } else {
            None
        };

        if completion.is_none() && long_enough {
            completion = self.apply_calculator_fallback(manager);
        }
        if completion.is_none() && long_enough {
            if let Some(prefix) = self.policy.fallback_prefix.clone() {
                if !self.user_text.starts_with(prefix.as_str()) {
                    completion = manager
                        .auto_complete(&format!("{prefix}{}", self.user_text))
                        .map(|found| found.with_literal_prefix(prefix));
                }
            }
        }

        let query = self.user_text.clone();
        let auto_completion = completion.unwrap_or_else(|| AutoCompletion::none(query.as_str()));
        let head = if auto_completion.has_completion() {
            auto_completion.as_suggestion().clone()
        } else {
            Suggestion::new(query.as_str(), query.as_str())
        };

        let cap = self.policy.max_suggestions.saturating_sub(1);
        let pool = distinct(manager.retrieve_suggestions(&query), &head);
        let mut rest = select_top(pool, cap);

        if rest.len() < cap && self.policy.backfill_with_fallback {
            if let Some(prefix) = &self.policy.fallback_prefix {
                if !query.starts_with(prefix.as_str()) {
                    let extra: Vec<Suggestion> = manager
                        .retrieve_suggestions(&format!("{prefix}{query}"))
                        .into_iter()
                        .map(|found| found.with_literal_prefix(prefix.as_str()))
                        .filter(|found| !rest.contains(found))
                        .collect();
                    let room = cap - rest.len();
                    rest.extend(select_top(distinct(extra, &head), room));
                }
            }
        }

        let mut entries = Vec::with_capacity(rest.len() + 1);
        entries.push(head);
        entries.extend(rest);
        debug!(text = %query, entries = entries.len(), "suggestion list recomputed");
        Snapshot {
            auto_completion,
            entries,
        }
    }

    fn apply_calculator_fallback(&mut self, manager: &mut CommandManager) -> Option<AutoCompletion> {
        let prefix = self.policy.calculator_prefix.clone()?;
        if self.user_text.starts_with(prefix.as_str()) || !looks_numeric(&self.user_text) {
            return None;
        }
        let rewritten = format!("{prefix}{}", self.user_text);
        let completion = manager.auto_complete(&rewritten)?;
        info!(text = %self.user_text, %prefix, "calculator prefix applied");
        self.user_text = rewritten;
        self.applied_prefix = Some(prefix);
        Some(completion)
    }
}

fn looks_numeric(text: &str) -> bool {
    text.trim_start()
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_digit() || "+-*/.(".contains(ch))
}

fn distinct(pool: Vec<Suggestion>, head: &Suggestion) -> Vec<Suggestion> {
    let mut by_text: HashMap<String, Suggestion> = HashMap::new();
    for suggestion in pool {
        if suggestion == *head {
            continue;
        }
        match by_text.get(suggestion.to_text()) {
            Some(existing) if existing.ranking(&suggestion).is_le() => {}
            _ => {
                by_text.insert(suggestion.to_text().to_string(), suggestion);
            }
        }
    }
    by_text.into_values().collect()
}
