use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::manager::RegistryError;

#[derive(Debug, Clone)]
pub struct CommandExpression {
    normalized: String,
    prefix: String,
    argument: Option<String>,
}

impl CommandExpression {
    pub fn parse(input: &str) -> Result<Self, RegistryError> {
        let normalized = normalize_expression(input);
        if normalized.is_empty() {
            return Err(malformed(input, "expression is empty"));
        }

        let Some(open) = normalized.find('{') else {
            if normalized.contains('}') {
                return Err(malformed(input, "unbalanced '}'"));
            }
            return Ok(Self {
                prefix: normalized.clone(),
                normalized,
                argument: None,
            });
        };

        if !normalized.ends_with('}') {
            return Err(malformed(input, "placeholder must be at the end"));
        }

        let argument = &normalized[open + 1..normalized.len() - 1];
        if argument.contains('{') || argument.contains('}') {
            return Err(malformed(input, "only one placeholder is allowed"));
        }
        if argument.trim().is_empty() {
            return Err(malformed(input, "placeholder name is empty"));
        }

        let prefix = &normalized[..open];
        if prefix.contains('}') {
            return Err(malformed(input, "unbalanced '}'"));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            argument: Some(argument.to_string()),
            normalized: normalized.clone(),
        })
    }

    pub(crate) fn catch_all(argument: &str) -> Self {
        Self {
            normalized: format!("{{{argument}}}"),
            prefix: String::new(),
            argument: Some(argument.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn has_argument(&self) -> bool {
        self.argument.is_some()
    }

    pub fn argument_name(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.has_argument() {
            (text.starts_with(&self.prefix) && text.len() > self.prefix.len())
                || text == self.prefix.trim_end()
        } else {
            text == self.normalized
        }
    }
}

impl PartialEq for CommandExpression {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for CommandExpression {}

impl Hash for CommandExpression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl Display for CommandExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

fn normalize_expression(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn malformed(input: &str, reason: &str) -> RegistryError {
    RegistryError::MalformedExpression {
        expression: input.to_string(),
        reason: reason.to_string(),
    }
}
