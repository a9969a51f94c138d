use tracing::debug;

use crate::command::{CommandError, SharedCommand};
use crate::matching::PostfixCorpus;
use crate::suggestion::{AutoCompletion, Suggestion};

pub trait CommandFactory: Send {
    fn prefix(&self) -> &str;

    fn help_text(&self) -> &str;

    fn auto_complete(&mut self, text: &str) -> Option<AutoCompletion>;

    fn retrieve_suggestions(&mut self, text: &str) -> Vec<Suggestion>;

    /// The command named by `text`, if this factory produces one. An error
    /// signals a defect in the factory rather than a mismatch.
    fn command_obj(&mut self, text: &str) -> Result<Option<SharedCommand>, CommandError>;
}

pub trait CommandGenerator: Send {
    fn generate(&self, postfix: &str) -> Result<SharedCommand, CommandError>;
}

impl<F> CommandGenerator for F
where
    F: Fn(&str) -> Result<SharedCommand, CommandError> + Send,
{
    fn generate(&self, postfix: &str) -> Result<SharedCommand, CommandError> {
        self(postfix)
    }
}

/// Pins a closure to the generator signature so its argument lifetime is
/// inferred as higher-ranked.
pub fn generator<F>(build: F) -> F
where
    F: Fn(&str) -> Result<SharedCommand, CommandError> + Send,
{
    build
}

#[derive(Debug, Clone)]
pub enum PostfixPolicy {
    Fixed(PostfixCorpus),
    Arbitrary,
}

pub struct PrefixFactory {
    prefix: String,
    help_text: String,
    policy: PostfixPolicy,
    generator: Box<dyn CommandGenerator>,
}

impl PrefixFactory {
    pub fn fixed<I, S, G>(prefix: &str, help_text: &str, postfixes: I, generator: G) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        G: CommandGenerator + 'static,
    {
        Self {
            prefix: prefix.to_string(),
            help_text: help_text.to_string(),
            policy: PostfixPolicy::Fixed(PostfixCorpus::from_postfixes(postfixes)),
            generator: Box::new(generator),
        }
    }

    pub fn arbitrary<G>(prefix: &str, help_text: &str, generator: G) -> Self
    where
        G: CommandGenerator + 'static,
    {
        Self {
            prefix: prefix.to_string(),
            help_text: help_text.to_string(),
            policy: PostfixPolicy::Arbitrary,
            generator: Box::new(generator),
        }
    }

    pub fn policy(&self) -> &PostfixPolicy {
        &self.policy
    }

    pub fn add_postfix(&mut self, postfix: &str) -> bool {
        match &mut self.policy {
            PostfixPolicy::Fixed(corpus) => corpus.add(postfix),
            PostfixPolicy::Arbitrary => false,
        }
    }

    pub fn remove_postfix(&mut self, postfix: &str) -> bool {
        match &mut self.policy {
            PostfixPolicy::Fixed(corpus) => corpus.remove(postfix),
            PostfixPolicy::Arbitrary => false,
        }
    }

    pub fn set_postfixes<I, S>(&mut self, postfixes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let PostfixPolicy::Fixed(corpus) = &mut self.policy {
            corpus.set_postfixes(postfixes);
        }
    }

    pub fn postfixes(&self) -> &[String] {
        match &self.policy {
            PostfixPolicy::Fixed(corpus) => corpus.postfixes(),
            PostfixPolicy::Arbitrary => &[],
        }
    }
}

impl CommandFactory for PrefixFactory {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn help_text(&self) -> &str {
        &self.help_text
    }

    fn auto_complete(&mut self, text: &str) -> Option<AutoCompletion> {
        match &mut self.policy {
            PostfixPolicy::Fixed(corpus) => {
                complete_from_corpus(&self.prefix, &self.help_text, corpus, text)
            }
            PostfixPolicy::Arbitrary => complete_arbitrary(&self.prefix, &self.help_text, text),
        }
    }

    fn retrieve_suggestions(&mut self, text: &str) -> Vec<Suggestion> {
        match &mut self.policy {
            PostfixPolicy::Fixed(corpus) => {
                suggest_from_corpus(&self.prefix, &self.help_text, corpus, text)
            }
            PostfixPolicy::Arbitrary => complete_arbitrary(&self.prefix, &self.help_text, text)
                .map(AutoCompletion::into_suggestion)
                .into_iter()
                .collect(),
        }
    }

    fn command_obj(&mut self, text: &str) -> Result<Option<SharedCommand>, CommandError> {
        let Some(postfix) = postfix_of(&self.prefix, text) else {
            return Ok(None);
        };
        if let PostfixPolicy::Fixed(corpus) = &self.policy {
            if !corpus.contains(postfix) {
                return Ok(None);
            }
        }
        self.generator.generate(postfix).map(Some)
    }
}

pub(crate) fn postfix_of<'a>(prefix: &str, text: &'a str) -> Option<&'a str> {
    if let Some(postfix) = text.strip_prefix(prefix) {
        return Some(postfix);
    }
    (!prefix.is_empty() && text == prefix.trim_end()).then_some("")
}

fn help_completion(prefix: &str, help_text: &str, text: &str) -> Option<AutoCompletion> {
    AutoCompletion::new(Suggestion::new(text, prefix).with_help(help_text)).ok()
}

pub(crate) fn complete_from_corpus(
    prefix: &str,
    help_text: &str,
    corpus: &mut PostfixCorpus,
    text: &str,
) -> Option<AutoCompletion> {
    if text.is_empty() {
        return None;
    }
    if prefix.starts_with(text) {
        return help_completion(prefix, help_text, text);
    }

    let typed = text.strip_prefix(prefix)?;
    let matches = corpus.find_matches(typed, !prefix.is_empty());
    let first = matches.first()?;
    let suggestion = Suggestion::new(text, format!("{prefix}{}", first.postfix))
        .with_insertion_span(first.offset, first.offset + typed.len());
    match AutoCompletion::new(suggestion) {
        Ok(completion) => Some(completion),
        Err(error) => {
            debug!(%error, "dropping inconsistent autocompletion");
            None
        }
    }
}

pub(crate) fn suggest_from_corpus(
    prefix: &str,
    help_text: &str,
    corpus: &mut PostfixCorpus,
    text: &str,
) -> Vec<Suggestion> {
    let mut out = Vec::new();
    if text.is_empty() {
        return out;
    }
    if prefix.starts_with(text) {
        out.push(Suggestion::new(text, prefix).with_help(help_text));
    }
    if let Some(typed) = text.strip_prefix(prefix) {
        out.extend(
            corpus
                .find_matches(typed, !prefix.is_empty())
                .into_iter()
                .map(|hit| {
                    Suggestion::new(text, format!("{prefix}{}", hit.postfix))
                        .with_insertion_span(hit.offset, hit.offset + typed.len())
                }),
        );
    }
    out
}

fn complete_arbitrary(prefix: &str, help_text: &str, text: &str) -> Option<AutoCompletion> {
    if text.is_empty() {
        return None;
    }
    if prefix.starts_with(text) {
        return help_completion(prefix, help_text, text);
    }
    if text.starts_with(prefix) {
        return AutoCompletion::new(Suggestion::new(text, text)).ok();
    }
    None
}
