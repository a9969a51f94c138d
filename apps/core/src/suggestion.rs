use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use crate::matching::{chars_equivalent, contains_equivalent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuggestionError {
    #[error("token '{token}' of '{source_text}' does not occur in completion '{suggested}'")]
    TokenMismatch {
        token: String,
        source_text: String,
        suggested: String,
    },
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    source: String,
    suggested: String,
    help_text: Option<String>,
    insertion_span: Option<(usize, usize)>,
    literal_prefix: Option<String>,
    nearness: f64,
}

impl Suggestion {
    pub fn new(source: impl Into<String>, suggested: impl Into<String>) -> Self {
        let source = source.into();
        let suggested = suggested.into();
        let nearness = nearness(&source, &suggested);
        Self {
            source,
            suggested,
            help_text: None,
            insertion_span: None,
            literal_prefix: None,
            nearness,
        }
    }

    pub fn with_help(mut self, help_text: impl Into<String>) -> Self {
        let help_text = help_text.into();
        self.help_text = (!help_text.is_empty()).then_some(help_text);
        self
    }

    pub fn with_insertion_span(mut self, start: usize, end: usize) -> Self {
        self.insertion_span = Some((start, end));
        self
    }

    pub fn with_literal_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() && self.suggested.starts_with(&prefix) {
            self.literal_prefix = Some(prefix);
        }
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn to_text(&self) -> &str {
        &self.suggested
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    pub fn insertion_span(&self) -> Option<(usize, usize)> {
        self.insertion_span
    }

    pub fn literal_prefix(&self) -> Option<&str> {
        self.literal_prefix.as_deref()
    }

    pub fn nearness(&self) -> f64 {
        self.nearness
    }

    pub fn ranking(&self, other: &Self) -> Ordering {
        other
            .nearness
            .total_cmp(&self.nearness)
            .then_with(|| self.suggested.cmp(&other.suggested))
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        let (source, suggested) = match &self.literal_prefix {
            Some(prefix) => {
                push_tagged(&mut out, "prefix", prefix);
                (
                    self.source.strip_prefix(prefix.as_str()).unwrap_or(&self.source),
                    &self.suggested[prefix.len()..],
                )
            }
            None => (self.source.as_str(), self.suggested.as_str()),
        };

        for span in diff(source, suggested) {
            match span {
                Span::Literal(text) => out.push_str(&escape(&text)),
                Span::Inserted(text) => push_tagged(&mut out, "ins", &text),
                Span::Altered(text) => push_tagged(&mut out, "alt", &text),
            }
        }

        if let Some(help) = &self.help_text {
            push_tagged(&mut out, "help", help);
        }
        out
    }
}

impl PartialEq for Suggestion {
    fn eq(&self, other: &Self) -> bool {
        self.suggested == other.suggested
    }
}

impl Eq for Suggestion {}

impl Hash for Suggestion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.suggested.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AutoCompletion(Suggestion);

impl AutoCompletion {
    pub fn new(suggestion: Suggestion) -> Result<Self, SuggestionError> {
        if !suggestion.suggested.is_empty() {
            for token in source_tokens(&suggestion.source) {
                if !contains_equivalent(&suggestion.suggested, token) {
                    return Err(SuggestionError::TokenMismatch {
                        token: token.to_string(),
                        source_text: suggestion.source.clone(),
                        suggested: suggestion.suggested.clone(),
                    });
                }
            }
        }
        Ok(Self(suggestion))
    }

    pub fn none(source: impl Into<String>) -> Self {
        Self(Suggestion::new(source, ""))
    }

    pub fn with_literal_prefix(self, prefix: impl Into<String>) -> Self {
        Self(self.0.with_literal_prefix(prefix))
    }

    pub fn has_completion(&self) -> bool {
        !self.0.suggested.is_empty()
    }

    pub fn as_suggestion(&self) -> &Suggestion {
        &self.0
    }

    pub fn into_suggestion(self) -> Suggestion {
        self.0
    }
}

impl Deref for AutoCompletion {
    type Target = Suggestion;

    fn deref(&self) -> &Suggestion {
        &self.0
    }
}

pub fn nearness(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase()).clamp(0.0, 1.0)
}

pub fn select_top(mut suggestions: Vec<Suggestion>, limit: usize) -> Vec<Suggestion> {
    if limit == 0 {
        return Vec::new();
    }
    if suggestions.len() > limit {
        suggestions.select_nth_unstable_by(limit - 1, Suggestion::ranking);
        suggestions.truncate(limit);
    }
    suggestions.sort_by(Suggestion::ranking);
    suggestions
}

pub fn best<'a, I>(suggestions: I) -> Option<&'a Suggestion>
where
    I: IntoIterator<Item = &'a Suggestion>,
{
    suggestions.into_iter().min_by(|a, b| a.ranking(b))
}

/// Plain text of a markup string with `<help>` spans dropped and entities
/// decoded. For any suggestion, `markup_text(&s.to_xml()) == s.to_text()`.
pub fn markup_text(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;
    let mut in_help = false;
    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            let Some(close) = rest.find('>') else {
                break;
            };
            match &rest[1..close] {
                "help" => in_help = true,
                "/help" => in_help = false,
                _ => {}
            }
            rest = &rest[close + 1..];
            continue;
        }
        if ch == '&' {
            if let Some((decoded, len)) = decode_entity(rest) {
                if !in_help {
                    out.push(decoded);
                }
                rest = &rest[len..];
                continue;
            }
        }
        if !in_help {
            out.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }
    out
}

fn decode_entity(input: &str) -> Option<(char, usize)> {
    [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>')]
        .iter()
        .find(|(entity, _)| input.starts_with(entity))
        .map(|&(entity, ch)| (ch, entity.len()))
}

fn source_tokens(source: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for word in source.split_whitespace() {
        match word.strip_suffix('?') {
            Some(stem) if !stem.is_empty() => {
                tokens.push(stem);
                tokens.push("?");
            }
            _ => tokens.push(word),
        }
    }
    tokens
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn push_tagged(out: &mut String, tag: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&escape(text));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Span {
    Literal(String),
    Inserted(String),
    Altered(String),
}

fn diff(source: &str, suggested: &str) -> Vec<Span> {
    let source: Vec<char> = source.chars().collect();
    let suggested: Vec<char> = suggested.chars().collect();
    let mut spans = Vec::new();
    let mut src = 0;
    let mut sug = 0;
    let mut skipped = false;

    while src < source.len() {
        let Some((pos, len)) = longest_match(&source[src..], &suggested, sug) else {
            skipped = true;
            src += 1;
            continue;
        };
        if pos > sug {
            let gap: String = suggested[sug..pos].iter().collect();
            spans.push(if skipped {
                Span::Altered(gap)
            } else {
                Span::Inserted(gap)
            });
        }
        spans.push(Span::Literal(suggested[pos..pos + len].iter().collect()));
        skipped = false;
        sug = pos + len;
        src += len;
    }

    if sug < suggested.len() {
        let tail: String = suggested[sug..].iter().collect();
        spans.push(if skipped {
            Span::Altered(tail)
        } else {
            Span::Inserted(tail)
        });
    }
    spans
}

/// Longest prefix of `source` found in `suggested[from..]`, as an absolute
/// position and a length. A word-boundary occurrence wins over an earlier
/// plain one.
fn longest_match(source: &[char], suggested: &[char], from: usize) -> Option<(usize, usize)> {
    for len in (1..=source.len()).rev() {
        let needle = &source[..len];
        let Some(first) = find_from(suggested, needle, from) else {
            continue;
        };
        let mut candidate = Some(first);
        while let Some(pos) = candidate {
            if at_word_boundary(suggested, pos) {
                return Some((pos, len));
            }
            candidate = find_from(suggested, needle, pos + 1);
        }
        return Some((first, len));
    }
    None
}

fn find_from(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > hay.len() || from > hay.len() - needle.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&start| {
        needle
            .iter()
            .zip(&hay[start..start + needle.len()])
            .all(|(&n, &h)| chars_equivalent(n, h))
    })
}

fn at_word_boundary(text: &[char], pos: usize) -> bool {
    pos == 0 || !text[pos - 1].is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::{diff, source_tokens, Span};

    #[test]
    fn trailing_question_mark_is_its_own_token() {
        assert_eq!(source_tokens("what is this?"), vec!["what", "is", "this", "?"]);
        assert_eq!(source_tokens("?"), vec!["?"]);
    }

    #[test]
    fn skipped_source_turns_insertion_into_alteration() {
        let spans = diff("oxen", "open");
        assert_eq!(
            spans,
            vec![
                Span::Literal("o".to_string()),
                Span::Altered("p".to_string()),
                Span::Literal("en".to_string()),
            ]
        );
    }

    #[test]
    fn word_boundary_occurrence_beats_earlier_plain_one() {
        let spans = diff("f", "offline files");
        assert_eq!(
            spans,
            vec![
                Span::Inserted("offline ".to_string()),
                Span::Literal("f".to_string()),
                Span::Inserted("iles".to_string()),
            ]
        );
    }
}
