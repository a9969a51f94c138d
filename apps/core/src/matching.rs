use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostfixMatch {
    pub postfix: String,
    pub offset: usize,
}

#[derive(Debug, Default, Clone)]
pub struct PostfixCorpus {
    postfixes: Vec<String>,
    corpus: String,
    dirty: bool,
}

impl PostfixCorpus {
    pub fn from_postfixes<I, S>(postfixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut corpus = Self::default();
        corpus.set_postfixes(postfixes);
        corpus
    }

    pub fn add(&mut self, postfix: &str) -> bool {
        if postfix.contains('\n') || self.contains(postfix) {
            return false;
        }
        self.postfixes.push(postfix.to_string());
        self.dirty = true;
        true
    }

    pub fn remove(&mut self, postfix: &str) -> bool {
        let before = self.postfixes.len();
        self.postfixes.retain(|existing| existing != postfix);
        let removed = self.postfixes.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn set_postfixes<I, S>(&mut self, postfixes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.postfixes.clear();
        let mut seen = HashSet::new();
        for postfix in postfixes {
            let postfix = postfix.into();
            if !postfix.contains('\n') && seen.insert(postfix.clone()) {
                self.postfixes.push(postfix);
            }
        }
        self.dirty = true;
    }

    pub fn contains(&self, postfix: &str) -> bool {
        self.postfixes.iter().any(|existing| existing == postfix)
    }

    pub fn postfixes(&self) -> &[String] {
        &self.postfixes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn corpus(&mut self) -> &str {
        if self.dirty {
            self.corpus = self.postfixes.join("\n");
            self.dirty = false;
        }
        &self.corpus
    }

    /// Finds every postfix containing `text`, sorted lexicographically.
    /// With `word_boundary_retry`, a miss is retried with the typed words
    /// anchored at word boundaries and separated by any non-alphanumeric run.
    pub fn find_matches(&mut self, text: &str, word_boundary_retry: bool) -> Vec<PostfixMatch> {
        let substring = match compile(&substring_pattern(text)) {
            Some(regex) => regex,
            None => return Vec::new(),
        };
        let corpus = self.corpus();
        let mut matches = scan(corpus, &substring, None);

        if matches.is_empty() && word_boundary_retry {
            if let Some(regex) = word_boundary_pattern(text).as_deref().and_then(compile) {
                matches = scan(corpus, &regex, Some("hit"));
            }
        }

        matches.sort_by(|a, b| a.postfix.cmp(&b.postfix).then(a.offset.cmp(&b.offset)));
        matches
    }
}

fn scan(corpus: &str, regex: &Regex, group: Option<&str>) -> Vec<PostfixMatch> {
    let mut out = Vec::new();
    if corpus.is_empty() {
        return out;
    }
    for line in corpus.split('\n') {
        let offset = match group {
            None => regex.find(line).map(|m| m.start()),
            Some(name) => regex
                .captures(line)
                .and_then(|caps| caps.name(name))
                .map(|m| m.start()),
        };
        if let Some(offset) = offset {
            out.push(PostfixMatch {
                postfix: line.to_string(),
                offset,
            });
        }
    }
    out
}

fn compile(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(error) => {
            warn!(%pattern, %error, "discarding unbuildable match pattern");
            None
        }
    }
}

pub fn shift_twin(ch: char) -> Option<char> {
    const PAIRS: [(char, char); 21] = [
        ('1', '!'),
        ('2', '@'),
        ('3', '#'),
        ('4', '$'),
        ('5', '%'),
        ('6', '^'),
        ('7', '&'),
        ('8', '*'),
        ('9', '('),
        ('0', ')'),
        ('-', '_'),
        ('=', '+'),
        ('[', '{'),
        (']', '}'),
        ('\\', '|'),
        (';', ':'),
        ('\'', '"'),
        (',', '<'),
        ('.', '>'),
        ('/', '?'),
        ('`', '~'),
    ];
    PAIRS.iter().find_map(|&(plain, shifted)| {
        if ch == plain {
            Some(shifted)
        } else if ch == shifted {
            Some(plain)
        } else {
            None
        }
    })
}

pub fn chars_equivalent(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase()) || shift_twin(a) == Some(b)
}

pub fn contains_equivalent(haystack: &str, needle: &str) -> bool {
    let hay: Vec<char> = haystack.chars().collect();
    let pin: Vec<char> = needle.chars().collect();
    find_equivalent(&hay, &pin, 0).is_some()
}

pub fn find_equivalent(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= hay.len()).then_some(from);
    }
    if needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&start| {
        needle
            .iter()
            .zip(&hay[start..start + needle.len()])
            .all(|(&n, &h)| chars_equivalent(n, h))
    })
}

fn char_class(ch: char) -> String {
    let plain = regex::escape(&ch.to_string());
    match shift_twin(ch) {
        Some(twin) => format!("[{plain}{}]", regex::escape(&twin.to_string())),
        None => plain,
    }
}

fn word_pattern(word: &str) -> String {
    word.chars().map(char_class).collect()
}

pub fn substring_pattern(text: &str) -> String {
    let mut pattern = String::new();
    let mut in_spaces = false;
    for ch in text.chars() {
        if ch == ' ' {
            if !in_spaces {
                pattern.push_str(" +");
                in_spaces = true;
            }
            continue;
        }
        in_spaces = false;
        pattern.push_str(&char_class(ch));
    }
    pattern
}

pub fn word_boundary_pattern(text: &str) -> Option<String> {
    let words: Vec<String> = text
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(word_pattern)
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(format!(
        r"(?:^|[^[:alnum:]])(?P<hit>{})",
        words.join(r"[^[:alnum:]]+")
    ))
}
