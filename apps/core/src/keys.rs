pub type KeyCode = u32;

pub const CODE_BACKSPACE: KeyCode = 0x08;
pub const CODE_TAB: KeyCode = 0x09;
pub const CODE_RETURN: KeyCode = 0x0D;
pub const CODE_ESCAPE: KeyCode = 0x1B;
pub const CODE_RIGHT: KeyCode = 0x27;
pub const CODE_UP: KeyCode = 0x26;
pub const CODE_DOWN: KeyCode = 0x28;
pub const CODE_DELETE: KeyCode = 0x2E;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Char { code: KeyCode, ch: char },
    Backspace,
    Delete,
    Up,
    Down,
    Tab,
    Right,
    Return,
    Escape,
    Named(String),
}

impl Key {
    pub fn char(ch: char) -> Self {
        Self::Char {
            code: ch.to_ascii_uppercase() as KeyCode,
            ch,
        }
    }

    pub fn code(&self) -> KeyCode {
        match self {
            Self::Char { code, .. } => *code,
            Self::Backspace => CODE_BACKSPACE,
            Self::Delete => CODE_DELETE,
            Self::Up => CODE_UP,
            Self::Down => CODE_DOWN,
            Self::Tab => CODE_TAB,
            Self::Right => CODE_RIGHT,
            Self::Return => CODE_RETURN,
            Self::Escape => CODE_ESCAPE,
            Self::Named(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid key '{0}': use a single character, a function key F1-F24, or a named key")]
pub struct KeyError(pub String);

pub fn parse_key(input: &str) -> Result<Key, KeyError> {
    let raw = input.trim();
    if raw.is_empty() {
        if input.contains(' ') {
            return Ok(Key::char(' '));
        }
        return Err(KeyError(input.to_string()));
    }

    let mut chars = raw.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_control() {
            return Err(KeyError(input.to_string()));
        }
        return Ok(Key::char(ch));
    }

    let lower = raw.to_ascii_lowercase();
    let key = match lower.as_str() {
        "backspace" | "bksp" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "up" => Key::Up,
        "down" => Key::Down,
        "tab" => Key::Tab,
        "right" => Key::Right,
        "return" | "enter" => Key::Return,
        "escape" | "esc" => Key::Escape,
        "space" => Key::char(' '),
        "capslock" | "caps" => Key::Named("CapsLock".to_string()),
        "insert" | "ins" => Key::Named("Insert".to_string()),
        "scrolllock" => Key::Named("ScrollLock".to_string()),
        "lctrl" | "leftctrl" => Key::Named("LeftCtrl".to_string()),
        "rctrl" | "rightctrl" => Key::Named("RightCtrl".to_string()),
        "lalt" | "leftalt" => Key::Named("LeftAlt".to_string()),
        "ralt" | "rightalt" => Key::Named("RightAlt".to_string()),
        _ => parse_function_key(&lower).ok_or_else(|| KeyError(input.to_string()))?,
    };
    Ok(key)
}

fn parse_function_key(lower: &str) -> Option<Key> {
    let number = lower.strip_prefix('f')?.parse::<u8>().ok()?;
    (1..=24)
        .contains(&number)
        .then(|| Key::Named(format!("F{number}")))
}
