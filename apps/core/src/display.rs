#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub description: String,
    pub auto_completion: String,
    pub suggestions: Vec<String>,
    pub revealed: usize,
    pub active_index: usize,
    pub parameter_popup: Option<ParameterPopup>,
    pub did_you_mean: Option<String>,
}

impl Frame {
    pub fn visible_suggestions(&self) -> &[String] {
        &self.suggestions[..self.revealed.min(self.suggestions.len())]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterPopup {
    pub entries: Vec<String>,
    /// 0 means no entry chosen; `n` selects `entries[n - 1]`.
    pub index: usize,
}

pub trait QuasimodeDisplay {
    fn draw(&mut self, frame: &Frame);

    fn hide(&mut self);

    fn show_message(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Draw(Frame),
    Hide,
    Message(String),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    events: Vec<DisplayEvent>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[DisplayEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<DisplayEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.events.iter().rev().find_map(|event| match event {
            DisplayEvent::Draw(frame) => Some(frame),
            _ => None,
        })
    }

    pub fn messages(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                DisplayEvent::Message(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl QuasimodeDisplay for RecordingDisplay {
    fn draw(&mut self, frame: &Frame) {
        self.events.push(DisplayEvent::Draw(frame.clone()));
    }

    fn hide(&mut self) {
        self.events.push(DisplayEvent::Hide);
    }

    fn show_message(&mut self, message: &str) {
        self.events.push(DisplayEvent::Message(message.to_string()));
    }
}
