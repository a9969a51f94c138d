use std::io::{Read, Write};
use std::path::PathBuf;

use tracing::{error, info};

use crate::command::CommandError;
use crate::config::{self, ConfigError};
use crate::display::{DisplayEvent, RecordingDisplay};
use crate::keys::{parse_key, Key, KeyError};
use crate::logging::{self, LoggingError};
use crate::manager::CommandManager;
use crate::plugin_manifest::{self, MessageLog};
use crate::quasimode::{Quasimode, SessionOutcome};

const USAGE: &str = "usage: quasimode-core [--config <path>] [--script <path>] [--help]\n\
script lines: down | up | key <name> | type <text> | tick <ms> | cancel";

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub script_path: Option<PathBuf>,
    pub show_help: bool,
}

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, String> {
    let mut options = RuntimeOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => options.show_help = true,
            "--config" => {
                let value = iter.next().ok_or("--config requires a path")?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--script" => {
                let value = iter.next().ok_or("--script requires a path")?;
                options.script_path = Some(PathBuf::from(value));
            }
            other => {
                if let Some(value) = other.strip_prefix("--config=") {
                    options.config_path = Some(PathBuf::from(value));
                } else if let Some(value) = other.strip_prefix("--script=") {
                    options.script_path = Some(PathBuf::from(value));
                } else {
                    return Err(format!("unknown argument '{other}'\n{USAGE}"));
                }
            }
        }
    }
    Ok(options)
}

pub fn run_with_options(options: RuntimeOptions) -> Result<(), RuntimeError> {
    if options.show_help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = config::load(options.config_path.as_deref())?;
    logging::init(&config.log_level)?;
    println!(
        "[quasimode-core] startup trigger={} config_path={}",
        config.trigger_key,
        config.config_path.display()
    );

    let mut manager = CommandManager::new().with_priority_overrides(config.priority_overrides());
    let messages = MessageLog::default();
    let report = plugin_manifest::load_into(&mut manager, &config.command_manifest_paths, &messages);
    println!(
        "[quasimode-core] manifests loaded={} commands={} warnings={}",
        report.manifests_loaded,
        report.registered.len(),
        report.warnings.len()
    );
    for warning in &report.warnings {
        println!("[quasimode-core] warning: {warning}");
    }

    let mut quasimode = Quasimode::from_config(&config, manager, RecordingDisplay::new())?;
    let script = match &options.script_path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_script(&mut quasimode, &script, &messages, &mut out)?;
    info!("script finished");
    Ok(())
}

pub fn run_script<W: Write>(
    quasimode: &mut Quasimode<RecordingDisplay>,
    script: &str,
    messages: &MessageLog,
    out: &mut W,
) -> Result<(), RuntimeError> {
    let mut clock_ms: u64 = 0;
    for (index, raw_line) in script.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let script_error = |message: String| RuntimeError::Script {
            line: index + 1,
            message,
        };

        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let result = match verb {
            "down" => quasimode.on_trigger_down(clock_ms),
            "up" => quasimode.on_trigger_up(clock_ms),
            "cancel" => Ok(quasimode.on_cancel()),
            "key" => {
                let key = parse_key(rest).map_err(|e: KeyError| script_error(e.to_string()))?;
                quasimode.on_key(key)
            }
            "type" => type_text(quasimode, rest),
            "tick" => {
                let ms = rest
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| script_error(format!("invalid tick '{rest}': {e}")))?;
                clock_ms = clock_ms.saturating_add(ms);
                quasimode.on_tick(ms);
                Ok(None)
            }
            other => return Err(script_error(format!("unknown verb '{other}'"))),
        };

        match result {
            Ok(Some(outcome)) => writeln!(out, "{}", describe_outcome(&outcome))?,
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "session ended with a failed command");
                writeln!(out, "command failed: {e}")?;
            }
        }
        for event in quasimode.display_mut().take_events() {
            writeln!(out, "{}", describe_event(&event))?;
        }
        for message in messages.drain() {
            writeln!(out, "output: {message}")?;
        }
    }
    Ok(())
}

fn type_text(
    quasimode: &mut Quasimode<RecordingDisplay>,
    text: &str,
) -> Result<Option<SessionOutcome>, CommandError> {
    for ch in text.chars() {
        if let Some(outcome) = quasimode.on_key(Key::char(ch))? {
            return Ok(Some(outcome));
        }
    }
    Ok(None)
}

fn describe_outcome(outcome: &SessionOutcome) -> String {
    match outcome {
        SessionOutcome::Executed { command } => format!("executed: {command}"),
        SessionOutcome::NotACommand { text, hint: Some(hint) } => {
            format!("not a command: {text} (did you mean {hint})")
        }
        SessionOutcome::NotACommand { text, hint: None } => format!("not a command: {text}"),
        SessionOutcome::Dismissed => "dismissed".to_string(),
        SessionOutcome::Cancelled => "cancelled".to_string(),
    }
}

fn describe_event(event: &DisplayEvent) -> String {
    match event {
        DisplayEvent::Draw(frame) => {
            let mut line = format!("draw: {}", frame.auto_completion);
            if !frame.description.is_empty() {
                line.push_str(&format!(" | {}", frame.description));
            }
            for (index, suggestion) in frame.visible_suggestions().iter().enumerate() {
                let marker = if index + 1 == frame.active_index { '>' } else { '-' };
                line.push_str(&format!("\n  {marker} {suggestion}"));
            }
            if let Some(popup) = &frame.parameter_popup {
                line.push_str(&format!("\n  popup[{}]: {}", popup.index, popup.entries.join(", ")));
            }
            line
        }
        DisplayEvent::Hide => "hide".to_string(),
        DisplayEvent::Message(message) => format!("message: {message}"),
    }
}
