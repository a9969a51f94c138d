use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use quasimode_core::command::{CommandObject, FnCommand};
use quasimode_core::keys::Key;
use quasimode_core::param_suggest::{LatestSlot, SuggestingCommand, SuggestionSource, SuggestionWorker};

const WINDOW: Duration = Duration::from_millis(50);

fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(value) = poll() {
            return Some(value);
        }
        thread::sleep(Duration::from_millis(5));
    }
    None
}

fn recording_source(queries: &Arc<Mutex<Vec<String>>>) -> Arc<dyn SuggestionSource> {
    let queries = Arc::clone(queries);
    Arc::new(move |text: &str| -> Result<Vec<String>, String> {
        queries.lock().unwrap().push(text.to_string());
        Ok(vec![format!("{text}!")])
    })
}

#[test]
fn worker_queries_once_with_the_latest_text_of_a_burst() {
    let queries = Arc::new(Mutex::new(Vec::new()));
    let slot = LatestSlot::new();
    let worker = SuggestionWorker::spawn(recording_source(&queries), WINDOW, slot.clone()).unwrap();

    for text in ["a", "ab", "abc"] {
        assert!(worker.submit(1, text));
    }

    let published = wait_for(|| slot.take()).expect("worker should publish");
    assert_eq!(published, (1, vec!["abc!".to_string()]));
    assert_eq!(*queries.lock().unwrap(), vec!["abc"]);
}

#[test]
fn cancelled_worker_publishes_nothing() {
    let queries = Arc::new(Mutex::new(Vec::new()));
    let slot = LatestSlot::new();
    let worker = SuggestionWorker::spawn(recording_source(&queries), WINDOW, slot.clone()).unwrap();

    assert!(worker.submit(1, "abc"));
    worker.cancel();
    assert!(worker.is_cancelled());
    assert!(!worker.submit(1, "abcd"));

    thread::sleep(WINDOW * 4);
    assert_eq!(slot.peek(), None);
    assert!(queries.lock().unwrap().is_empty());
}

#[test]
fn failed_queries_publish_nothing() {
    let slot: LatestSlot<(u64, Vec<String>)> = LatestSlot::new();
    let source: Arc<dyn SuggestionSource> =
        Arc::new(|_: &str| -> Result<Vec<String>, String> { Err("offline".to_string()) });
    let worker = SuggestionWorker::spawn(source, WINDOW, slot.clone()).unwrap();

    assert!(worker.submit(3, "x"));
    thread::sleep(WINDOW * 4);
    assert_eq!(slot.peek(), None);
    drop(worker);
}

#[test]
fn suggesting_command_keeps_only_the_current_session() {
    let queries = Arc::new(Mutex::new(Vec::new()));
    let inner = FnCommand::new("lookup", "Look something up", || Ok(())).shared();
    let command = SuggestingCommand::new(inner, recording_source(&queries), WINDOW);
    let code = Key::char('x').code();

    assert_eq!(command.name(), "lookup");
    assert_eq!(command.parameter_suggestions(), None);

    command.on_parameter_modified(code, "", "stale", 8);
    command.on_parameter_modified(code, "", "fresh", 9);

    let found = wait_for(|| command.parameter_suggestions()).expect("suggestions should arrive");
    assert_eq!(found, vec!["fresh!"]);
    assert_eq!(*queries.lock().unwrap(), vec!["fresh"]);

    command.on_session_ended(9);
    assert_eq!(command.parameter_suggestions(), None);
}

#[test]
fn suggestions_can_be_dismissed_for_the_session() {
    let queries = Arc::new(Mutex::new(Vec::new()));
    let inner = FnCommand::new("lookup", "Look something up", || Ok(())).shared();
    let command = SuggestingCommand::new(inner, recording_source(&queries), WINDOW);

    command.on_parameter_modified(Key::char('q').code(), "", "q", 1);
    wait_for(|| command.parameter_suggestions()).expect("suggestions should arrive");

    command.set_parameter_suggestions(None);
    assert_eq!(command.parameter_suggestions(), None);
    command.run().unwrap();
}
