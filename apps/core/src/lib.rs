pub mod command;
pub mod config;
pub mod display;
pub mod expression;
pub mod factory;
pub mod keys;
pub mod logging;
pub mod manager;
pub mod matching;
pub mod param_suggest;
pub mod plugin_manifest;
pub mod quasimode;
pub mod runtime;
pub mod suggestion;
pub mod suggestion_list;
pub mod tasks;
