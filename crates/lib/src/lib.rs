//! hfbot core library: message formatting, event classification, prompts and
//! inference used by the CLI and the Matrix adapter.

pub mod config;
pub mod content;
pub mod conversation;
pub mod event;
pub mod handler;
pub mod inference;
pub mod init;
pub mod markdown;
pub mod messaging;
pub mod prompt;
pub mod username;
