//! A scripted multi-stage challenge run over Telegram.

pub mod admin;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod quest;
pub mod store;
