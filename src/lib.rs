//! Inbox Tasks: turn recent emails into typed, validated task records.

pub mod config;
pub mod error;
pub mod extraction;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod store;
