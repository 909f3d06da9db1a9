//! Voxdesk - voice and text command assistant
//!
//! Turns natural-language utterances into desktop actions: launching apps,
//! screenshots, typing and clicking, webmail compose, file operations.

pub mod command;
pub mod core;
pub mod llm;
pub mod pipeline;
pub mod platform;
pub mod speech;
