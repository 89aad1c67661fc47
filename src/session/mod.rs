//! Editing session management module
//!
//! This module contains:
//! - Session state (history, selection, pending instruction)
//! - Request lifecycle slots and tickets
//! - Message types for the editing shell
//! - User-visible notices

pub mod lifecycle;
pub mod messages;
pub mod notice;
pub mod state;
