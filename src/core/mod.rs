//! Core application module
//!
//! This module contains:
//! - The `App` state container and its event loop
//! - The stdin command parser
//! - Message handlers and the `Task` type they return

pub mod app;
pub mod control;
pub mod handlers;
pub mod task;
