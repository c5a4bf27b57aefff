//! Operator console shared by every front end.
//!
//! Lines are lexed with `regal`, parsed against the command [`catalog`] with
//! `winnow`, and dispatched onto a [`commands::ControlSurface`]. Everything
//! stays `no_std` and allocation free.

pub mod catalog;
pub mod commands;
pub mod grammar;
