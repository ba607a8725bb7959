//! Babushka - relationship advice over a hosted LLM.
//!
//! A small HTTP backend: a situation goes in, a prompt framed by a weighted
//! draw of philosophical traditions goes to the Anthropic Messages API, and
//! the generated advice comes back. Callers with a verified bearer token get
//! their exchanges kept in a process-local log.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;
pub mod providers;

pub mod advice;
pub mod conversation;
pub mod identity;
pub mod philosophy;

pub mod server;
