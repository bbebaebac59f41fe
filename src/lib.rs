#![doc(test(attr(deny(warnings))))]

//! Form Core is a terminal-style data-entry form engine: field registry,
//! validation, query-by-example, lists of values and lifecycle triggers,
//! plus a JSON-backed store and an interactive shell to drive them.

pub mod cli;
pub mod config;
pub mod errors;
pub mod form;
pub mod gateway;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Form Core tracing initialized.");
    });
}
