// Library root
// -----------
// This crate backs two binaries: `crowdaq`, which manages annotation
// resources on a crowdaq site, and `crowdaq-mturk`, which launches exams
// on Mechanical Turk and manages worker qualifications.
//
// Module responsibilities:
// - `config`: the local credentials file.
// - `api`: the HTTP client (auth header, login, raw calls).
// - `resource`: resource path resolution and the per-kind accessors.
// - `sync`: incremental download of exam responses.
// - `mturk`: marketplace operations behind the `Marketplace` trait.
// - `ui`, `cli`, `logging`: terminal prompts, argument parsing, tracing.
//
// The binaries stay thin so the logic can be tested without a terminal
// or network access.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mturk;
pub mod resource;
pub mod sync;
pub mod ui;
