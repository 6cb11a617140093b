//! `sr-cli` — the `searchrelay` command-line front end.

pub mod cli;
