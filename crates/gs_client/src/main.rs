#![warn(missing_docs)]
#![allow(clippy::type_complexity)]

//! The client binary: parses `client --host HOST --port PORT` and runs the headless core (spec
//! §6). A real renderer is a separate binary embedding [`gs_client::run_client_with_backend`]
//! with its own [`gs_client::meshgen::RenderBackend`]; this binary exists so the core is runnable
//! and testable on its own.

use anyhow::Result;
use clap::Parser;
use gs_client::CliOptions;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let options = CliOptions::parse();
    gs_client::run_client(options)
}
