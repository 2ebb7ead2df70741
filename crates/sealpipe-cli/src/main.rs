//! Sealpipe binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve-side: print the current descriptor of a route
//! sealpipe --routes routes.json describe my-route
//!
//! # Client-side: run a descriptor, then submit its output
//! sealpipe evaluate --descriptor descriptor.json "hello"
//! sealpipe --routes routes.json submit my-route --params '{"payload": "..."}'
//! ```

use std::io;

use clap::Parser;
use sealpipe_cli::{Cli, run};
use sealpipe_core::SystemEnv;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    tracing::debug!("sealpipe starting");

    let mut stdout = io::stdout().lock();
    run(&cli, &SystemEnv::new(), &mut stdout)?;

    Ok(())
}
