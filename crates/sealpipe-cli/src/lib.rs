//! Sealpipe command-line front end.
//!
//! Drives the core against a JSON routes file: prints descriptors, encrypts
//! and decrypts messages directly, runs served descriptors the way a remote
//! client would, and opens submissions through the [`Gateway`]. Every
//! command writes one JSON document to its output.
//!
//! ```bash
//! sealpipe --routes routes.json describe my-route > descriptor.json
//! sealpipe evaluate --descriptor descriptor.json "hello" > params.json
//! sealpipe --routes routes.json submit my-route --params "$(cat params.json)"
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod routes;

use std::{convert::Infallible, fs, io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
pub use error::CliError;
pub use routes::{find_route, load_routes};
use sealpipe_core::{
    AcceptedPayload, Environment, Gateway, MemoryRouteStore, NoCache, PayloadHandler,
    PipelineEvaluator, decrypt_payload, encrypt_payload,
};
use sealpipe_proto::PipelineDescriptor;
use serde_json::{Map, Value, json};

/// Sealpipe route tool
#[derive(Parser, Debug)]
#[command(name = "sealpipe")]
#[command(about = "Procedural-value descriptors and sealed-box payloads")]
#[command(version)]
pub struct Cli {
    /// Path to the routes file (JSON array of route records)
    #[arg(long, global = true)]
    pub routes: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Sealpipe subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the current descriptor of a route
    Describe {
        /// Route id
        route: String,
    },

    /// Encrypt a message directly for a route
    Encrypt {
        /// Route id
        route: String,
        /// Message to encrypt
        message: String,
        /// Parse the message as JSON instead of taking it as text
        #[arg(long)]
        json: bool,
    },

    /// Decrypt a transport-encoded ciphertext addressed to a route
    Decrypt {
        /// Route id
        route: String,
        /// Ciphertext as submitted
        ciphertext: String,
    },

    /// Run a served descriptor on a message, as a remote client would
    Evaluate {
        /// Descriptor document file
        #[arg(long)]
        descriptor: PathBuf,
        /// Message to encrypt
        message: String,
        /// Parse the message as JSON instead of taking it as text
        #[arg(long)]
        json: bool,
    },

    /// Open a submission and print the accepted payload
    Submit {
        /// Route id
        route: String,
        /// Request parameters as a JSON object
        #[arg(long)]
        params: String,
    },
}

/// Handler that returns the accepted payload unchanged.
struct Accept;

impl PayloadHandler for Accept {
    type Output = AcceptedPayload;
    type Error = Infallible;

    fn handle(&self, accepted: AcceptedPayload) -> Result<AcceptedPayload, Infallible> {
        Ok(accepted)
    }
}

/// Run one command, writing its JSON result to `out`.
pub fn run<E: Environment, W: Write>(cli: &Cli, env: &E, out: &mut W) -> Result<(), CliError> {
    let result = match &cli.command {
        Command::Describe { route } => {
            let gateway = Gateway::new(store(cli)?, NoCache, env.clone());
            let document = gateway.descriptor(route)?.to_document();
            serde_json::to_value(document)?
        },
        Command::Encrypt { route, message, json } => {
            let route = find_route(&store(cli)?, route)?;
            let message = parse_message(message, *json)?;
            let ciphertext = encrypt_payload(&message, &route.identity, &mut env.rng())?;
            json!({ "route": route.id(), "ciphertext": ciphertext })
        },
        Command::Decrypt { route, ciphertext } => {
            let route = find_route(&store(cli)?, route)?;
            decrypt_payload(ciphertext, &route.identity)?
        },
        Command::Evaluate { descriptor, message, json } => {
            let raw = fs::read_to_string(descriptor)
                .map_err(|source| CliError::Read { path: descriptor.clone(), source })?;
            let descriptor = PipelineDescriptor::from_json(&raw)?;
            let message = parse_message(message, *json)?;
            let output =
                PipelineEvaluator::new().evaluate(&descriptor, &message, env.now(), &mut env.rng())?;

            let mut params = Map::new();
            params.insert(output.param, Value::String(output.value));
            Value::Object(params)
        },
        Command::Submit { route, params } => {
            let Value::Object(params) = serde_json::from_str::<Value>(params)
                .map_err(|err| CliError::InvalidInput(format!("params: {err}")))?
            else {
                return Err(CliError::InvalidInput("params must be a JSON object".to_string()));
            };
            let gateway = Gateway::new(store(cli)?, NoCache, env.clone());
            let accepted = gateway.submit(route, &params, &Accept)?;
            json!({ "route": accepted.route, "payload": accepted.payload, "args": accepted.args })
        },
    };

    writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
    Ok(())
}

fn store(cli: &Cli) -> Result<MemoryRouteStore, CliError> {
    let path = cli.routes.as_deref().ok_or(CliError::RoutesRequired)?;
    load_routes(path)
}

fn parse_message(raw: &str, json: bool) -> Result<Value, CliError> {
    if !json {
        return Ok(Value::String(raw.to_string()));
    }
    serde_json::from_str(raw).map_err(|err| CliError::InvalidInput(format!("message: {err}")))
}
