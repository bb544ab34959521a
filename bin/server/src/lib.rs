//! parley web server.
//!
//! This crate hosts the Slack Events API endpoint and wires the relay
//! engine to the OpenAI, Slack and Google Search clients.

pub mod config;
pub mod db;
pub mod error;
pub mod provision;
pub mod routes;
pub mod signature;
