//! netsnare - a multi-port TCP honeypot
//!
//! Exposes decoy ports that masquerade as real services:
//! - generic ports capture probe payloads and answer with a fixed rejection
//! - the designated SSH port speaks the real wire protocol and records
//!   every credential pair while rejecting all of them
//! - source addresses are tagged when they belong to VPN/anonymizer networks

pub mod classifier;
pub mod config;
pub mod events;
pub mod handlers;
pub mod keys;
pub mod sink;
pub mod web;
