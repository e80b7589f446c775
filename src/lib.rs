// src/lib.rs
pub mod types;
pub mod error;
pub mod codec;
pub mod crypto;
pub mod config;
pub mod store;
pub mod state;
pub mod pos;
pub mod events;
pub mod fees;
pub mod tx;
pub mod stf;
pub mod chain;
