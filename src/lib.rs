//! Turn, selection and clock management for an interactive chess session.
//!
//! [`game::session::SessionController`] is the entry point: feed it taps,
//! clock ticks, resignations and draw offers and read back a
//! [`game::session::SessionView`]. Chess rules come from a
//! [`game::oracle::RulesOracle`]; [`game::oracle::ChessOracle`] provides one
//! backed by the `chess` crate.

pub mod config;
pub mod error;
pub mod game;
pub mod models;
pub mod routes;
pub mod websocket;

pub use error::{ConfigError, SessionError};
