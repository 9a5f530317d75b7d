//! Poast: a live message board on top of `poast-sync`.
//!
//! [`schema`] and [`rules`] declare the data and who may write it; [`feed`]
//! and [`actions`] are the view and the buttons; [`board`] wires a client
//! to a seeded in-process authority for the command line front end.

pub mod actions;
pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod feed;
pub mod login;
pub mod models;
pub mod rules;
pub mod schema;
pub mod seed;

pub use board::Board;
pub use error::{PoastError, Result};
