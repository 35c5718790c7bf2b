//! Configuration module for Chimetrics.
//!
//! This module contains configuration structures shared by the server and
//! the collection layer.

pub mod connection;

pub use connection::{
    ConnectionDefaults, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_QUERY_TIMEOUT,
};
