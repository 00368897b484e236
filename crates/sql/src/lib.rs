#![doc = include_str!("../README.md")]

//! # SQL capability
//!
//! This crate defines the synchronous prepare/bind/execute/fetch interface
//! used by the ORM layer, together with a default `SQLite` implementation.

#![forbid(unsafe_code)]

pub mod default_impl;
mod resource;
mod types;

pub use crate::default_impl::{ConnectOptions, SqlDefault};
pub use crate::resource::*;
pub use crate::types::{DataType, Field, Row};
