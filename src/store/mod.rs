// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snippet-level API over the vector store.

pub mod config;
pub mod connection;
pub mod factory;
pub mod generator;
pub mod table;

pub use config::DbConfig;
pub use connection::DbConnection;
pub use factory::SchemaFactory;
pub use generator::{format_response, SnippetGenerator};
pub use table::{SearchOptions, SnippetTable};
