//! Async client for the KVdb key-value store HTTP API
//!
//! The client builds request URLs, credentials and bodies for bucket operations and
//! interprets the responses. The HTTP exchange itself goes through a [`Transport`];
//! [`HyperTransport`] (hyper + rustls) is used unless another one is supplied.
//!
//! # Features
//! - Basic, bearer and query-parameter authentication
//! - Text, binary and JSON values with TTLs
//! - Atomic counters and multi-key transactions
//! - Key listing with prefix, paging and ordering
//! - Access token and bucket policy management
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kvdb_client::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kvdb_client::Error> {
//!     let client = Client::new(ClientConfig::new("my-bucket").with_token("my-token"))?;
//!
//!     // Store a value
//!     client.set("my-key", "Hello, World!", &Default::default()).await?;
//!
//!     // Retrieve a value
//!     let value = client.get("my-key", &Default::default()).await?;
//!     println!("Retrieved: {}", value);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod transport;
pub mod types;

pub use client::{create_bucket_with, Client};
pub use config::{AuthMode, ClientConfig, TransportConfig, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use transport::{HttpRequest, HttpResponse, HyperTransport, Transport};
pub use types::*;
