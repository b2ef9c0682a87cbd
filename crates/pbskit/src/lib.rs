//! # pbskit
//!
//! Client side of the Proxmox Backup Server configuration API.
//!
//! This crate provides:
//! - The [`Api`] trait: synchronous `get`/`post`/`put`/`delete` on JSON
//! - [`HttpApi`], a blocking implementation over `ureq` with API token auth
//! - [`MockApi`], an in-memory server that enforces digests, for tests
//! - [`ApiError`], classifying failures into not-found, validation,
//!   conflict and transport errors
//! - [`ApiPath`] and [`CancelToken`]
//!
//! ## Example
//!
//! ```no_run
//! use pbskit::{Api, ApiPath, ClientOptions, HttpApi};
//! use serde_json::json;
//!
//! let api = HttpApi::new(&ClientOptions::new("https://pbs.example.com:8007", "root@pam!t=secret"))
//!     .expect("invalid endpoint");
//! api.post(
//!     &ApiPath::parse("/config/remote"),
//!     &json!({"name": "offsite", "host": "pbs2.example.com", "auth-id": "sync@pbs"}),
//! )
//! .expect("create failed");
//! ```

#![warn(clippy::all)]

pub mod cancel;
pub mod client;
pub mod error;
pub mod http;
pub mod mock;
pub mod path;

pub use cancel::CancelToken;
pub use client::{Api, Method};
pub use error::{ApiError, ErrorCategory, Result};
pub use http::{ClientOptions, DEFAULT_TIMEOUT, HttpApi};
pub use mock::{MockApi, Request};
pub use path::ApiPath;
