//! # Authentication Module
//!
//! App-only (client credentials) authentication against the Microsoft
//! identity platform.
//!
//! ## Overview
//!
//! The connector never signs in a user. It authenticates as an application
//! registered in a directory (tenant) and asks for the `.default` scope of
//! Microsoft Graph. This crate holds those credentials, performs the token
//! request through the host [`HttpClient`](bridge_traits::HttpClient), and
//! caches the token until shortly before it expires.
//!
//! ## Features
//!
//! - `TokenProvider` trait so the connector can run against any token source
//! - OAuth 2.0 client credentials grant with in-memory caching
//! - Credentials loaded from the environment with redacted `Debug` output

pub mod credentials;
pub mod error;
pub mod types;

pub use credentials::{ClientCredentialsProvider, TokenProvider};
pub use error::{AuthError, Result};
pub use types::{AccessToken, ClientCredentials};
