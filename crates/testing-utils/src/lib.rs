//! # Scheduler Testing Utils
//!
//! Shared testing utilities for the master coordination crates.
//!
//! ## Features
//!
//! - **In-memory Repositories**: implementations of every repository trait
//! - **Registry Fake**: subscription fan-out and cluster locks in memory
//! - **Wake-up Client Fake**: records RPC requests with scripted responses
//! - **Test Data Builders**: Utilities for creating test data
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! scheduler-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
