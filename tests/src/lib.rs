//! # Trellis Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── dispatch_benchmarks.rs  # Sync vs concurrent fan-out, load order
//! └── src/
//!     └── integration/            # Registry and bus working together
//!         ├── lifecycle.rs
//!         └── choreography.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p trellis-tests
//!
//! # By category
//! cargo test -p trellis-tests integration::lifecycle
//! cargo test -p trellis-tests integration::choreography
//!
//! # Benchmarks
//! cargo bench -p trellis-tests
//! ```

pub mod integration;
