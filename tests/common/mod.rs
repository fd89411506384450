//! Common test utilities for geoprobe integration tests

#[allow(dead_code)]
pub mod fakes;
#[allow(dead_code)]
pub mod harness;

#[allow(unused_imports)]
pub use fakes::*;
#[allow(unused_imports)]
pub use harness::*;
