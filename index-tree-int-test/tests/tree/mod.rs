//! Tree integration tests.
//!
//! These tests exercise whole trees through the public API: every split
//! strategy against brute force, file-backed persistence and recovery from
//! damaged pages.

mod persistence_test;
mod strategy_test;
