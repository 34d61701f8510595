//! Shared index integration tests.

mod shared_index_test;
