//! Integration tests for glue loading.

mod common;
mod failure_tests;
mod order_tests;
