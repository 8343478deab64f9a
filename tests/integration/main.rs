//! Integration tests

mod fixtures;
mod pipeline_tests;
