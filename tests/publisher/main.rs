//! Publisher facade integration tests against the in-memory broker.

#[path = "../support/mod.rs"]
mod support;

mod concurrency;
mod failures;
mod scenarios;
