//! Integration tests for `#[derive(Message)]` live under `tests/`.
