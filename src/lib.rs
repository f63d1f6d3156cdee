// lib.rs - Library exports for the binaries and integration tests

pub mod config;
pub mod bootstrap;
pub mod error;
pub mod chain;
pub mod math;
pub mod engine;
pub mod web;
