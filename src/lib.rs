//! Population dynamics and viability engine.
//!
//! Deterministic and stochastic single-population growth, Monte Carlo
//! population viability analysis, metapopulation dynamics and closed-form
//! genetic estimators. Every entry point takes a validated parameter record
//! and returns an immutable result or a typed [`Error`].

pub mod config;
pub mod engine;
pub mod error;
pub mod estimators;
pub mod manager;
pub mod metapop;
pub mod model;
pub mod monte_carlo;
pub mod params;
pub mod rng;
pub mod stats;
pub mod summary;

pub use error::{Error, Result};
