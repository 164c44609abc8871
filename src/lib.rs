//! Short-term load profile forecasting.
//!
//! Turns an aggregate power series (plus optional weather and holiday
//! calendars) into fixed-shape supervised examples, partitions and
//! normalizes them, and trains and evaluates a family of forecasting
//! models on the result.

pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod runner;
pub mod simulation;
pub mod telemetry;

pub use error::{ForecastError, Result};
