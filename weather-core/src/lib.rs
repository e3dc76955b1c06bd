//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - The current-weather data model and its wire decoding
//! - An HTTP client and a repository seam over it
//! - A query state controller with "latest query wins" publication
//! - Error taxonomy and user-facing classification
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod classify;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod repository;

pub use classify::{ClassifiedError, ErrorCategory, classify};
pub use client::WeatherClient;
pub use config::Config;
pub use controller::{DEFAULT_PLACE, QueryStateController, QueryStatus, StatusUpdate};
pub use error::WeatherError;
pub use model::{
    CloudCover, Coordinates, Measurements, SystemInfo, Units, WeatherCondition, WeatherSnapshot,
    Wind,
};
pub use repository::{DefaultWeatherRepository, WeatherRepository};
