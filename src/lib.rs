#![allow(dead_code)]
//! BESS quarter-hour optimizer core: a dynamic-programming scheduler for a home battery energy
//! storage system, driven by day-ahead spot prices, solar/consumption forecasts, and a
//! quarter-hour time grid. See `control_loop::ControlLoop` for the orchestration entry point.

pub mod api;
pub mod config;
pub mod control_loop;
pub mod daily_view;
pub mod domain;
pub mod error;
pub mod failure_tracker;
pub mod intent;
pub mod optimizer;
pub mod ports;
pub mod store;
pub mod telemetry;
pub mod time_grid;
pub mod tou;
