//! Wellness engagement engine: mood check-ins, wellness scores, challenge
//! recommendations and the points/streak/achievement ledger behind them.
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod services;
pub mod state;
pub mod time_utils;
pub mod web;
