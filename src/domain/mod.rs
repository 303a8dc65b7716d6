//! Core domain types and logic.

pub mod symbol;
pub mod resolution;
pub mod data;
pub mod fundamental;
pub mod slice;
pub mod security;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod algorithm;
pub mod backtest;
pub mod statistics;
pub mod regression;
pub mod fine_fundamental_regression;
pub mod config_validation;
pub mod error;
