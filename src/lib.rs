//! Polls a Hubitat hub (or accepts its pushed events) and appends one row per
//! device reading to a Postgres / TimescaleDB table.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod hubitat;
pub mod ingest;
pub mod readings;

#[cfg(test)]
mod testing;
