//! MonDash library exports

pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod status;
pub mod storage;
pub mod tasks;
pub mod view;
