//! Application services

pub mod dashboard;
