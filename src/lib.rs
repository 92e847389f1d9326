//! EZD inflow bridge: register inbound emails as EZD inflow documents.

pub mod config;
pub mod error;
pub mod ezd;
pub mod mailbox;
pub mod models;
