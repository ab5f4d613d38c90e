//! verity: terminal and local-dashboard client for a fake-news
//! classification API.

pub mod analytics;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod web;
