pub mod adapters;
pub mod config;
pub mod controllers;
pub mod error;
pub mod i18n;
pub mod render;
pub mod session;
pub mod shell;
