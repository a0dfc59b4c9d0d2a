//! Command handlers

pub mod category;
pub mod config;
pub mod document;
pub mod library;
