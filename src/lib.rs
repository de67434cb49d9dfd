pub mod activation;
pub mod archive;
pub mod catalog;
pub mod closure;
pub mod commands;
pub mod config;
pub mod error;
pub mod locator;
pub mod package;
pub mod relocate;
pub mod report;
pub mod repository;
pub mod runtime;
pub mod sweep;
