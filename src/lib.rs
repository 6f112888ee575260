//! Deterministic daily puzzle assembly for anime guessing games.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
