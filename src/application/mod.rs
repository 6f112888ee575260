//! Puzzle assembly services on top of the domain algorithms.

pub mod assembler;
pub mod catalog;
pub mod daily;
pub mod error;
pub mod games;
pub mod history;
pub mod imaging;
pub mod poster_image;
pub mod ports;
