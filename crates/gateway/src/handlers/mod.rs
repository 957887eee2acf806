//! API handlers module

pub mod feed;
pub mod health;
