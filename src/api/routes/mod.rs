//! API Routes Module
//!
//! Route handlers organized by domain:
//! - health: health check and watcher statistics
//! - addresses: watched address management

pub mod addresses;
pub mod health;
