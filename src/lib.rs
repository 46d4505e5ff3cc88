//! Carrier page harvesting, guided BASIC capture and record normalization.
//!
//! The harvester reads a carrier's overview and directory pages, drives the
//! operator through the five safety panels and uploads the snapshots. The
//! parser turns an uploaded snapshot back into typed records.

pub mod config;
pub mod error;
pub mod harvest;
pub mod model;
pub mod parser;
pub mod transport;
