//! # Eco Model Development Tools
//!
//! Command-line tools for development:
//! - Scenario runner (scripted opponents through the model)
//! - Observation log replay

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod replay;
pub mod scenario;
