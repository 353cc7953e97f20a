//! WCA domain: typed payload views, argument handling and the tool/resource catalog
//!
//! Provides the operations a model can call against the WCA REST API.

pub mod models;
pub mod resources;
pub mod tools;
pub mod utils;
