#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod dataset;
pub mod design;
pub mod loader;
pub mod minibatch;
mod progress;
pub mod registry;
pub mod run;
pub mod sample;
pub mod split;
pub mod table;

// The dense-network driver lives beside the data pipeline and is mounted here.
#[path = "../model/mod.rs"]
pub mod model;
