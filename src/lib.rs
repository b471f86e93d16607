#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

pub mod cache;
pub mod channels;
pub mod extractor;
pub mod orchestrator;
pub mod playlist;
pub mod resolver;
pub mod util;
