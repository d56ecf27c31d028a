pub mod config;
pub mod emit;
pub mod error;
pub mod feed;
pub mod geometry;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod resolve;
pub mod summary;
