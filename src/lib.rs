pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ocr;
pub mod pipeline;
pub mod platform;
pub mod policy;
pub mod probe;
pub mod progress;
pub mod prompt;
pub mod report;
pub mod resources;
pub mod response;
pub mod util;
