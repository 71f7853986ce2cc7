pub mod error;
pub mod lines;
pub mod logging;
