pub mod backend;
pub mod config;
pub mod controller;
pub mod core;
pub mod ipc;
pub mod types;
pub mod utils;

pub use controller::{Controller, ControllerHandle, Request, Response};
pub use utils::error::{LauncherError, Result};
