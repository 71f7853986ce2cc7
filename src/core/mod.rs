pub mod auth;
pub mod fs;
pub mod install;
pub mod java;
pub mod launch;
pub mod settings;
