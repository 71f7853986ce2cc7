use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    MacOS,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    /// File name of the Java launcher binary inside `<java home>/bin`.
    pub fn java_binary(&self) -> &'static str {
        match self {
            Platform::Windows => "java.exe",
            Platform::Linux | Platform::MacOS => "java",
        }
    }

    /// Command used to resolve an executable on `PATH`.
    pub fn lookup_command(&self) -> &'static str {
        match self {
            Platform::Windows => "where",
            Platform::Linux | Platform::MacOS => "which",
        }
    }
}
