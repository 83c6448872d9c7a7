//! Platform detection for the Piper release download.

use thiserror::Error;

/// Errors related to platform detection.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArch(String),
}

/// Supported operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    MacOs,
    Linux,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::MacOs => "macOS",
            Os::Linux => "Linux",
        }
    }
}

/// Supported CPU architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }
}

/// Platform target for downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    /// Detect the current platform.
    pub fn detect() -> Result<Self, PlatformError> {
        let os = if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(target_os = "linux") {
            Os::Linux
        } else {
            return Err(PlatformError::UnsupportedOs(
                std::env::consts::OS.to_string(),
            ));
        };

        let arch = if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else {
            return Err(PlatformError::UnsupportedArch(
                std::env::consts::ARCH.to_string(),
            ));
        };

        Ok(Platform { os, arch })
    }

    /// Name of the Piper release archive for this platform.
    ///
    /// Examples: "piper_linux_x86_64.tar.gz", "piper_macos_aarch64.tar.gz"
    pub fn piper_asset_name(&self) -> &'static str {
        match (self.os, self.arch) {
            (Os::Linux, Arch::X86_64) => "piper_linux_x86_64.tar.gz",
            (Os::Linux, Arch::Aarch64) => "piper_linux_aarch64.tar.gz",
            (Os::MacOs, Arch::X86_64) => "piper_macos_x64.tar.gz",
            (Os::MacOs, Arch::Aarch64) => "piper_macos_aarch64.tar.gz",
        }
    }

    /// Get a string representation for version tracking.
    pub fn to_version_string(&self) -> String {
        format!("{}-{}", self.os.as_str(), self.arch.as_str())
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.os.as_str(), self.arch.as_str())
    }
}
