use std::str::FromStr;

/// Parse a permissive boolean (`1/true/t/yes/y/on`, `0/false/f/no/n/off`).
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// When to ask the model runtime to drop cached accelerator memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    Always,
    Never,
    /// Only on `mps`, whose allocator keeps large buffers across calls.
    #[default]
    Auto,
}

impl CleanupPolicy {
    pub fn should_cleanup(self, device: &str) -> bool {
        match self {
            CleanupPolicy::Always => true,
            CleanupPolicy::Never => false,
            CleanupPolicy::Auto => device == "mps",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CleanupPolicy::Always => "always",
            CleanupPolicy::Never => "never",
            CleanupPolicy::Auto => "auto",
        }
    }
}

impl FromStr for CleanupPolicy {
    type Err = std::convert::Infallible;

    /// Anything that is neither truthy nor falsy means `Auto`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match parse_flag(raw) {
            Some(true) => CleanupPolicy::Always,
            Some(false) => CleanupPolicy::Never,
            None => CleanupPolicy::Auto,
        })
    }
}
