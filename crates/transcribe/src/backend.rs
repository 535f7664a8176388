use std::fmt;
use std::str::FromStr;

use crate::TranscribeError;

/// Speech model family. The two families differ in precision handling and in
/// how long recordings are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeechBackend {
    /// Reference Whisper package (`openai`).
    Whisper,
    /// Generic speech-recognition pipeline (`transformers`).
    Pipeline,
}

impl SpeechBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            SpeechBackend::Whisper => "openai",
            SpeechBackend::Pipeline => "transformers",
        }
    }
}

impl fmt::Display for SpeechBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeechBackend {
    type Err = TranscribeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" | "whisper" => Ok(SpeechBackend::Whisper),
            "transformers" | "pipeline" => Ok(SpeechBackend::Pipeline),
            other => Err(TranscribeError::NotImplemented(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_backends() {
        assert_eq!("openai".parse::<SpeechBackend>().unwrap(), SpeechBackend::Whisper);
        assert_eq!(" Transformers ".parse::<SpeechBackend>().unwrap(), SpeechBackend::Pipeline);
    }

    #[test]
    fn unknown_backend_is_not_implemented() {
        let err = "nemo".parse::<SpeechBackend>().unwrap_err();
        assert!(matches!(err, TranscribeError::NotImplemented(name) if name == "nemo"));
    }
}
