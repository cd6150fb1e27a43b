//! Named MP3 encoding profiles

/// A fixed MP3 encoding profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionProfile {
    /// Stable key used in settings and on the command line
    pub key: &'static str,
    pub label: &'static str,
    /// Constant bitrate handed to the encoder, e.g. `128k`
    pub bitrate: &'static str,
}

pub const PROFILES: [ConversionProfile; 3] = [
    ConversionProfile {
        key: "eco",
        label: "Eco (96 kbps)",
        bitrate: "96k",
    },
    ConversionProfile {
        key: "standard",
        label: "Standard (128 kbps)",
        bitrate: "128k",
    },
    ConversionProfile {
        key: "quality",
        label: "Quality (192 kbps)",
        bitrate: "192k",
    },
];

pub const DEFAULT_PROFILE_KEY: &str = "standard";

impl ConversionProfile {
    /// Look up a profile by key, ignoring case
    pub fn find(key: &str) -> Option<Self> {
        PROFILES
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(key.trim()))
            .copied()
    }

    /// Look up a profile, falling back to the default for unknown keys
    pub fn find_or_default(key: &str) -> Self {
        Self::find(key).unwrap_or_else(|| {
            log::warn!("Unknown profile '{}', using {}", key, DEFAULT_PROFILE_KEY);
            Self::default()
        })
    }

    pub fn keys() -> Vec<&'static str> {
        PROFILES.iter().map(|p| p.key).collect()
    }
}

impl Default for ConversionProfile {
    fn default() -> Self {
        PROFILES[1]
    }
}
