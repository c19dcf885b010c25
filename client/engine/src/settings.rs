use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{fmt, fs, io};

pub const DEFAULT_SHADER_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/res/shaders");

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Parse(serde_yaml::Error),
}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        SettingsError::Io(err)
    }
}

impl From<serde_yaml::Error> for SettingsError {
    fn from(err: serde_yaml::Error) -> Self {
        SettingsError::Parse(err)
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "failed to read settings: {}", e),
            SettingsError::Parse(e) => write!(f, "invalid settings: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub frames_in_flight: u32,
    pub render_threads: usize,
    pub asset_threads: usize,
    pub vsync: bool,
    pub validation: bool,
    pub shader_dir: PathBuf,
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            render_threads: 2,
            asset_threads: 2,
            vsync: true,
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from(DEFAULT_SHADER_DIR),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RenderSettings {
    pub fn from_yaml_str(s: &str) -> Result<Self, SettingsError> {
        let settings: RenderSettings = serde_yaml::from_str(s)?;
        Ok(settings.sanitized())
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let data = fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    /// Worker pools and frame rotation need at least one of each.
    pub fn sanitized(mut self) -> Self {
        self.frames_in_flight = self.frames_in_flight.max(1);
        self.render_threads = self.render_threads.max(1);
        self.asset_threads = self.asset_threads.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings = RenderSettings::from_yaml_str("render_threads: 4\nvsync: false\n").unwrap();
        assert_eq!(settings.render_threads, 4);
        assert!(!settings.vsync);
        assert_eq!(settings.frames_in_flight, 3);
        assert_eq!(settings.asset_threads, 2);
        assert_relative_eq!(settings.clear_color[3], 1.0);
    }

    #[test]
    fn zero_counts_are_clamped() {
        let settings =
            RenderSettings::from_yaml_str("frames_in_flight: 0\nrender_threads: 0\nasset_threads: 0\n").unwrap();
        assert_eq!(settings.frames_in_flight, 1);
        assert_eq!(settings.render_threads, 1);
        assert_eq!(settings.asset_threads, 1);
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            RenderSettings::from_yaml_str("frames_in_flight: [1, 2"),
            Err(SettingsError::Parse(_))
        ));
    }
}
