use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::renderer::filter::FilterMode;
use crate::scene::camera::OrbitSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_window_size")]
    pub window_size: u32,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default)]
    pub initial_filter: FilterMode,
    #[serde(default)]
    pub wireframe: bool,
    /// Second pass per model projecting it onto the plane.
    #[serde(default)]
    pub planar_shadows: bool,
    #[serde(default)]
    pub camera: OrbitSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            window_size: Self::default_window_size(),
            present_mode: PresentModeSetting::default(),
            initial_filter: FilterMode::default(),
            wireframe: false,
            planar_shadows: false,
            camera: OrbitSettings::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    fn validate(mut self) -> Self {
        if self.window_size == 0 {
            warn!("Window size must be greater than zero. Using default size.");
            self.window_size = Self::default_window_size();
        }

        if !self.initial_filter.is_valid() {
            warn!(
                "Filter mode {} is not selectable. Filtering starts off.",
                self.initial_filter
            );
            self.initial_filter = FilterMode::Off;
        }

        if !(self.camera.rho.is_finite() && self.camera.rho > 0.0) {
            warn!("Camera distance must be positive. Using default camera.");
            self.camera = OrbitSettings::default();
        }

        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    const fn default_window_size() -> u32 {
        600
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            window_size: 0,
            initial_filter: FilterMode::Filtered { blur_iterations: 3 },
            camera: OrbitSettings {
                rho: -1.0,
                ..OrbitSettings::default()
            },
            ..RenderSettings::default()
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();

        assert_eq!(validated.window_size, RenderSettings::default().window_size);
        assert_eq!(validated.initial_filter, FilterMode::Off);
        assert_eq!(validated.camera, OrbitSettings::default());
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            window_size: 800,
            initial_filter: FilterMode::Filtered { blur_iterations: 4 },
            wireframe: true,
            planar_shadows: true,
            ..RenderSettings::default()
        };

        let validated = valid.clone().validate();

        assert_eq!(validated.window_size, 800);
        assert_eq!(validated.initial_filter, valid.initial_filter);
        assert!(validated.wireframe);
        assert!(validated.planar_shadows);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "planar_shadows": true }"#).unwrap();
        assert!(settings.planar_shadows);
        assert_eq!(settings.window_size, 600);
        assert_eq!(settings.initial_filter, FilterMode::Off);
        assert_eq!(settings.camera.rho, 2.6);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings.window_size, 600);
    }

    #[test]
    fn present_mode_returns_desired_when_available() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Mailbox
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }
}
