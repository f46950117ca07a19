// SPDX-License-Identifier: CEPL-1.0
//! `prism.toml` loading. Missing fields take their defaults and a file that
//! fails to read or parse is reported and replaced by the defaults.
use prism_math::glam::Vec3;
use prism_math::{CameraState, LightRig, Projection};
use prism_render::{FrameConfig, RenderPath, Technique, ViewportMode, VsyncMode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use std::{fs, io};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    #[serde(default = "default_vsync")]
    pub vsync: bool,
    #[serde(default)]
    pub vsync_mode: VsyncModeCfg,
    #[serde(default)]
    pub viewport: ViewportCfg,
    #[serde(default = "default_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default)]
    pub path: PathCfg,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VsyncModeCfg {
    #[default]
    Fifo,
    Mailbox,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewportCfg {
    #[default]
    Baked,
    Dynamic,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathCfg {
    #[default]
    Deferred,
    #[serde(alias = "forward-post", alias = "forward")]
    ForwardPost,
}

impl From<PathCfg> for RenderPath {
    fn from(p: PathCfg) -> Self {
        match p {
            PathCfg::Deferred => RenderPath::Deferred,
            PathCfg::ForwardPost => RenderPath::ForwardPost,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct CameraCfg {
    #[serde(default = "default_fov")]
    pub fov_y_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    #[serde(default = "default_position")]
    pub position: [f32; 3],
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SceneCfg {
    #[serde(default = "default_light_count")]
    pub light_count: u32,
    #[serde(default = "default_technique")]
    pub technique: String,
    #[serde(default)]
    pub lights_animated: bool,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct AppCfg {
    #[serde(default)]
    pub render: RenderCfg,
    #[serde(default)]
    pub camera: CameraCfg,
    #[serde(default)]
    pub scene: SceneCfg,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            vsync: default_vsync(),
            vsync_mode: VsyncModeCfg::Fifo,
            viewport: ViewportCfg::Baked,
            acquire_timeout_ms: default_timeout_ms(),
            path: PathCfg::Deferred,
        }
    }
}

impl Default for CameraCfg {
    fn default() -> Self {
        CameraCfg {
            fov_y_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
            position: default_position(),
        }
    }
}

impl Default for SceneCfg {
    fn default() -> Self {
        SceneCfg {
            light_count: default_light_count(),
            technique: default_technique(),
            lights_animated: false,
        }
    }
}

fn default_clear() -> [f32; 4] {
    prism_render::frame::DEFAULT_CLEAR_COLOR
}
fn default_vsync() -> bool {
    true
}
fn default_timeout_ms() -> u64 {
    prism_render::frame::DEFAULT_TIMEOUT.as_millis() as u64
}
fn default_fov() -> f32 {
    Projection::default().fov_y_degrees
}
fn default_near() -> f32 {
    Projection::default().near
}
fn default_far() -> f32 {
    Projection::default().far
}
fn default_position() -> [f32; 3] {
    CameraState::default().position.to_array()
}
fn default_light_count() -> u32 {
    LightRig::default().active
}
fn default_technique() -> String {
    Technique::default().name().to_owned()
}

impl AppCfg {
    /// Command-line flags win over the file.
    pub fn apply_overrides(&mut self, technique: Option<&str>, no_vsync: bool) {
        if let Some(t) = technique {
            self.scene.technique = t.to_owned();
        }
        if no_vsync {
            self.render.vsync = false;
        }
    }

    pub fn vsync(&self) -> VsyncMode {
        match (self.render.vsync, self.render.vsync_mode) {
            (false, _) => VsyncMode::Off,
            (true, VsyncModeCfg::Fifo) => VsyncMode::Fifo,
            (true, VsyncModeCfg::Mailbox) => VsyncMode::Mailbox,
        }
    }

    /// Unknown names log a warning and keep the default model.
    pub fn technique(&self) -> Technique {
        self.scene.technique.parse().unwrap_or_else(|e| {
            warn!("{e}; using {}", Technique::default());
            Technique::default()
        })
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            vsync: self.vsync(),
            viewport: match self.render.viewport {
                ViewportCfg::Baked => ViewportMode::Baked,
                ViewportCfg::Dynamic => ViewportMode::Dynamic,
            },
            timeout: Duration::from_millis(self.render.acquire_timeout_ms.max(1)),
            clear_color: self.render.clear_color,
            technique: self.technique(),
            path: self.render.path.into(),
        }
    }

    pub fn projection(&self) -> Projection {
        let fallback = Projection::default();
        let c = &self.camera;
        if c.near <= 0.0 || c.far <= c.near || !(1.0..179.0).contains(&c.fov_y_degrees) {
            warn!(
                "camera fov {} near {} far {} rejected; using defaults",
                c.fov_y_degrees, c.near, c.far
            );
            return fallback;
        }
        Projection {
            fov_y_degrees: c.fov_y_degrees,
            near: c.near,
            far: c.far,
        }
    }

    pub fn camera(&self) -> CameraState {
        CameraState::new(Vec3::from_array(self.camera.position), 0.0, 0.0)
    }

    pub fn light_rig(&self) -> LightRig {
        let mut rig = LightRig::default();
        rig.set_active(self.scene.light_count);
        rig.moveable = self.scene.lights_animated;
        rig
    }
}

pub fn parse_cfg(text: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str(text)
}

pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => parse_cfg(&s).unwrap_or_else(|e| {
            warn!("{}: {e}; using defaults", path.display());
            AppCfg::default()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("{} not found; using defaults", path.display());
            AppCfg::default()
        }
        Err(e) => {
            warn!("{}: {e}; using defaults", path.display());
            AppCfg::default()
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
