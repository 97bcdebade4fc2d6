/// Command line configuration
use std::path::PathBuf;
use std::time::Duration;

use offview_core::NormalWeighting;
use structopt::StructOpt;

use crate::renderer::ShadingMode;

#[derive(StructOpt, Debug, Clone)]
#[structopt(name = "offview", about = "Interactive terminal viewer for OFF meshes")]
pub struct ViewerConfig {
    /// OFF file to display. A built-in cube is shown when omitted
    #[structopt(parse(from_os_str))]
    pub mesh: Option<PathBuf>,
    /// Weight face normals by their corner angle instead of uniformly
    #[structopt(long = "angle-weighted")]
    pub angle_weighted: bool,
    /// Vertical field of view, in degrees
    #[structopt(long, default_value = "45")]
    pub fov: f32,
    /// Target frame rate
    #[structopt(long, default_value = "30")]
    pub fps: u32,
    /// Initial shading: lambert, checker (uv) or normals
    #[structopt(long, default_value = "lambert")]
    pub shading: ShadingMode,
    /// Output debug info
    #[structopt(long = "verbose")]
    pub verbose: bool,
}

impl ViewerConfig {
    pub fn normal_weighting(&self) -> NormalWeighting {
        if self.angle_weighted {
            NormalWeighting::AngleBased
        } else {
            NormalWeighting::Uniform
        }
    }

    pub fn frame_time(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            mesh: None,
            angle_weighted: false,
            fov: 45.0,
            fps: 30,
            shading: ShadingMode::Lambert,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let parsed = ViewerConfig::from_iter(&["offview"]);
        let default = ViewerConfig::default();
        assert_eq!(parsed.mesh, default.mesh);
        assert_eq!(parsed.fov, default.fov);
        assert_eq!(parsed.fps, default.fps);
        assert_eq!(parsed.shading, default.shading);
        assert_eq!(parsed.normal_weighting(), NormalWeighting::Uniform);
    }

    #[test]
    fn test_parse_full_command_line() {
        let config = ViewerConfig::from_iter(&[
            "offview",
            "bunny.off",
            "--angle-weighted",
            "--fov",
            "60",
            "--fps",
            "20",
            "--shading",
            "uv",
        ]);
        assert_eq!(config.mesh, Some(PathBuf::from("bunny.off")));
        assert_eq!(config.normal_weighting(), NormalWeighting::AngleBased);
        assert_eq!(config.fov, 60.0);
        assert_eq!(config.frame_time(), Duration::from_millis(50));
        assert_eq!(config.shading, ShadingMode::Checker);
    }

    #[test]
    fn test_rejects_unknown_shading() {
        assert!(ViewerConfig::from_iter_safe(&["offview", "--shading", "phong"]).is_err());
    }
}
