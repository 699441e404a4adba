//! Run configuration – reads/writes `~/.gyrofuse/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use gyrofuse_middleware::SimulationProfile;
use gyrofuse_types::{FusionConfig, ProviderKind, Vec3};
use serde::{Deserialize, Serialize};

/// Synthetic sensor settings (`[simulation]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_gyroscope_hz")]
    pub gyroscope_hz: f32,
    #[serde(default = "default_reference_hz")]
    pub accelerometer_hz: f32,
    #[serde(default = "default_reference_hz")]
    pub magnetometer_hz: f32,
    #[serde(default = "default_reference_hz")]
    pub gravity_hz: f32,
    #[serde(default = "default_reference_hz")]
    pub rotation_vector_hz: f32,
    /// Degrees per second.
    #[serde(default = "default_yaw_rate_dps")]
    pub yaw_rate_dps: f32,
    /// Seconds held still before turning; covers the calibration window.
    #[serde(default = "default_stationary_s")]
    pub stationary_s: f32,
    /// rad/s, per axis.
    #[serde(default = "default_gyro_bias")]
    pub gyro_bias: [f32; 3],
    #[serde(default = "default_reference_noise")]
    pub reference_noise: f32,
}

fn default_gyroscope_hz() -> f32 {
    100.0
}
fn default_reference_hz() -> f32 {
    50.0
}
fn default_yaw_rate_dps() -> f32 {
    30.0
}
fn default_stationary_s() -> f32 {
    2.5
}
fn default_gyro_bias() -> [f32; 3] {
    [0.01, -0.005, 0.02]
}
fn default_reference_noise() -> f32 {
    0.02
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gyroscope_hz: default_gyroscope_hz(),
            accelerometer_hz: default_reference_hz(),
            magnetometer_hz: default_reference_hz(),
            gravity_hz: default_reference_hz(),
            rotation_vector_hz: default_reference_hz(),
            yaw_rate_dps: default_yaw_rate_dps(),
            stationary_s: default_stationary_s(),
            gyro_bias: default_gyro_bias(),
            reference_noise: default_reference_noise(),
        }
    }
}

impl SimulationConfig {
    pub fn profile(&self) -> SimulationProfile {
        let [bx, by, bz] = self.gyro_bias;
        SimulationProfile {
            gyroscope_hz: self.gyroscope_hz,
            accelerometer_hz: self.accelerometer_hz,
            magnetometer_hz: self.magnetometer_hz,
            gravity_hz: self.gravity_hz,
            rotation_vector_hz: self.rotation_vector_hz,
            yaw_rate_dps: self.yaw_rate_dps,
            stationary_s: self.stationary_s,
            gyro_bias: Vec3::new(bx, by, bz),
            reference_noise: self.reference_noise,
        }
    }
}

/// Persisted configuration stored in `~/.gyrofuse/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Strategies to run side by side.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderKind>,

    /// Run length in seconds; `0` runs until Ctrl-C.
    #[serde(default = "default_duration_s")]
    pub duration_s: f32,

    /// Interval between comparison rows, milliseconds.
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_providers() -> Vec<ProviderKind> {
    ProviderKind::ALL.to_vec()
}
fn default_duration_s() -> f32 {
    10.0
}
fn default_report_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            duration_s: default_duration_s(),
            report_interval_ms: default_report_interval_ms(),
            fusion: FusionConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

/// Return the path to `~/.gyrofuse/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gyrofuse").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `GYROFUSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GYROFUSE_PROVIDERS` | `providers` (comma-separated names) |
/// | `GYROFUSE_DURATION_S` | `duration_s` |
/// | `GYROFUSE_CALIBRATION_SAMPLES` | `fusion.calibration_samples` |
/// | `GYROFUSE_CORRECTION_WEIGHT` | `fusion.correction_weight` |
/// | `GYROFUSE_CORRECTION_CADENCE` | `fusion.correction_cadence` |
/// | `GYROFUSE_YAW_RATE_DPS` | `simulation.yaw_rate_dps` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("GYROFUSE_PROVIDERS")
        && let Ok(kinds) = parse_providers(&v)
    {
        cfg.providers = kinds;
    }
    if let Ok(v) = std::env::var("GYROFUSE_DURATION_S")
        && let Ok(d) = v.parse::<f32>()
    {
        cfg.duration_s = d;
    }
    if let Ok(v) = std::env::var("GYROFUSE_CALIBRATION_SAMPLES")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.fusion.calibration_samples = n;
    }
    if let Ok(v) = std::env::var("GYROFUSE_CORRECTION_WEIGHT")
        && let Ok(w) = v.parse::<f32>()
    {
        cfg.fusion.correction_weight = w;
    }
    if let Ok(v) = std::env::var("GYROFUSE_CORRECTION_CADENCE")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.fusion.correction_cadence = n;
    }
    if let Ok(v) = std::env::var("GYROFUSE_YAW_RATE_DPS")
        && let Ok(r) = v.parse::<f32>()
    {
        cfg.simulation.yaw_rate_dps = r;
    }
}

/// Parse a comma-separated provider list such as
/// `"improved_orientation_1,rotation_vector"`.
pub fn parse_providers(list: &str) -> Result<Vec<ProviderKind>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ProviderKind>().map_err(|e| e.to_string()))
        .collect()
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyrofuse_types::{DivergenceGuard, ReferenceSource};

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
        assert_eq!(loaded.fusion.calibration_samples, 200);
        assert_eq!(loaded.providers.len(), 6);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            r#"
providers = ["improved_orientation_2", "gravity_compass"]

[fusion]
correction_weight = 0.1
reference = "rotation_vector"

[fusion.divergence]
panic_limit = 5

[simulation]
yaw_rate_dps = 90.0
"#,
        )
        .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(
            cfg.providers,
            vec![ProviderKind::ImprovedOrientation2, ProviderKind::GravityCompass]
        );
        assert!((cfg.fusion.correction_weight - 0.1).abs() < f32::EPSILON);
        assert_eq!(cfg.fusion.correction_cadence, 10);
        assert_eq!(cfg.fusion.reference, ReferenceSource::RotationVector);
        assert_eq!(
            cfg.fusion.divergence,
            Some(DivergenceGuard {
                outlier_threshold: 0.85,
                panic_limit: 5
            })
        );
        assert!((cfg.simulation.yaw_rate_dps - 90.0).abs() < f32::EPSILON);
        assert!((cfg.simulation.gyroscope_hz - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "providers = [\"warp_drive\"]").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn config_path_points_to_gyrofuse_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".gyrofuse"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn parse_providers_accepts_known_names() {
        let kinds = parse_providers("improved_orientation_1, rotation_vector,").unwrap();
        assert_eq!(
            kinds,
            vec![ProviderKind::ImprovedOrientation1, ProviderKind::RotationVector]
        );
        assert!(parse_providers("compass").is_err());
    }

    #[test]
    fn apply_env_overrides_changes_providers() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("GYROFUSE_PROVIDERS", "calibrated_gyroscope") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.providers, vec![ProviderKind::CalibratedGyroscope]);
        unsafe { std::env::remove_var("GYROFUSE_PROVIDERS") };
    }

    #[test]
    fn apply_env_overrides_changes_correction_weight() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("GYROFUSE_CORRECTION_WEIGHT", "0.25") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!((cfg.fusion.correction_weight - 0.25).abs() < f32::EPSILON);
        unsafe { std::env::remove_var("GYROFUSE_CORRECTION_WEIGHT") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_number() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("GYROFUSE_CALIBRATION_SAMPLES", "lots") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.fusion.calibration_samples, 200);
        unsafe { std::env::remove_var("GYROFUSE_CALIBRATION_SAMPLES") };
    }

    #[test]
    fn simulation_profile_carries_bias() {
        let profile = SimulationConfig::default().profile();
        assert_eq!(profile.gyro_bias, Vec3::new(0.01, -0.005, 0.02));
        assert!((profile.gyroscope_hz - 100.0).abs() < f32::EPSILON);
        assert!((profile.stationary_s - 2.5).abs() < f32::EPSILON);
    }
}
