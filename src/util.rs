use std::path::PathBuf;

const MONITORING_CONFIG: &str = "MONITORING_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./monitoring.json";

/// Config path from `MONITORING_CONFIG`, or `./monitoring.json`
pub fn get_config_path() -> PathBuf {
    let path_from_env = std::env::var(MONITORING_CONFIG);
    path_from_env.map_or(PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Round to two decimal places, half away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
