// Runtime configuration, read from environment variables

use crate::dataset::DataSource;

pub const ENV_DATA: &str = "TEMPLE_MAP_DATA";
pub const ENV_BIND: &str = "TEMPLE_MAP_BIND";
pub const ENV_ZOOM: &str = "TEMPLE_MAP_ZOOM";

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_ZOOM: u8 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where the temple CSV comes from (URL or local path)
    pub data: DataSource,
    /// Address the web server binds to
    pub bind: String,
    /// Initial map zoom level
    pub zoom: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataSource::default(),
            bind: DEFAULT_BIND.to_string(),
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset, blank or unparsable values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(data) = value(ENV_DATA) {
            config.data = DataSource::parse(&data);
        }

        if let Some(bind) = value(ENV_BIND) {
            config.bind = bind.trim().to_string();
        }

        if let Some(zoom) = value(ENV_ZOOM) {
            match zoom.trim().parse::<u8>() {
                Ok(z) if z <= 18 => config.zoom = z,
                _ => tracing::warn!(value = %zoom, "ignoring invalid {}", ENV_ZOOM),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_published_dataset() {
        let config = Config::from_lookup(lookup_from(&[]));

        assert_eq!(config, Config::default());
        assert_eq!(config.data, DataSource::default());
        assert_eq!(config.bind, "0.0.0.0:3000");
        assert_eq!(config.zoom, 7);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_DATA, "./temples.csv"),
            (ENV_BIND, "127.0.0.1:8080"),
            (ENV_ZOOM, "9"),
        ]));

        assert_eq!(config.data, DataSource::File(PathBuf::from("./temples.csv")));
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.zoom, 9);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_DATA, "   "),
            (ENV_ZOOM, "forty"),
        ]));
        assert_eq!(config.data, DataSource::default());
        assert_eq!(config.zoom, DEFAULT_ZOOM);

        let config = Config::from_lookup(lookup_from(&[(ENV_ZOOM, "40")]));
        assert_eq!(config.zoom, DEFAULT_ZOOM);
    }
}
