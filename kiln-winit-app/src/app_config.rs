use std::path::{Path, PathBuf};

use anyhow::Context;
use kiln_render_interface::pipeline_settings::RendererSettings;

/// JSON file of [`RendererSettings`] overrides.
pub const SETTINGS_ENV: &str = "KILN_SETTINGS";
/// Recording worker count; wins over the settings file.
pub const WORKER_THREADS_ENV: &str = "KILN_WORKER_THREADS";
/// Image file the demo scene uses instead of the generated checker.
pub const TEXTURE_ENV: &str = "KILN_TEXTURE";

/// Everything the demo reads from its environment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppConfig {
    pub settings: RendererSettings,
    pub texture_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` stands in for the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut settings = match lookup(SETTINGS_ENV) {
            Some(path) => RendererSettings::load(Path::new(&path)).with_context(|| format!("{SETTINGS_ENV}={path}"))?,
            None => RendererSettings::default(),
        };

        if let Some(threads) = lookup(WORKER_THREADS_ENV) {
            settings.worker_threads = threads
                .trim()
                .parse()
                .with_context(|| format!("{WORKER_THREADS_ENV}={threads:?} is not a thread count"))?;
        }

        let texture_path = lookup(TEXTURE_ENV).filter(|path| !path.is_empty()).map(PathBuf::from);

        Ok(Self { settings, texture_path })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_worker_threads_override() {
        let config = AppConfig::from_lookup(lookup(&[(WORKER_THREADS_ENV, " 3 ")])).unwrap();
        assert_eq!(config.settings.worker_threads, 3);
        assert_eq!(config.settings.resolved_worker_threads(), 3);

        assert!(AppConfig::from_lookup(lookup(&[(WORKER_THREADS_ENV, "many")])).is_err());
    }

    #[test]
    fn test_texture_path() {
        let config = AppConfig::from_lookup(lookup(&[(TEXTURE_ENV, "assets/brick.png")])).unwrap();
        assert_eq!(config.texture_path, Some(PathBuf::from("assets/brick.png")));

        let config = AppConfig::from_lookup(lookup(&[(TEXTURE_ENV, "")])).unwrap();
        assert_eq!(config.texture_path, None);
    }

    #[test]
    fn test_missing_settings_file() {
        let err = AppConfig::from_lookup(lookup(&[(SETTINGS_ENV, "/nonexistent/kiln.json")])).unwrap_err();
        assert!(format!("{err:#}").contains(SETTINGS_ENV));
    }
}
