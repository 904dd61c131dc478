//! Layered configuration: built-in defaults, `.natpyrc`, then environment.

use std::{
    collections::HashMap,
    env, fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

use crate::execution::progress::ProgressSettings;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_EXECUTE_PATH: &str = "/api/execute";
const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
    /// Problems hit while loading. Reported by the caller once logging is up.
    warnings: Vec<String>,
}

impl Config {
    /// Load from the default rc path and the process environment.
    pub fn load() -> Self {
        Self::from_sources(default_config_path(), env::vars())
    }

    /// Build a config from an rc file path and an explicit set of environment pairs.
    /// Later sources win: defaults < rc file < environment.
    pub fn from_sources<I>(config_path: PathBuf, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = default_map();
        let mut warnings = Vec::new();
        let mut base_url_set = false;

        if config_path.exists() {
            match read_rc_file(&config_path) {
                Ok(entries) => {
                    base_url_set |= entries.iter().any(|(k, _)| k == "API_BASE_URL");
                    map.extend(entries);
                }
                Err(e) => warnings.push(format!(
                    "failed to read config file {}: {e}",
                    config_path.display()
                )),
            }
        }

        let mut alias_base_url = None;
        for (k, v) in vars {
            if k == "NEXT_PUBLIC_API_URL" {
                alias_base_url = Some(v);
            } else if is_config_key(&k) {
                base_url_set |= k == "API_BASE_URL";
                map.insert(k, v);
            }
        }
        // The alias only applies when API_BASE_URL was not set anywhere.
        if let Some(url) = alias_base_url {
            if !base_url_set {
                map.insert("API_BASE_URL".into(), url);
            }
        }

        Self {
            inner: map,
            config_path,
            warnings,
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn api_base_url(&self) -> String {
        self.get("API_BASE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Full URL of the execute endpoint.
    pub fn execute_url(&self) -> String {
        let path = self
            .get("EXECUTE_PATH")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXECUTE_PATH.to_string());
        join_url(&self.api_base_url(), &path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.api_base_url(), HEALTH_PATH)
    }

    /// `None` means no timeout (the default).
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.get_u64("REQUEST_TIMEOUT") {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }

    pub fn progress_settings(&self) -> ProgressSettings {
        let defaults = ProgressSettings::default();
        ProgressSettings::new(
            self.get_u64("PROGRESS_STEP")
                .map(|v| v.min(u8::MAX as u64) as u8)
                .unwrap_or(defaults.step),
            self.get_u64("PROGRESS_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            self.get_u64("PROGRESS_CAP")
                .map(|v| v.min(u8::MAX as u64) as u8)
                .unwrap_or(defaults.cap),
        )
    }

    pub fn default_theme(&self) -> String {
        self.get("DEFAULT_THEME").unwrap_or_else(|| "dark".into())
    }

    pub fn log_file(&self) -> PathBuf {
        self.get("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(default_log_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn read_rc_file(path: &Path) -> std::io::Result<Vec<(String, String)>> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            entries.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    Ok(entries)
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "API_BASE_URL",
        "EXECUTE_PATH",
        "REQUEST_TIMEOUT",
        "PROGRESS_STEP",
        "PROGRESS_INTERVAL_MS",
        "PROGRESS_CAP",
        "DEFAULT_THEME",
        "LOG_FILE",
    ];

    KEYS.contains(&k) || k.starts_with("NATPY_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("natpy").join(".natpyrc")
}

fn default_log_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.cache_dir().to_path_buf())
        .unwrap_or_else(env::temp_dir);
    base.join("natpy").join("natpy.log")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    let progress = ProgressSettings::default();

    m.insert("API_BASE_URL".into(), DEFAULT_API_BASE_URL.into());
    m.insert("EXECUTE_PATH".into(), DEFAULT_EXECUTE_PATH.into());
    m.insert("REQUEST_TIMEOUT".into(), "0".into());

    m.insert("PROGRESS_STEP".into(), progress.step.to_string());
    m.insert(
        "PROGRESS_INTERVAL_MS".into(),
        progress.interval.as_millis().to_string(),
    );
    m.insert("PROGRESS_CAP".into(), progress.cap.to_string());

    m.insert("DEFAULT_THEME".into(), "dark".into());
    m.insert(
        "LOG_FILE".into(),
        default_log_path().to_string_lossy().into_owned(),
    );

    m
}
