// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use oficina_app::ShopProfile;
use oficina_llm::{DEFAULT_BASE_URL, DEFAULT_ESTIMATE_MODEL, DEFAULT_IMAGE_MODEL};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_TIMEOUT: &str = "60s";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub oracle: Oracle,
    #[serde(default)]
    pub shop: Shop,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            oracle: Oracle::default(),
            shop: Shop::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Oracle {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub estimate_model: Option<String>,
    pub image_model: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Oracle {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            api_key_env: Some(DEFAULT_API_KEY_ENV.to_owned()),
            estimate_model: Some(DEFAULT_ESTIMATE_MODEL.to_owned()),
            image_model: Some(DEFAULT_IMAGE_MODEL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

/// Overrides for the printed shop identity. Unset fields keep the built-in
/// profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Shop {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("OFICINA_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set OFICINA_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(oficina_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` at the top and keep values under [storage], [oracle], [shop], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            oficina_db::validate_db_path(db_path)?;
        }

        if let Some(timeout) = &self.oracle.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "oracle.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(name) = &self.oracle.api_key_env
            && name.trim().is_empty()
        {
            bail!(
                "oracle.api_key_env in {} must name an environment variable, for example \"{}\"",
                path.display(),
                DEFAULT_API_KEY_ENV
            );
        }

        for (field, value) in [
            ("shop.name", &self.shop.name),
            ("shop.address", &self.shop.address),
            ("shop.city", &self.shop.city),
            ("shop.phone", &self.shop.phone),
        ] {
            if let Some(value) = value
                && value.trim().is_empty()
            {
                bail!(
                    "{field} in {} must not be blank -- remove the line to use the default",
                    path.display()
                );
            }
        }

        if let Some(level) = &self.log.level
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            bail!(
                "log.level {level:?} in {} is not recognized; use one of: {}",
                path.display(),
                LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => oficina_db::default_db_path(),
        }
    }

    pub fn oracle_enabled(&self) -> bool {
        self.oracle.enabled.unwrap_or(true)
    }

    pub fn oracle_base_url(&self) -> &str {
        self.oracle
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn oracle_api_key_env(&self) -> &str {
        self.oracle
            .api_key_env
            .as_deref()
            .unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// Reads the API key from the configured environment variable.
    pub fn oracle_api_key(&self) -> Result<String> {
        let name = self.oracle_api_key_env();
        match env::var(name) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!(
                "environment variable {name} is not set -- export your Gemini API key there, or set [oracle] enabled = false"
            ),
        }
    }

    pub fn oracle_estimate_model(&self) -> &str {
        self.oracle
            .estimate_model
            .as_deref()
            .unwrap_or(DEFAULT_ESTIMATE_MODEL)
    }

    pub fn oracle_image_model(&self) -> &str {
        self.oracle
            .image_model
            .as_deref()
            .unwrap_or(DEFAULT_IMAGE_MODEL)
    }

    pub fn oracle_timeout(&self) -> Result<Duration> {
        parse_duration(self.oracle.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn shop_profile(&self) -> ShopProfile {
        let mut profile = ShopProfile::default();
        if let Some(name) = &self.shop.name {
            profile.name = name.clone();
        }
        if let Some(address) = &self.shop.address {
            profile.street = address.clone();
        }
        if let Some(city) = &self.shop.city {
            profile.city = city.clone();
        }
        if let Some(state) = &self.shop.state {
            profile.state = state.clone();
        }
        if let Some(phone) = &self.shop.phone {
            profile.phone = phone.clone();
        }
        profile
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn example_config(path: &Path) -> String {
        let shop = ShopProfile::default();
        format!(
            "# oficina config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/oficina/oficina.db)\n# db_path = \"/absolute/path/to/oficina.db\"\n\n[oracle]\nenabled = true\nbase_url = \"{}\"\n# Name of the environment variable holding the API key.\napi_key_env = \"{}\"\nestimate_model = \"{}\"\nimage_model = \"{}\"\ntimeout = \"{}\"\n\n[shop]\nname = \"{}\"\naddress = \"{}\"\ncity = \"{}\"\nstate = \"{}\"\nphone = \"{}\"\n\n[log]\n# RUST_LOG overrides this when set.\nlevel = \"{}\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_API_KEY_ENV,
            DEFAULT_ESTIMATE_MODEL,
            DEFAULT_IMAGE_MODEL,
            DEFAULT_TIMEOUT,
            shop.name,
            shop.street,
            shop.city,
            shop.state,
            shop.phone,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 60s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert!(config.oracle_enabled());
        assert_eq!(config.oracle_estimate_model(), "gemini-2.5-flash");
        assert_eq!(config.oracle_image_model(), "gemini-2.5-flash-image");
        assert_eq!(config.oracle_timeout()?, Duration::from_secs(60));
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.shop_profile().city, "Uberlândia");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[oracle]\nenabled = false\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[storage], [oracle], [shop], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[oracle]\nenabled = false\nbase_url = \"http://localhost:8080/v1beta/\"\napi_key_env = \"MY_KEY\"\ntimeout = \"90s\"\n[shop]\nname = \"Funilaria Central\"\naddress = \"Av. Brasil, 100\"\nphone = \"(11) 3333-4444\"\n[log]\nlevel = \"debug\"\n",
        )?;

        let config = Config::load(&path)?;
        assert!(!config.oracle_enabled());
        assert_eq!(config.oracle_base_url(), "http://localhost:8080/v1beta");
        assert_eq!(config.oracle_api_key_env(), "MY_KEY");
        assert_eq!(config.oracle_timeout()?, Duration::from_secs(90));
        assert_eq!(config.log_level(), "debug");

        let shop = config.shop_profile();
        assert_eq!(shop.name, "Funilaria Central");
        assert_eq!(shop.street, "Av. Brasil, 100");
        assert_eq!(shop.phone, "(11) 3333-4444");
        assert_eq!(shop.city, "Uberlândia");
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn blank_shop_fields_and_unknown_log_levels_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[shop]\nname = \"  \"\n")?;
        let error = Config::load(&path).expect_err("blank shop name should fail");
        assert!(error.to_string().contains("shop.name"));

        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("unknown level should fail");
        assert!(error.to_string().contains("not recognized"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("OFICINA_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("OFICINA_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn db_path_prefers_storage_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("OFICINA_DB_PATH", "/from/env.db");
        }
        let config = Config::load(&path)?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("OFICINA_DB_PATH");
        }
        assert_eq!(config.db_path()?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_storage_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("OFICINA_DB_PATH", "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("OFICINA_DB_PATH");
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn db_path_rejects_uri_style_storage_value() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"https://evil.example/oficina.db\"\n")?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        assert!(error.to_string().contains("looks like a URI"));
        Ok(())
    }

    #[test]
    fn api_key_is_read_from_the_named_variable() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[oracle]\napi_key_env = \"OFICINA_TEST_KEY\"\n")?;
        let config = Config::load(&path)?;

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("OFICINA_TEST_KEY");
        }
        let error = config.oracle_api_key().expect_err("unset key should fail");
        assert!(error.to_string().contains("OFICINA_TEST_KEY is not set"));

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("OFICINA_TEST_KEY", "secret");
        }
        let key = config.oracle_api_key();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("OFICINA_TEST_KEY");
        }
        assert_eq!(key?, "secret");
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("60s")?, Duration::from_secs(60));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("soon").is_err());
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[oracle]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn example_config_loads_and_names_every_section() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        for section in ["version = 1", "[storage]", "[oracle]", "[shop]", "[log]"] {
            assert!(example.contains(section), "missing {section}");
        }
        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.oracle_api_key_env(), "GEMINI_API_KEY");
        Ok(())
    }
}
