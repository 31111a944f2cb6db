use serde::Deserialize;
use std::path::Path;

/// Keeps the bot token out of Debug output and logs.
#[derive(Deserialize)]
#[serde(transparent)]
pub struct Obfuscated(pub String);

impl std::fmt::Debug for Obfuscated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<Obfuscated string>")?;
        Ok(())
    }
}

impl std::clone::Clone for Obfuscated {
    fn clone(&self) -> Self {
        Obfuscated(self.0.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram_bot_token: Obfuscated,
    /// base url of the status api, without the `/query/api/...` path
    pub api_base_url: String,
    pub db_path: String,
    pub webhook_bind: String,
    pub webhook_port: u16,
    pub poll_interval_secs: u64,
    /// cap on concurrent room checks within one poll cycle, 0 is treated
    /// as 1 (there is no way to ask for unbounded fan-out)
    pub max_concurrent_checks: usize,
}

impl Config {
    pub fn from_path<P>(config_path: P) -> std::result::Result<Config, serde_dhall::Error>
    where
        P: AsRef<Path>,
    {
        serde_dhall::from_file(config_path).parse::<Config>()
    }
}
