//! Command line and environment configuration for the server.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use halo::{LoginLimiterConfig, StaticCredentialVerifier};
use halo_axum::CookieConfig;

/// Standalone server for halo's CSRF and login endpoints
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "HALO_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// HMAC secret for CSRF tokens, at least 32 bytes
    #[arg(long, env = "HALO_CSRF_SECRET", hide_env_values = true)]
    pub csrf_secret: String,

    /// Mark cookies `Secure`
    #[arg(long, env = "HALO_PRODUCTION")]
    pub production: bool,

    /// Failed logins before an address is locked out
    #[arg(long, env = "HALO_MAX_FAILED_ATTEMPTS", default_value_t = 5)]
    pub max_failed_attempts: u32,

    /// Lockout length in minutes
    #[arg(long, env = "HALO_LOCKOUT_MINUTES", default_value_t = 15)]
    pub lockout_minutes: i64,

    /// Minutes without a failure after which the count starts over
    #[arg(long, env = "HALO_ATTEMPT_RESET_MINUTES", default_value_t = 60)]
    pub attempt_reset_minutes: i64,

    /// CSRF token lifetime in minutes
    #[arg(long, env = "HALO_TOKEN_TTL_MINUTES", default_value_t = 30)]
    pub token_ttl_minutes: i64,

    /// Seconds between purges of expired lockout records
    #[arg(long, env = "HALO_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub cleanup_interval_secs: u64,

    /// JSON file with the accounts the development verifier accepts
    #[arg(long, env = "HALO_USERS_FILE")]
    pub users_file: Option<PathBuf>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("csrf_secret", &"***")
            .field("production", &self.production)
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("lockout_minutes", &self.lockout_minutes)
            .field("attempt_reset_minutes", &self.attempt_reset_minutes)
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .field("users_file", &self.users_file)
            .finish()
    }
}

impl ServerConfig {
    pub fn limiter_config(&self) -> anyhow::Result<LoginLimiterConfig> {
        Ok(LoginLimiterConfig {
            enabled: true,
            max_failed_attempts: self.max_failed_attempts,
            lockout_duration: minutes("lockout-minutes", self.lockout_minutes)?,
            attempt_reset_window: minutes("attempt-reset-minutes", self.attempt_reset_minutes)?,
            cleanup_interval: std::time::Duration::from_secs(self.cleanup_interval_secs),
        })
    }

    pub fn token_ttl(&self) -> anyhow::Result<Duration> {
        minutes("token-ttl-minutes", self.token_ttl_minutes)
    }

    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig::for_environment(self.production)
    }

    /// Load the account list, or an empty verifier when no file is given.
    pub fn load_verifier(&self) -> anyhow::Result<StaticCredentialVerifier> {
        let Some(path) = &self.users_file else {
            return Ok(StaticCredentialVerifier::default());
        };

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read users file {}", path.display()))?;
        StaticCredentialVerifier::from_json(&json)
            .with_context(|| format!("failed to parse users file {}", path.display()))
    }
}

fn minutes(name: &str, value: i64) -> anyhow::Result<Duration> {
    Duration::try_minutes(value).with_context(|| format!("--{name} is out of range: {value}"))
}
