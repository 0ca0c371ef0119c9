//! Process configuration, assembled from CLI arguments and the
//! environment.

use anyhow::Context;

use crate::cli::Args;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_uri: String,
    pub db_name: String,
    /// Secret the session tokens are signed with. Env only, never a flag.
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
}

impl Config {
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let session_ttl_hours = match std::env::var("SESSION_TTL_HOURS") {
            Ok(raw) => raw
                .parse()
                .context("SESSION_TTL_HOURS is not a valid hour count")?,
            Err(_) => 24,
        };

        Ok(Self {
            port: args.port,
            db_uri: args.db_uri.clone(),
            db_name: args.db_name.clone(),
            jwt_secret,
            session_ttl_hours,
        })
    }
}
