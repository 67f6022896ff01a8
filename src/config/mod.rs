use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string())
    }

    pub fn database_name() -> String {
        Self::figment()
            .extract_inner("database_name")
            .unwrap_or_else(|_| "service-marketplace".to_string())
    }

    /// Upper bound on attempts for a contended compare-and-swap write.
    pub fn write_retries() -> u32 {
        Self::figment()
            .extract_inner::<u32>("write_retries")
            .map(|n| n.max(1))
            .unwrap_or(8)
    }
}
