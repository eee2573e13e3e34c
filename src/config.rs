use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::File;

use crate::Error;

/// Global config object
pub static CONFIG: Lazy<Config> = Lazy::new(|| Config::load().expect("Failed to load config"));

#[derive(Serialize, Deserialize, Default)]
pub struct DiscordAuth {
    pub token: String,
    pub client_id: String,
}

#[derive(Serialize, Deserialize, Default)]
pub struct Meta {
    pub postgres_url: String,
}

#[derive(Serialize, Deserialize)]
pub struct Config {
    pub discord_auth: DiscordAuth,
    pub meta: Meta,

    #[serde(skip)]
    /// Setup by load() for statistics
    pub bot_start_time: i64,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        let file = File::open("config.yaml");

        match file {
            Ok(file) => {
                let mut cfg: Config = serde_yaml::from_reader(file)?;

                cfg.bot_start_time = chrono::Utc::now().timestamp();

                Ok(cfg)
            }
            Err(e) => {
                println!("config.yaml could not be loaded: {}", e);

                std::process::exit(1);
            }
        }
    }
}
