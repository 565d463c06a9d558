use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub database_url: String,

    pub redis_url: String,

    pub qontak_base_url: String,
    pub qontak_client_id: String,
    pub qontak_client_secret: String,
    pub qontak_username: String,
    pub qontak_password: String,

    pub channel_integration_id: String,
    pub join_notification_template_id: String,
    pub visit_reminder_template_id: String,
    pub pregnancy_gap_template_id: String,

    pub district_health_office_name: String,

    #[serde(default = "default_visit_interval_in_days")]
    pub visit_interval_in_days: i32,
    #[serde(default = "default_visit_reminder_interval_in_days")]
    pub visit_reminder_interval_in_days: i32,

    #[serde(default = "default_qr_code_directory")]
    pub qr_code_directory: String,
    #[serde(default = "default_qr_code_dimension")]
    pub qr_code_width: u32,
    #[serde(default = "default_qr_code_dimension")]
    pub qr_code_height: u32,

    #[serde(default = "default_dispatch_concurrency")]
    pub dispatch_concurrency: usize,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    pub server_port: u16,
}

fn default_visit_interval_in_days() -> i32 {
    30
}

fn default_visit_reminder_interval_in_days() -> i32 {
    1
}

fn default_qr_code_directory() -> String {
    "/tmp/anc-notify".to_string()
}

fn default_qr_code_dimension() -> u32 {
    300
}

fn default_dispatch_concurrency() -> usize {
    8
}

fn default_request_timeout_seconds() -> u64 {
    30
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }
}
