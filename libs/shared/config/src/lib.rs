use std::env;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_DAY_START: &str = "09:00";
pub const DEFAULT_DAY_END: &str = "18:00";
pub const DEFAULT_SLOT_MINUTES: u32 = 30;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Opening hours of the clinic. Every calendar date uses the same window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicHours {
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub slot_minutes: u32,
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_minutes: DEFAULT_SLOT_MINUTES,
        }
    }
}

impl ClinicHours {
    /// A window is usable when it is non-empty and splits into whole slots.
    pub fn is_valid(&self) -> bool {
        if self.slot_minutes == 0 || self.day_start >= self.day_end {
            return false;
        }
        let window_minutes = (self.day_end - self.day_start).num_minutes();
        window_minutes % i64::from(self.slot_minutes) == 0
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage: StorageBackend,
    pub clinic_hours: ClinicHours,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage: parse_var("CLINIC_STORAGE", StorageBackend::Memory),
            clinic_hours: clinic_hours_from_env(),
            server_port: parse_var("SERVER_PORT", DEFAULT_SERVER_PORT),
        };

        if config.storage == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but not configured, falling back to in-memory storage");
            config.storage = StorageBackend::Memory;
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn clinic_hours_from_env() -> ClinicHours {
    let defaults = ClinicHours::default();
    let hours = ClinicHours {
        day_start: parse_time_var("CLINIC_DAY_START", defaults.day_start),
        day_end: parse_time_var("CLINIC_DAY_END", defaults.day_end),
        slot_minutes: parse_var("CLINIC_SLOT_MINUTES", defaults.slot_minutes),
    };

    if !hours.is_valid() {
        warn!(
            "Clinic hours {}-{} with {} minute slots are not usable, using {}-{} / {}",
            hours.day_start.format("%H:%M"),
            hours.day_end.format("%H:%M"),
            hours.slot_minutes,
            DEFAULT_DAY_START,
            DEFAULT_DAY_END,
            DEFAULT_SLOT_MINUTES,
        );
        return defaults;
    }

    hours
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn parse_time_var(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").unwrap_or_else(|_| {
            warn!("{} is not a HH:MM time ('{}'), using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
