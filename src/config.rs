use std::env;

use crate::services::booking::BusinessHours;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub business_open_hour: u32,
    pub business_close_hour: u32,
    pub rate_limit_enabled: bool,
    pub admin_user_id: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DATABASE_MAX_CONNECTIONS must be a number"),
            database_min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .expect("DATABASE_MIN_CONNECTIONS must be a number"),
            database_acquire_timeout_secs: env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("DATABASE_ACQUIRE_TIMEOUT_SECS must be a number"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a number"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            business_open_hour: env::var("BUSINESS_OPEN_HOUR")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .expect("BUSINESS_OPEN_HOUR must be a number"),
            business_close_hour: env::var("BUSINESS_CLOSE_HOUR")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("BUSINESS_CLOSE_HOUR must be a number"),
            rate_limit_enabled: env::var("RATE_LIMIT_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .expect("RATE_LIMIT_ENABLED must be true or false"),
            admin_user_id: env::var("ADMIN_USER_ID")
                .unwrap_or_else(|_| "admin".to_string()),
            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@cleanmarket.local".to_string()),
            admin_password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin123".to_string()),
        };

        assert!(
            config.business_open_hour < config.business_close_hour
                && config.business_close_hour <= 24,
            "BUSINESS_OPEN_HOUR must be before BUSINESS_CLOSE_HOUR (max 24)"
        );

        config
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn business_hours(&self) -> BusinessHours {
        BusinessHours {
            open_hour: self.business_open_hour,
            close_hour: self.business_close_hour,
        }
    }
}
