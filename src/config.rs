use std::env;

/// Application settings, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub mpesa: MpesaConfig,
}

/// Settings for the M-Pesa USSD push gateway.
#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub token_url: String,
    pub initiate_url: String,
    pub callback_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            mpesa: MpesaConfig {
                consumer_key: env::var("MPESA_CONSUMER_KEY").unwrap_or_default(),
                consumer_secret: env::var("MPESA_CONSUMER_SECRET").unwrap_or_default(),
                shortcode: env::var("MPESA_SHORTCODE").unwrap_or_default(),
                token_url: env::var("MPESA_API_TOKEN_URL").unwrap_or_default(),
                initiate_url: env::var("MPESA_API_INITIATE_URL").unwrap_or_default(),
                callback_url: env::var("MPESA_CALLBACK_URL").unwrap_or_default(),
            },
        })
    }
}
