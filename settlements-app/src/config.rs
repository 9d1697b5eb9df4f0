//! Configuration loading from environment.

use std::env;

use rust_decimal::Decimal;

/// Which payment gateway to settle against, with its credentials.
pub enum GatewayConfig {
    Stripe {
        secret_key: String,
    },
    Culqi {
        secret_key: String,
    },
    Izipay {
        api_base: String,
        shop_id: String,
        api_key: String,
    },
}

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
    pub profiles_url: String,
    pub work_orders_url: String,
    pub service_requests_url: String,
    pub notifications_url: String,
    pub event_bus_url: String,
    pub fee_percentage: Decimal,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("{} environment variable is required", key))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let database_url = required("DATABASE_URL")?;

        let gateway = match var_or("PAYMENT_GATEWAY", "stripe").to_lowercase().as_str() {
            "stripe" => GatewayConfig::Stripe {
                secret_key: required("STRIPE_SECRET_KEY")?,
            },
            "culqi" => GatewayConfig::Culqi {
                secret_key: required("CULQI_SECRET_KEY")?,
            },
            "izipay" => GatewayConfig::Izipay {
                api_base: required("IZIPAY_API_BASE")?,
                shop_id: required("IZIPAY_SHOP_ID")?,
                api_key: required("IZIPAY_API_KEY")?,
            },
            other => anyhow::bail!(
                "Unknown PAYMENT_GATEWAY: {} (expected stripe, culqi or izipay)",
                other
            ),
        };

        let fee_percentage: Decimal = var_or("PLATFORM_FEE_PERCENTAGE", "15.0")
            .parse()
            .map_err(|_| anyhow::anyhow!("PLATFORM_FEE_PERCENTAGE must be a decimal"))?;
        if fee_percentage.is_sign_negative() || fee_percentage > Decimal::ONE_HUNDRED {
            anyhow::bail!("PLATFORM_FEE_PERCENTAGE must be between 0 and 100");
        }

        Ok(Self {
            port,
            database_url,
            gateway,
            profiles_url: var_or("PROFILES_SERVICE_URL", "http://localhost:5001"),
            work_orders_url: var_or("WORK_ORDERS_SERVICE_URL", "http://localhost:5002"),
            service_requests_url: var_or("SERVICE_REQUESTS_SERVICE_URL", "http://localhost:5003"),
            notifications_url: var_or("NOTIFICATIONS_SERVICE_URL", "http://localhost:5004"),
            event_bus_url: var_or("EVENT_BUS_URL", "http://localhost:5010"),
            fee_percentage,
        })
    }

    pub fn gateway_name(&self) -> &'static str {
        match self.gateway {
            GatewayConfig::Stripe { .. } => "Stripe",
            GatewayConfig::Culqi { .. } => "Culqi",
            GatewayConfig::Izipay { .. } => "Izipay",
        }
    }
}
