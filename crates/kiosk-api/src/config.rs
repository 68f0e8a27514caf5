use anyhow::{Context, Result};

/// Process configuration, read from the environment once at startup and
/// passed around inside the shared state. No component re-reads the
/// environment after this point.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: String,
    pub host: String,
    pub port: u16,
    /// Public base URL, used to build links embedded in emails.
    pub site_url: String,
    /// Destination for moderation and identity-check notices.
    pub admin_email: String,
    /// Session token lifetime in days.
    pub token_days: i64,
    pub smtp: Option<SmtpConfig>,
    pub pricing: Pricing,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Fixed EUR price table for the paid options.
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub extra_photos: f64,
    pub boost_14_days: f64,
    pub boost_30_days: f64,
}

impl Pricing {
    /// Price for a boost, only for the two durations on offer.
    pub fn boost_price(&self, duration_days: i64) -> Option<f64> {
        match duration_days {
            14 => Some(self.boost_14_days),
            30 => Some(self.boost_30_days),
            _ => None,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port: u16 = env_or("KIOSK_PORT", "3000")
            .parse()
            .context("KIOSK_PORT must be a port number")?;
        let token_days: i64 = env_or("KIOSK_TOKEN_DAYS", "30")
            .parse()
            .context("KIOSK_TOKEN_DAYS must be an integer")?;

        // Mail is optional: without credentials, sends are skipped and admin
        // notices fall back to stored notifications.
        let smtp_host = env_or("KIOSK_SMTP_HOST", "");
        let smtp_user = env_or("KIOSK_SMTP_USER", "");
        let smtp_password = env_or("KIOSK_SMTP_PASSWORD", "");
        let smtp = if !smtp_host.is_empty() && !smtp_user.is_empty() && !smtp_password.is_empty() {
            Some(SmtpConfig {
                host: smtp_host,
                port: env_or("KIOSK_SMTP_PORT", "587")
                    .parse()
                    .context("KIOSK_SMTP_PORT must be a port number")?,
                user: smtp_user,
                password: smtp_password,
            })
        } else {
            None
        };

        let parse_price = |key: &str, default: &str| -> Result<f64> {
            env_or(key, default)
                .parse()
                .with_context(|| format!("{key} must be a price"))
        };

        Ok(Config {
            jwt_secret: env_or("KIOSK_JWT_SECRET", "dev-secret-change-me"),
            db_path: env_or("KIOSK_DB_PATH", "kiosk.db"),
            host: env_or("KIOSK_HOST", "0.0.0.0"),
            port,
            site_url: env_or("KIOSK_SITE_URL", "http://localhost:3000"),
            admin_email: env_or("KIOSK_ADMIN_EMAIL", "admin@kiosk.example"),
            token_days,
            smtp,
            pricing: Pricing {
                extra_photos: parse_price("KIOSK_PRICE_EXTRA_PHOTOS", "3.99")?,
                boost_14_days: parse_price("KIOSK_PRICE_BOOST_14", "19.99")?,
                boost_30_days: parse_price("KIOSK_PRICE_BOOST_30", "24.99")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boost_price_accepts_only_the_two_durations() {
        let pricing = Pricing {
            extra_photos: 3.99,
            boost_14_days: 19.99,
            boost_30_days: 24.99,
        };

        assert_eq!(pricing.boost_price(14), Some(19.99));
        assert_eq!(pricing.boost_price(30), Some(24.99));
        for bad in [0, 7, 13, 15, 29, 31, 60, -14] {
            assert_eq!(pricing.boost_price(bad), None, "duration {bad}");
        }
    }
}
