//! Command-line interface definitions.

use std::path::PathBuf;

use clap::Parser;
use plantcast_core::UnitSystem;

use crate::app::Credentials;

#[derive(Parser, Debug)]
#[command(
    name = "plantcast",
    version,
    about = "Daily plant watering advice from the 5-day forecast"
)]
pub struct Args {
    /// City to show; saved on your account when it differs from the saved one
    #[arg(short, long)]
    pub city: Option<String>,

    /// Account email
    #[arg(short, long, env = "PLANTCAST_EMAIL")]
    pub email: Option<String>,

    /// Account password
    #[arg(short, long, env = "PLANTCAST_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Create the account instead of signing in
    #[arg(long, requires_all = ["email", "password"])]
    pub sign_up: bool,

    /// Display name for a new account
    #[arg(long, requires = "sign_up")]
    pub name: Option<String>,

    /// Unit system: imperial, metric or standard
    #[arg(short, long)]
    pub units: Option<UnitSystem>,

    /// Path to config file (default: <config dir>/plantcast/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn credentials(&self) -> Option<Credentials> {
        let email = self.email.clone()?;
        let password = self.password.clone()?;
        Some(if self.sign_up {
            Credentials::SignUp {
                email,
                password,
                display_name: self.name.clone(),
            }
        } else {
            Credentials::SignIn { email, password }
        })
    }
}
