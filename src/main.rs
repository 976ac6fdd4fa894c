use anyhow::{Context, Result};
use clap::Parser;
use plantcast::app::RunOutcome;
use plantcast::cli::Args;
use plantcast::render::render_home;
use plantcast::App;
use plantcast_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    plantcast_core::init()?;
    tracing::info!("Plantcast v{}", env!("CARGO_PKG_VERSION"));

    let (mut config, _) = Config::load_validated(args.config.as_deref())?;
    if let Some(units) = args.units {
        config.weather.units = units;
    }

    let mut app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e).context("Failed to start Plantcast");
        }
    };

    let units = app.config().weather.units;
    match app.run(args.credentials(), args.city.as_deref()).await {
        RunOutcome::SignIn { message } => {
            if let Some(message) = message {
                eprintln!("{}", message);
            }
            println!("Sign in with --email and --password (add --sign-up to create an account).");
        }
        RunOutcome::Home { greeting, state } => {
            print!("{}", render_home(&state, Some(&greeting), units));
        }
    }

    app.shutdown();
    Ok(())
}
