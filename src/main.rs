use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use recipe_api::{
    actions::{create_superuser, set_user_active},
    config::Config,
    pool::{connect, migrate},
    routes::serve,
    state::Context,
};

#[derive(Parser)]
#[command(name = "recipe-api")]
#[command(author, version, about = "Recipe REST API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations and serve the API
    Serve {
        /// Listen address, overrides RECIPE_API_ADDR
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Apply migrations and exit
    Migrate,

    /// Create an administrator account
    CreateSuperuser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Block an account from logging in and using issued tokens
    DeactivateUser {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve { addr } => {
            let ctx = Context::new(&config).await?;
            serve(ctx, addr.unwrap_or(config.address)).await?;
        }
        Commands::Migrate => {
            let pool = connect(&config.database_url).await?;
            migrate(&pool).await?;
            println!("Migrations applied to {}", config.database_url);
        }
        Commands::CreateSuperuser { email, password } => {
            let ctx = Context::new(&config).await?;
            let user = create_superuser(&ctx.pool, &ctx.hasher, &email, &password).await?;
            println!("Superuser {} created", user.email);
        }
        Commands::DeactivateUser { email } => {
            let pool = connect(&config.database_url).await?;
            migrate(&pool).await?;
            let user = set_user_active(&pool, &email, false).await?;
            println!("User {} deactivated", user.email);
        }
    }

    Ok(())
}
