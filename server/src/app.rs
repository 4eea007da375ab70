//! Core application

use std::sync::Arc;

use anyhow::Result;

use crate::api::server::ApiServer;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::clickhouse::ClickhouseService;
use crate::domain::pricing::PricingService;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub analytics: Arc<ClickhouseService>,
    pub pricing: Arc<PricingService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        match command {
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let analytics = Arc::new(
            ClickhouseService::init(&config.clickhouse)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize analytics service: {}", e))?,
        );
        analytics
            .health_check()
            .await
            .map_err(|e| anyhow::anyhow!("ClickHouse is not reachable: {}", e))?;

        let pricing = Arc::new(
            PricingService::init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize pricing service: {}", e))?,
        );
        tracing::debug!(models = pricing.model_count(), "Pricing data loaded");

        let shutdown = ShutdownService::new();

        Ok(Self {
            shutdown,
            config,
            analytics,
            pricing,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers before any blocking calls
        app.shutdown.install_signal_handlers();

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }
}
