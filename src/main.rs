use codexpert_analysis::analysis::{Analyzer, JobRegister, analysis_routes, spawn_sweep_task};
use codexpert_analysis::config::ServerConfig;
use codexpert_analysis::llm::create_provider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export CODEXPERT_API_KEY=...");
        std::process::exit(1);
    });

    // Initialize tracing: stderr always, plus a daily file when a log dir is set.
    // The guard must live as long as the process to flush buffered lines.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "codexpert-analysis.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("🔍 CodeXpert analysis v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {} ({})", config.llm.backend, config.llm.model);
    eprintln!("   Submit: http://0.0.0.0:{}/api/code/{{review,bugs,comments}}", config.port);
    eprintln!("   Poll:   http://0.0.0.0:{}/api/code/jobs/{{id}}", config.port);
    eprintln!(
        "   Jobs kept for {} min, provider timeout {}s\n",
        config.analysis.retention.as_secs() / 60,
        config.analysis.provider_timeout.as_secs()
    );

    let llm = create_provider(&config.llm)?;

    // ── Job register ────────────────────────────────────────────────────
    let register = JobRegister::new(config.analysis.retention);
    let _sweep_handle = spawn_sweep_task(register.clone(), config.analysis.sweep_interval);

    let analyzer = Analyzer::new(llm, register, config.analysis.clone());
    let app = analysis_routes(analyzer);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Analysis server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
