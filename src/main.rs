use std::sync::Arc;

use scholar::auth::AuthGate;
use scholar::cli;
use scholar::config::AppConfig;
use scholar::error::AuthError;
use scholar::llm::HttpProviderFactory;
use scholar::store::JsonFileStore;
use scholar::tutor::Tutor;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Password attempts before giving up.
const MAX_ATTEMPTS: usize = 3;

fn init_tracing(config: &AppConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_to_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    // The REPL owns the terminal, so logs go to a daily file by default.
    let appender = tracing_appender::rolling::daily(config.log_dir(), "scholar.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Some(guard)
}

async fn unlock(gate: &AuthGate) -> anyhow::Result<bool> {
    if gate.is_authenticated().await {
        return Ok(true);
    }
    for _ in 0..MAX_ATTEMPTS {
        let input = rpassword::prompt_password("Access password: ")?;
        match gate.unlock(input.trim()).await {
            Ok(()) => return Ok(true),
            Err(AuthError::WrongPassword) => eprintln!("Incorrect password."),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let _log_guard = init_tracing(&config);

    eprintln!("📚 Scholar v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data: {}", config.data_dir.display());

    let gate = AuthGate::new(config.auth_path(), config.site_password.clone());
    if !unlock(&gate).await? {
        eprintln!("Too many failed attempts.");
        std::process::exit(1);
    }

    let store = JsonFileStore::new(config.state_path());
    let mut tutor = Tutor::load(
        store,
        Arc::new(HttpProviderFactory),
        config.api_key.clone(),
    )
    .await?;

    let state = tutor.state();
    let active = state.active_config();
    eprintln!("   Provider: {} ({})", active.name, active.model);
    eprintln!(
        "   Sessions: {} · Knowledge: {} · Weak points: {}",
        state.sessions.len(),
        state.knowledge_base.len(),
        state.weak_points.len()
    );
    eprintln!("   Type a question and press Enter. /help for commands, /quit to exit.\n");
    cli::warn_missing_key(&tutor);

    tracing::info!(data_dir = %config.data_dir.display(), "Scholar started");
    cli::run(&mut tutor, &gate).await?;
    tracing::info!("Scholar stopped");
    Ok(())
}
