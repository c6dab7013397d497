use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voiceflow::config::RecognizerChoice;
use voiceflow::environment::{BackendResolver, EnvironmentPreference, HttpProbe};
use voiceflow::session::{DictationController, SessionNotice, StartOutcome};
use voiceflow::speech::{Language, PlatformBackendFactory, Recognizer, RecognizerFactory, ScriptedRecognizer};
use voiceflow::{create_router, AppState, Config, HookRegistry, HostBridge, NatsHostBridge};

#[derive(Parser)]
#[command(name = "voiceflow")]
#[command(version)]
#[command(about = "Dictation capture service", long_about = None)]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/voiceflow")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP control API
    Serve,

    /// Run one capture session and print the transcript
    Dictate {
        /// mixed, en or zh (default: configured language)
        #[arg(short, long)]
        language: Option<Language>,

        /// Stop capture after this many seconds
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
    },

    /// Resolve the dev/prod endpoint and print it as JSON
    Resolve {
        /// auto, dev or prod (default: configured preference)
        #[arg(short, long)]
        preference: Option<EnvironmentPreference>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Voiceflow v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve => serve(cfg).await,
        Commands::Dictate { language, seconds } => {
            dictate(cfg, language, Duration::from_secs(seconds)).await
        }
        Commands::Resolve { preference } => resolve(cfg, preference).await,
    }
}

/// Feature-detect the speech capabilities described by the config.
///
/// Returns the host transport too, so callers can forward preference changes.
async fn build_factory(cfg: &Config) -> Result<(PlatformBackendFactory, Option<Arc<NatsHostBridge>>)> {
    let mut factory = PlatformBackendFactory::new().with_event_buffer(cfg.dictation.event_buffer);
    let mut host = None;

    if cfg.bridge.enabled {
        match NatsHostBridge::connect(
            &cfg.bridge.nats_url,
            cfg.bridge.request_subject.clone(),
            cfg.bridge.callback_subject.clone(),
        )
        .await
        {
            Ok(bridge) => {
                let bridge = Arc::new(bridge);
                let hooks = Arc::new(HookRegistry::new());
                bridge.listen(Arc::clone(&hooks)).await?;
                factory = factory.with_bridge(
                    bridge.clone(),
                    hooks,
                    cfg.bridge.engine_config(cfg.dictation.event_buffer),
                );
                host = Some(bridge);
            }
            Err(e) => warn!("Host bridge unavailable, continuing without it: {:#}", e),
        }
    }

    if cfg.embedded.recognizer == RecognizerChoice::Scripted {
        let script = cfg.embedded.script.clone();
        let interval = cfg.embedded.char_interval();
        let recognizer: RecognizerFactory = Arc::new(move || {
            Ok(Box::new(ScriptedRecognizer::new(script.clone(), interval)) as Box<dyn Recognizer>)
        });
        factory = factory.with_recognizer(recognizer);
    }

    Ok((factory, host))
}

fn build_resolver(cfg: &Config) -> Result<BackendResolver> {
    let probe = HttpProbe::new()?;
    Ok(BackendResolver::new(
        cfg.environment.dev_candidate(),
        cfg.environment.prod_candidate(),
        cfg.environment.preference,
        Arc::new(probe),
    ))
}

async fn serve(cfg: Config) -> Result<()> {
    let mut resolver = build_resolver(&cfg)?;
    let resolved = resolver.resolve().await;
    info!("Using {:?} endpoint {} ({:?})", resolved.kind, resolved.endpoint, resolved.status);

    let (factory, host) = build_factory(&cfg).await?;
    let (dictation, notices) = DictationController::spawn(Arc::new(factory), cfg.dictation.session_config());

    let mut state = AppState::new(dictation.clone(), resolver);
    if let Some(host) = host {
        state = state.with_host(host as Arc<dyn HostBridge>);
    }
    state.collect_notices(notices);

    if cfg.dictation.auto_start {
        match dictation.start(None).await {
            Ok(outcome) => info!("Auto-start: {:?}", outcome),
            Err(e) => warn!("Auto-start failed: {}", e),
        }
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    dictation.shutdown().await;
    Ok(())
}

async fn dictate(cfg: Config, language: Option<Language>, seconds: Duration) -> Result<()> {
    let (factory, _host) = build_factory(&cfg).await?;
    let session_config = cfg.dictation.session_config();
    let grace = session_config.grace_window;
    let label = language.unwrap_or(session_config.language).label();
    let (dictation, mut notices) = DictationController::spawn(Arc::new(factory), session_config);

    match dictation.start(language).await.context("Failed to start dictation")? {
        StartOutcome::Started { generation, backend } => {
            info!("Listening in {} ({} backend, session {})", label, backend, generation)
        }
        StartOutcome::AlreadyActive { status } => anyhow::bail!("Dictation already {}", status),
    }

    // The backend may end the session on its own before the deadline
    let notice = match tokio::time::timeout(seconds, notices.recv()).await {
        Ok(notice) => notice,
        Err(_) => {
            dictation.stop().await.context("Failed to stop dictation")?;
            // Empty sessions deliver nothing, so bound the wait
            tokio::time::timeout(grace + Duration::from_secs(1), notices.recv())
                .await
                .unwrap_or(None)
        }
    };

    match notice {
        Some(SessionNotice::Finished(transcript)) => println!("{}", transcript.text),
        Some(SessionNotice::Failed { error, .. }) => {
            dictation.shutdown().await;
            anyhow::bail!("Dictation failed: {}", error);
        }
        None => println!("(no speech captured)"),
    }

    dictation.shutdown().await;
    Ok(())
}

async fn resolve(cfg: Config, preference: Option<EnvironmentPreference>) -> Result<()> {
    let mut resolver = build_resolver(&cfg)?;
    let resolved = match preference {
        Some(preference) => resolver.set_preference(preference).await,
        None => resolver.resolve().await,
    };

    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}
