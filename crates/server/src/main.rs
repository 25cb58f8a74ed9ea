//! Exchange server binary
//!
//! Wires the catalog, capabilities, backends, and dispatcher together,
//! validates the configuration, and serves the telephony endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use potsbox_config::{load_settings, ServiceCatalog};
use potsbox_core::{LanguageModel, SpeechToText};
use potsbox_exchange::{
    CallSessionManager, ConversationStore, DispatcherConfig, TurnDispatcher,
};
use potsbox_llm::{ChatBackend, ChatConfig};
use potsbox_server::{create_router, AppState};
use potsbox_speech::{AudioMailbox, HttpSynthesizer, HttpTranscriber, TtsSpeaker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings(None).context("loading settings")?;
    let api_key = std::env::var(&settings.llm.api_key_env).ok();
    if api_key.is_none() {
        tracing::warn!(
            env = %settings.llm.api_key_env,
            "no API key in environment; only a keyless gateway will work"
        );
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.llm.timeout_secs))
        .build()
        .context("building HTTP client")?;

    // Capabilities and the catalog must agree before we answer anything.
    let registry = Arc::new(potsbox_capability::builtin(client.clone()));
    let catalog = Arc::new(ServiceCatalog::builtin());
    catalog
        .validate(&registry.infos())
        .context("service catalog failed validation")?;

    let chat_backend = |model: &str| -> anyhow::Result<Arc<dyn LanguageModel>> {
        Ok(Arc::new(
            ChatBackend::new(ChatConfig {
                model: model.to_string(),
                endpoint: settings.llm.endpoint.clone(),
                api_key: api_key.clone(),
                timeout: Duration::from_secs(settings.llm.timeout_secs),
                max_retries: settings.llm.max_retries,
                initial_backoff: Duration::from_millis(settings.llm.initial_backoff_ms),
            })
            .context("building chat backend")?,
        ))
    };
    let llm = chat_backend(&settings.llm.chat_model)?;

    let mailbox = Arc::new(
        AudioMailbox::new(&settings.speech.sounds_dir).context("opening audio mailbox")?,
    );
    let synthesizer = Arc::new(HttpSynthesizer::new(
        client.clone(),
        settings.llm.endpoint.clone(),
        api_key.clone(),
        settings.speech.tts_model.clone(),
    ));
    let speaker = Arc::new(TtsSpeaker::new(synthesizer, mailbox.clone()));
    let transcriber: Arc<dyn SpeechToText> = Arc::new(HttpTranscriber::new(
        client.clone(),
        settings.llm.endpoint.clone(),
        api_key.clone(),
        settings.speech.transcribe_model.clone(),
    ));

    let mut dispatcher = TurnDispatcher::new(
        catalog,
        llm,
        registry,
        speaker,
        Arc::new(ConversationStore::new()),
        DispatcherConfig {
            context_window: settings.exchange.context_window,
            confidence_threshold: settings.exchange.intent_confidence_threshold,
            utc_offset_hours: settings.caller.utc_offset_hours,
        },
    );
    if settings.llm.intent_model != settings.llm.chat_model {
        dispatcher = dispatcher.with_classifier_llm(chat_backend(&settings.llm.intent_model)?);
    }

    let manager = Arc::new(CallSessionManager::new(
        Arc::new(dispatcher),
        settings.caller.default_city.clone(),
    ));

    spawn_mailbox_sweep(
        mailbox.clone(),
        Duration::from_secs(settings.speech.mailbox_max_age_secs),
    );

    let state = AppState {
        manager,
        transcriber,
        mailbox,
    };

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "exchange listening");

    axum::serve(listener, create_router(state))
        .await
        .context("serving")?;

    Ok(())
}

/// Periodically delete mailbox files the telephony layer is done with.
fn spawn_mailbox_sweep(mailbox: Arc<AudioMailbox>, max_age: Duration) {
    let interval = max_age.max(Duration::from_secs(30));

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            match mailbox.sweep(max_age) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "swept stale mailbox files"),
                Err(err) => tracing::warn!(error = %err, "mailbox sweep failed"),
            }
        }
    });
}
