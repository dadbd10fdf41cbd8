// src/state.rs
// Process wiring: backends, bus, hosted specialists, stores and the orchestrator

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    backend::FallbackChain,
    bus::MessageBus,
    config::CoreConfig,
    delegation::DelegationPolicy,
    memory::{JsonlMemoryStore, MemoryStore},
    orchestrator::Orchestrator,
    persistence::{FileSnapshotStore, HashChainLedger},
    persona::Persona,
    resilience::{PostProcessor, ResilienceInvoker},
    specialist::{
        CodeSpecialist, ConfigOpsSpecialist, ResearchSpecialist, SecuritySpecialist,
        SpecialistRoster,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub bus: Arc<MessageBus>,
    pub roster: SpecialistRoster,
    pub orchestrator: Arc<Orchestrator>,
}

/// Build everything from configuration.
pub async fn create_app_state(config: CoreConfig) -> Result<AppState> {
    let config = Arc::new(config);

    // -------- Backends --------
    let chain = FallbackChain::from_config(&config).context("building backend chain")?;
    if chain.is_empty() {
        warn!("No backend has a usable API key; replies will be the configuration sentinel");
    } else {
        info!("Backend chain: [{}]", chain.names().join(", "));
    }
    match config.provider(&config.preferred_provider) {
        Some(settings) => info!(
            "Preferred provider {} (model {})",
            settings.spec.display, settings.model
        ),
        None => warn!(
            "Unknown LLM_PROVIDER '{}', keeping configuration order",
            config.preferred_provider
        ),
    }
    // Specialists reuse the preferred backend
    let preferred = chain.backends().first().cloned();

    // -------- Specialists --------
    let bus = Arc::new(MessageBus::new());
    let mut roster = SpecialistRoster::new();
    roster.attach(&bus, Arc::new(CodeSpecialist::new(preferred.clone())));
    roster.attach(
        &bus,
        Arc::new(
            ResearchSpecialist::new(config.logs_dir(), preferred)
                .with_max_age(config.log_scan_window()),
        ),
    );
    roster.attach(&bus, Arc::new(SecuritySpecialist::new()));
    roster.attach(&bus, Arc::new(ConfigOpsSpecialist::new(Arc::clone(&config))));

    // -------- Storage --------
    let mut hooks = PostProcessor::new(config.ledger_marker.clone())
        .with_snapshots(Arc::new(FileSnapshotStore::new(config.snapshot_dir())));
    match HashChainLedger::open(config.ledger_path()).await {
        Ok(ledger) => hooks = hooks.with_ledger(Arc::new(ledger)),
        Err(e) => warn!(
            "Ledger {} unavailable, knowledge entries will not be recorded: {:#}",
            config.ledger_path().display(),
            e
        ),
    }
    let memory: Arc<dyn MemoryStore> = Arc::new(JsonlMemoryStore::new(
        config.memory_dir(),
        config.history_window,
    ));

    // -------- Orchestrator --------
    let invoker = ResilienceInvoker::from_config(chain, &config).with_post_processor(hooks);
    let delegation = DelegationPolicy::new(Arc::clone(&bus), config.specialist_timeout());
    let persona = Persona::load(config.soul_path.as_deref());
    let orchestrator = Arc::new(Orchestrator::new(delegation, invoker, memory, persona));

    info!(
        "Runtime ready: {} specialist(s), invoke mode {}",
        roster.len(),
        orchestrator.invoker().effective_mode().as_str()
    );

    Ok(AppState {
        config,
        bus,
        roster,
        orchestrator,
    })
}
