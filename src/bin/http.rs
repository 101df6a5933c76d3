#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use programme_engine::{
        ConfiguredCalendarProvider, EngineConfig, EntryStore, MemoryEntryStore, ProgrammeEngine,
        TracingAuditSink, http_api,
    };
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("programme_engine=info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("PROGRAMME_ENGINE_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    let config = EngineConfig::from_env()?;
    let calendars = Arc::new(ConfiguredCalendarProvider::new(&config));

    let engine = match std::env::var("PROGRAMME_ENGINE_DB") {
        #[cfg(feature = "sqlite")]
        Ok(path) if !path.trim().is_empty() => {
            let store = programme_engine::SqliteEntryStore::new(path.trim())?;
            let audit = Arc::new(store.audit_log());
            tracing::info!(db = %path.trim(), "using sqlite store");
            ProgrammeEngine::new(Arc::new(store), calendars, audit, config)
        }
        _ => {
            let store: Arc<dyn EntryStore> = Arc::new(MemoryEntryStore::new());
            ProgrammeEngine::new(store, calendars, Arc::new(TracingAuditSink), config)
        }
    };

    http_api::serve(addr, engine).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
