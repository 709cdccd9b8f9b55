use anyhow::Context;
use clap::Parser;
use rust_dns_views::{
    chain::{ForwardHandler, Handler, ViewHandler},
    config::AppConfig,
    handler::DnsHandler,
    loader::Loader,
    reload::ReloadScheduler,
    resolver::ViewResolver,
    snapshot::SnapshotStore,
    source::Source,
    upstream::{HickoryUpstream, Upstream},
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Split-horizon DNS: vistas por red de origen")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config/views.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = AppConfig::load(&cli.config)
        .with_context(|| format!("no pude leer config: {}", cli.config))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .init();

    let upstreams = cfg.upstreams();
    let upstream: Arc<dyn Upstream> = Arc::new(
        HickoryUpstream::from_upstreams(&upstreams, cfg.request_timeout())
            .context("no pude crear el upstream")?,
    );
    tracing::info!(?upstreams, "upstream listo");

    let loader = Loader::new(
        Source::parse(&cfg.views.clients),
        Source::parse(&cfg.views.records),
        cfg.views.fetch_timeout(),
    );

    // sin primera carga no se sirve nada
    let first = loader
        .load()
        .await
        .context("falló la carga inicial de vistas")?;
    tracing::info!(
        groups = first.snapshot.acl.len(),
        entries = first.snapshot.zones.entry_count(),
        skipped = first.issues.len(),
        "vistas cargadas"
    );
    let store = Arc::new(SnapshotStore::new(first.snapshot));

    let reload = ReloadScheduler::new(loader, store.clone(), cfg.views.reload_interval()).start();

    let resolver = ViewResolver::new(store, upstream.clone())
        .with_match_mode(cfg.views.match_mode)
        .with_dispatch(cfg.views.dispatch);

    let mut views = ViewHandler::new(resolver);
    if cfg.views.fallthrough {
        views = views.with_next(Arc::new(ForwardHandler::new(upstream)));
    }
    let chain: Arc<dyn Handler> = Arc::new(views);

    let handler = DnsHandler::new(chain, cfg.request_timeout());

    let udp = cfg.listen_udp.parse()?;
    let tcp = cfg.listen_tcp.parse()?;

    tracing::info!("Escuchando UDP {}", udp);
    tracing::info!("Escuchando TCP {}", tcp);

    let served = handler
        .serve(udp, tcp, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "no pude instalar el handler de señales");
                std::future::pending::<()>().await;
            }
            tracing::info!("apagado solicitado");
        })
        .await;

    reload.shutdown().await;
    served
}
