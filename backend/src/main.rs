//! Backend entry-point: loads configuration, wires adapters and serves HTTP
//! and WebSocket traffic.

use std::io;

use actix_web::web;
#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetricsBuilder;
use mockable::DefaultEnv;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use cervello::inbound::http::health::HealthState;
use cervello::inbound::http::session_config::{BuildMode, session_settings_from_env};
use cervello::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use cervello::server::{ServerConfig, ServiceSettings, build_services, create_server};
use cervello::settings::CervelloSettings;

#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = CervelloSettings::load().map_err(|err| io::Error::other(err.to_string()))?;

    let mut session = session_settings_from_env(&DefaultEnv::new(), BuildMode::from_debug_assertions())
        .map_err(io::Error::other)?;
    if let Some(secure) = settings.cookie_secure {
        session.cookie_secure = secure;
    }

    let pool = match settings.database_url() {
        Some(url) => {
            let applied = run_pending_migrations(url).await.map_err(io::Error::other)?;
            info!(count = applied.len(), "database migrations applied");
            Some(DbPool::new(PoolConfig::new(url)).await.map_err(io::Error::other)?)
        }
        None => None,
    };

    let service_settings = ServiceSettings::from_settings(&settings).map_err(io::Error::other)?;
    let services = build_services(&service_settings, pool.as_ref());
    let bind_addr = settings.bind_addr().map_err(io::Error::other)?;

    let config = ServerConfig::new(session, bind_addr, services);
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(Some(make_metrics()?));

    let health_state = web::Data::new(HealthState::new());
    create_server(health_state, config)?.await
}

#[cfg(feature = "metrics")]
fn make_metrics() -> io::Result<actix_web_prom::PrometheusMetrics> {
    PrometheusMetricsBuilder::new("cervello")
        .endpoint("/metrics")
        .build()
        .map_err(|err| io::Error::other(format!("configure Prometheus metrics: {err}")))
}
