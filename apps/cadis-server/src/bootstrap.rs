use anyhow::Context as _;
use cadis_kernel::Kernel;
use tracing::info;
use utoipa::OpenApi;

use crate::{access_log, app_state::AppState, router::build_router};

pub(crate) struct BootstrapOutput {
    pub router: axum::Router<()>,
}

/// Load config, open the store and seed the catalog.
pub(crate) async fn build() -> anyhow::Result<BootstrapOutput> {
    let config = cadis_core::load_from_env().context("load config")?;
    let dir = config.state_dir();
    let kernel = Kernel::open(&dir).with_context(|| format!("open kernel at {}", dir.display()))?;
    let inserted = kernel
        .seed_scenarios_async(cadis_core::seed_scenarios())
        .await
        .context("seed scenarios")?;
    info!(
        state_dir = %dir.display(),
        seeded = inserted,
        "kernel ready"
    );
    Ok(BootstrapOutput {
        router: build_router(AppState::new(kernel, config)),
    })
}

pub(crate) fn attach_http_layers(
    router: axum::Router<()>,
    concurrency_limit: usize,
) -> axum::Router<()> {
    use tower::limit::ConcurrencyLimitLayer;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
}

pub(crate) fn attach_global_layers(router: axum::Router<()>) -> axum::Router<()> {
    router.layer(axum::middleware::from_fn(access_log::access_log_mw))
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum HttpConfigError {
    #[error("invalid CADIS_HTTP_MAX_CONC: {0}")]
    InvalidConcurrency(String),
    #[error("invalid CADIS_PORT: {0}")]
    InvalidPort(String),
    #[error("invalid CADIS_BIND: {0}")]
    InvalidBind(String),
    #[error(
        "CADIS_BIND={bind} is public and CADIS_ADMIN_TOKEN/CADIS_ADMIN_TOKEN_SHA256 not set; refusing to start"
    )]
    MissingAdminToken { bind: String },
}

pub(crate) struct HttpConfig {
    pub addr: std::net::SocketAddr,
    pub concurrency_limit: usize,
}

pub(crate) fn http_config_from_env() -> Result<HttpConfig, HttpConfigError> {
    let concurrency_limit = std::env::var("CADIS_HTTP_MAX_CONC")
        .ok()
        .map(|raw| {
            raw.parse()
                .map_err(|_| HttpConfigError::InvalidConcurrency(raw))
        })
        .transpose()?
        .unwrap_or(256);

    let bind = std::env::var("CADIS_BIND").unwrap_or_else(|_| "127.0.0.1".into());
    let port_raw = std::env::var("CADIS_PORT").unwrap_or_else(|_| "8095".into());
    let port: u16 = port_raw
        .parse()
        .map_err(|_| HttpConfigError::InvalidPort(port_raw))?;

    enforce_admin_token_guard(&bind)?;

    let addr = format!("{}:{}", bind, port)
        .parse()
        .map_err(|_| HttpConfigError::InvalidBind(bind.clone()))?;

    Ok(HttpConfig {
        addr,
        concurrency_limit,
    })
}

/// When `OPENAPI_OUT` is set, write the OpenAPI YAML there and report the path.
pub(crate) fn ensure_openapi_export() -> Result<Option<String>, std::io::Error> {
    if let Ok(path) = std::env::var("OPENAPI_OUT") {
        export_openapi(&path)?;
        return Ok(Some(path));
    }
    Ok(None)
}

fn enforce_admin_token_guard(bind: &str) -> Result<(), HttpConfigError> {
    let token_set = std::env::var("CADIS_ADMIN_TOKEN")
        .ok()
        .is_some_and(|v| !v.is_empty())
        || std::env::var("CADIS_ADMIN_TOKEN_SHA256")
            .ok()
            .is_some_and(|v| !v.is_empty());

    let bind_lower = bind.trim().to_ascii_lowercase();
    let is_loopback = matches!(
        bind_lower.as_str(),
        "127.0.0.1" | "::1" | "[::1]" | "localhost"
    );

    if !is_loopback && !token_set {
        return Err(HttpConfigError::MissingAdminToken {
            bind: bind.to_string(),
        });
    }
    Ok(())
}

fn export_openapi(path: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = crate::openapi::ApiDoc::openapi()
        .to_yaml()
        .unwrap_or_else(|_| "openapi: 3.1.0".into());
    std::fs::write(path, yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env as test_env;

    #[test]
    fn loopback_bind_needs_no_token() {
        let mut guard = test_env::guard();
        guard.remove("CADIS_ADMIN_TOKEN");
        guard.remove("CADIS_ADMIN_TOKEN_SHA256");
        assert!(enforce_admin_token_guard("127.0.0.1").is_ok());
        assert!(enforce_admin_token_guard("localhost").is_ok());
    }

    #[test]
    fn public_bind_requires_token() {
        let mut guard = test_env::guard();
        guard.remove("CADIS_ADMIN_TOKEN");
        guard.remove("CADIS_ADMIN_TOKEN_SHA256");
        let err = enforce_admin_token_guard("0.0.0.0").unwrap_err();
        assert!(matches!(err, HttpConfigError::MissingAdminToken { .. }));
    }

    #[test]
    fn public_bind_with_token_is_allowed() {
        let mut guard = test_env::guard();
        guard.set("CADIS_ADMIN_TOKEN", "token");
        assert!(enforce_admin_token_guard("0.0.0.0").is_ok());
    }

    #[test]
    fn http_config_defaults_and_bad_port() {
        let mut guard = test_env::guard();
        guard.remove("CADIS_BIND");
        guard.remove("CADIS_HTTP_MAX_CONC");
        guard.remove("CADIS_PORT");
        let cfg = http_config_from_env().expect("defaults");
        assert_eq!(cfg.addr.port(), 8095);
        assert_eq!(cfg.concurrency_limit, 256);

        guard.set("CADIS_PORT", "not-a-port");
        let err = http_config_from_env().err().expect("bad port");
        assert!(matches!(err, HttpConfigError::InvalidPort(_)));
    }

    #[test]
    fn openapi_export_writes_yaml() {
        let mut guard = test_env::guard();
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("docs").join("openapi.yaml");
        guard.set("OPENAPI_OUT", out.display().to_string());
        let written = ensure_openapi_export().expect("export");
        assert_eq!(written.as_deref(), Some(out.to_str().expect("utf8")));
        let body = std::fs::read_to_string(&out).expect("read");
        assert!(body.contains("/coding/progress/recompute"));
    }
}
