use axum::http::HeaderMap;
use sha2::Digest as _;
use std::net::SocketAddr;
use tracing::{error, info};

mod access_log;
mod api;
mod app_state;
mod bootstrap;
mod extract;
mod openapi;
mod responses;
#[cfg(test)]
mod test_support;

mod router;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() {
    match bootstrap::ensure_openapi_export() {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(err) => {
            eprintln!("error: failed to write generated OPENAPI_OUT: {err}");
            std::process::exit(2);
        }
    }

    cadis_otel::init();

    let http_cfg = match bootstrap::http_config_from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let bootstrap::BootstrapOutput { router } = match bootstrap::build().await {
        Ok(out) => out,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    };

    let app = bootstrap::attach_global_layers(bootstrap::attach_http_layers(
        router,
        http_cfg.concurrency_limit,
    ));

    let listener = match tokio::net::TcpListener::bind(http_cfg.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("error: bind {}: {err}", http_cfg.addr);
            std::process::exit(2);
        }
    };
    info!(addr = %http_cfg.addr, "cadis-server listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!("http server exited with error: {err}");
    }
    info!("cadis-server stopped");
}

async fn shutdown_signal() {
    info!("shutdown signal listener active");
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                error!("install SIGTERM handler: {err}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}


fn env_truthy(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "debug"
            )
        })
        .unwrap_or(false)
}

/// Gate for mutating routes. `CADIS_DEBUG` opens them for local use; otherwise
/// the caller must present `CADIS_ADMIN_TOKEN` (or a token hashing to
/// `CADIS_ADMIN_TOKEN_SHA256`) as a bearer token or `X-CADIS-Admin`.
pub(crate) fn admin_ok(headers: &HeaderMap) -> bool {
    if env_truthy("CADIS_DEBUG") {
        return true;
    }

    let token_plain = std::env::var("CADIS_ADMIN_TOKEN")
        .ok()
        .filter(|t| !t.is_empty());
    let token_hash = std::env::var("CADIS_ADMIN_TOKEN_SHA256")
        .ok()
        .filter(|t| !t.is_empty());
    if token_plain.is_none() && token_hash.is_none() {
        return false;
    }
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|hv| hv.strip_prefix("Bearer "))
        .or_else(|| headers.get("X-CADIS-Admin").and_then(|h| h.to_str().ok()));
    let Some(presented) = presented else {
        return false;
    };

    fn ct_eq(a: &[u8], b: &[u8]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
    }
    let plain_ok = token_plain
        .as_ref()
        .is_some_and(|p| ct_eq(p.as_bytes(), presented.as_bytes()));
    let hash_ok = token_hash.as_ref().is_some_and(|want| {
        let got = hex::encode(sha2::Sha256::digest(presented.as_bytes()));
        ct_eq(want.trim().to_ascii_lowercase().as_bytes(), got.as_bytes())
    });
    plain_ok || hash_ok
}
