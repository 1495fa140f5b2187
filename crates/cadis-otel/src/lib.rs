use once_cell::sync::OnceCell;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

static ACCESS_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    install_console(filter);
}

/// Rolling-file settings for the `http.access` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogRoll {
    pub dir: String,
    pub prefix: String,
    pub rotation: String,
}

impl AccessLogRoll {
    /// Read `CADIS_LOG_ROLL` and friends; `None` unless rolling is enabled.
    pub fn from_env() -> Option<Self> {
        if std::env::var("CADIS_LOG_ROLL").ok().as_deref() != Some("1") {
            return None;
        }
        let dir = std::env::var("CADIS_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
        let prefix = std::env::var("CADIS_LOG_PREFIX").unwrap_or_else(|_| "http-access".into());
        let rotation = std::env::var("CADIS_LOG_ROTATION").unwrap_or_else(|_| "daily".into());
        Some(Self {
            dir,
            prefix,
            rotation: rotation.to_lowercase(),
        })
    }
}

fn install_console(filter: EnvFilter) {
    let fmt_layer = fmt::layer();
    let registry = tracing_subscriber::registry().with(fmt_layer.with_filter(filter));
    if let Some(roll) = AccessLogRoll::from_env() {
        if std::fs::create_dir_all(&roll.dir).is_err() {
            tracing::warn!(directory = %roll.dir, "failed to create access log directory");
        }
        let writer = match roll.rotation.as_str() {
            "hourly" => tracing_appender::rolling::hourly(&roll.dir, &roll.prefix),
            "minutely" => tracing_appender::rolling::minutely(&roll.dir, &roll.prefix),
            "never" => tracing_appender::rolling::never(&roll.dir, &roll.prefix),
            _ => tracing_appender::rolling::daily(&roll.dir, &roll.prefix),
        };
        let (nb, guard) = tracing_appender::non_blocking(writer);
        let _ = ACCESS_GUARD.set(guard);
        let targets = Targets::new().with_target("http.access", tracing::Level::INFO);
        let access_layer = fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(nb)
            .with_filter(targets);
        let subscriber = registry.with(access_layer);
        let _ = subscriber.try_init();
    } else {
        let _ = registry.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    /// Holds the env lock and restores touched variables on drop.
    struct EnvGuard {
        _lock: MutexGuard<'static, ()>,
        saved: HashMap<String, Option<String>>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self {
                _lock: ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner()),
                saved: HashMap::new(),
            }
        }

        fn set_opt(&mut self, key: &str, value: Option<&str>) {
            self.saved
                .entry(key.to_string())
                .or_insert_with(|| std::env::var(key).ok());
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain() {
                match value {
                    Some(v) => std::env::set_var(&key, v),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }

    #[test]
    fn roll_disabled_without_flag() {
        let mut env = EnvGuard::new();
        env.set_opt("CADIS_LOG_ROLL", None);
        assert!(AccessLogRoll::from_env().is_none());
        env.set_opt("CADIS_LOG_ROLL", Some("true"));
        assert!(AccessLogRoll::from_env().is_none());
    }

    #[test]
    fn roll_defaults_and_lowercases_rotation() {
        let mut env = EnvGuard::new();
        env.set_opt("CADIS_LOG_ROLL", Some("1"));
        env.set_opt("CADIS_LOG_DIR", None);
        env.set_opt("CADIS_LOG_PREFIX", None);
        env.set_opt("CADIS_LOG_ROTATION", Some("Hourly"));
        let roll = AccessLogRoll::from_env().expect("enabled");
        assert_eq!(roll.dir, "logs");
        assert_eq!(roll.prefix, "http-access");
        assert_eq!(roll.rotation, "hourly");
    }
}
