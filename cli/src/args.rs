//! Command-line flags and their mapping onto library configs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use checkstream_core::policy::RetryConfig;
use checkstream_core::{EventKind, SupervisorConfig, UnknownKindPolicy};
use checkstream_http::{validate_host_port, IcingaConfig, Scheme};
use checkstream_redis::{FlapjackConfig, FlapjackVersion};

use crate::logging::LogConfig;

#[derive(Parser)]
#[command(
    name = "checkstream",
    about = "Stream Icinga 2 check results into Flapjack",
    long_about = "
Subscribes to the Icinga 2 event stream API, tags every check result with the
host or service `vars.tags`, and pushes it onto Flapjack's Redis event queue.
Reconnects with exponential backoff until interrupted (SIGINT / SIGTERM).

ENVIRONMENT VARIABLES:
  ICINGA_USER        API user
  ICINGA_PASSWORD    API password
  RUST_LOG           tracing filter, overrides --log-level and --debug
",
    version
)]
pub struct Cli {
    /// Icinga 2 API endpoint to connect to
    #[arg(long, default_value = "localhost:5665", value_parser = host_port)]
    pub icinga: String,

    /// Icinga 2 event queue name to use
    #[arg(long, default_value = "flapjack")]
    pub queue: String,

    /// Event types to subscribe to (repeatable)
    #[arg(long = "types", value_parser = event_kind, default_values_t = EventKind::ALL.to_vec())]
    pub types: Vec<EventKind>,

    /// Icinga 2 API user
    #[arg(long, env = "ICINGA_USER", default_value = "root")]
    pub icinga_user: String,

    /// Icinga 2 API password
    #[arg(long, env = "ICINGA_PASSWORD", default_value = "", hide_env_values = true)]
    pub icinga_password: String,

    /// PEM file with the CA that signed the API certificate. Without it the
    /// server certificate is not verified.
    #[arg(long)]
    pub icinga_certfile: Option<PathBuf>,

    /// Timeout for establishing the API connection
    #[arg(long, default_value_t = 5_000)]
    pub icinga_timeout_ms: u64,

    /// TCP keepalive interval for API connections
    #[arg(long, default_value_t = 30_000)]
    pub icinga_keepalive_ms: u64,

    /// Timeout for one object lookup
    #[arg(long, default_value_t = 10_000)]
    pub lookup_timeout_ms: u64,

    /// Cache lookup results for this long (0 disables the cache)
    #[arg(long, default_value_t = 0)]
    pub lookup_cache_ttl_ms: u64,

    /// Redis server to connect to (Flapjack packages run Redis on 6380)
    #[arg(long, default_value = "localhost:6380", value_parser = host_port)]
    pub redis: String,

    /// Redis database to connect to
    #[arg(long, default_value_t = 0)]
    pub db: u32,

    /// Flapjack event queue protocol version
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub flapjack_version: u8,

    /// Redis list Flapjack reads events from
    #[arg(long, default_value = "events")]
    pub flapjack_events: String,

    /// Delay before the first reconnect
    #[arg(long, default_value_t = 500)]
    pub reconnect_initial_ms: u64,

    /// Cap on the reconnect delay
    #[arg(long, default_value_t = 60_000)]
    pub reconnect_max_ms: u64,

    /// Give up after this many consecutive failed reconnects (default: never)
    #[arg(long)]
    pub max_reconnects: Option<u32>,

    /// Ignore events of unrecognised types instead of reconnecting
    #[arg(long)]
    pub skip_unknown_kinds: bool,

    /// Log events instead of pushing them to Redis
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output, including every raw stream value
    #[arg(long)]
    pub debug: bool,

    /// Log level: trace | debug | info | warn | error
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit JSON structured logs
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: if self.debug { "debug".into() } else { self.log_level.clone() },
            json: self.log_json,
            ..Default::default()
        }
    }

    pub fn icinga_config(&self) -> Result<IcingaConfig> {
        let ca_pem = match &self.icinga_certfile {
            Some(path) => Some(
                std::fs::read(path)
                    .with_context(|| format!("read CA certificate '{}'", path.display()))?,
            ),
            None => None,
        };
        Ok(IcingaConfig {
            server: self.icinga.clone(),
            scheme: Scheme::Https,
            queue: self.queue.clone(),
            types: self.types.clone(),
            user: self.icinga_user.clone(),
            password: self.icinga_password.clone(),
            ca_pem,
            connect_timeout: Duration::from_millis(self.icinga_timeout_ms),
            keepalive: Duration::from_millis(self.icinga_keepalive_ms),
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
        })
    }

    pub fn flapjack_config(&self) -> FlapjackConfig {
        FlapjackConfig {
            server: self.redis.clone(),
            database: i64::from(self.db),
            version: FlapjackVersion::from_number(self.flapjack_version).unwrap_or_default(),
            events_queue: self.flapjack_events.clone(),
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            retry: RetryConfig {
                max_retries: self.max_reconnects,
                initial_backoff: Duration::from_millis(self.reconnect_initial_ms),
                max_backoff: Duration::from_millis(self.reconnect_max_ms),
                ..Default::default()
            },
            unknown_kinds: if self.skip_unknown_kinds {
                UnknownKindPolicy::Skip
            } else {
                UnknownKindPolicy::Fail
            },
            log_raw_values: self.debug,
        }
    }

    /// Cache TTL, or `None` when caching is off.
    pub fn lookup_cache_ttl(&self) -> Option<Duration> {
        (self.lookup_cache_ttl_ms > 0).then(|| Duration::from_millis(self.lookup_cache_ttl_ms))
    }
}

fn host_port(s: &str) -> Result<String, String> {
    validate_host_port(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}

fn event_kind(s: &str) -> Result<EventKind, String> {
    EventKind::from_wire(s).ok_or_else(|| {
        let known: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown event type '{s}' (expected one of: {})", known.join(", "))
    })
}
