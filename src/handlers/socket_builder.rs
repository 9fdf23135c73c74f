//! Builder for [`LogstashHandler`](crate::socket_handler::LogstashHandler).
//!
//! Exposes endpoint selection, TLS, queue sizing and backpressure, timeout
//! tuning and exponential backoff parameters. Every setter is optional;
//! [`LogstashHandlerBuilder::build`] validates the combination before any
//! thread is spawned.

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use crate::socket_handler::{
    BackoffPolicy, BackpressurePolicy, Connector, DeliveryConfig, DeliveryObserver, FrameEncoder,
    JsonEncoder, LogObserver, LogstashHandler, QueueConfig, SocketHandlerConfig, TcpConnector,
    TcpTransport, TlsOptions,
};

use super::{HandlerBuildError, policy::parse_policy_string};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TlsConfig {
    verify: bool,
}

/// Overrides for the reconnection backoff applied by the handler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackoffOverrides {
    initial_ms: Option<u64>,
    max_ms: Option<u64>,
    multiplier: Option<f64>,
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(HandlerBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

impl BackoffOverrides {
    /// Create overrides with no custom values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the first reconnection delay in milliseconds.
    pub fn with_initial_ms(mut self, initial_ms: u64) -> Self {
        self.initial_ms = Some(initial_ms);
        self
    }

    /// Override the delay ceiling in milliseconds.
    pub fn with_max_ms(mut self, max_ms: u64) -> Self {
        self.max_ms = Some(max_ms);
        self
    }

    /// Override the growth factor applied after each failure.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    fn apply(&self, policy: &mut BackoffPolicy) -> Result<(), HandlerBuildError> {
        if let Some(initial) = self.initial_ms {
            ensure_positive!(initial, "backoff_initial_ms")?;
            policy.initial = Duration::from_millis(initial);
        }
        if let Some(max) = self.max_ms {
            ensure_positive!(max, "backoff_max_ms")?;
            policy.max = Duration::from_millis(max);
        }
        if let Some(multiplier) = self.multiplier {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(HandlerBuildError::InvalidConfig(
                    "backoff_multiplier must be a finite number of at least 1.0".into(),
                ));
            }
            policy.multiplier = multiplier;
        }
        if policy.initial > policy.max {
            return Err(HandlerBuildError::InvalidConfig(
                "backoff_initial_ms must not exceed backoff_max_ms".into(),
            ));
        }
        Ok(())
    }
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`LogstashHandler`] instances.
#[derive(Clone, Debug, Default)]
pub struct LogstashHandlerBuilder {
    host: Option<String>,
    port: Option<u16>,
    tls: Option<TlsConfig>,
    tls_domain: Option<String>,
    capacity: Option<usize>,
    policy: Option<BackpressurePolicy>,
    enqueue_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    drain_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
    max_frame_size: Option<usize>,
    backoff: BackoffOverrides,
    encoder_host: Option<String>,
    static_fields: Vec<(String, String)>,
}

impl LogstashHandlerBuilder {
    /// Create a new builder with no endpoint configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ship to `host:port` over TCP.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// Enable TLS. When `verify` is false certificate and hostname checks
    /// are skipped.
    pub fn with_tls(mut self, verify: bool) -> Self {
        self.tls = Some(TlsConfig { verify });
        self
    }

    /// Present `domain` during the TLS handshake instead of the host name.
    pub fn with_tls_domain(mut self, domain: impl Into<String>) -> Self {
        self.tls_domain = Some(domain.into());
        self
    }

    /// Bound the queue to `capacity` frames. Unbounded when never called.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    option_setter!(
        #[doc = "Choose how a full queue treats new records."]
        with_backpressure,
        policy,
        BackpressurePolicy
    );
    option_setter!(
        #[doc = "Fail blocked enqueues after this many milliseconds."]
        with_enqueue_timeout_ms,
        enqueue_timeout_ms,
        u64
    );
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(
        #[doc = "How long reconnection may continue after `close()`."]
        with_drain_timeout_ms,
        drain_timeout_ms,
        u64
    );
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);
    option_setter!(with_max_frame_size, max_frame_size, usize);

    /// Parse a policy string such as `"drop-oldest"` or `"timeout:250"`.
    pub fn with_policy_str(mut self, policy: &str) -> Result<Self, HandlerBuildError> {
        let (policy, timeout) = parse_policy_string(policy)?;
        self.policy = Some(policy);
        if let Some(timeout) = timeout {
            self.enqueue_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        }
        Ok(self)
    }

    /// Override backoff timings using the provided overrides.
    ///
    /// See [`BackoffOverrides`] for fluent helpers when constructing the
    /// override set from Rust.
    pub fn with_backoff(mut self, overrides: BackoffOverrides) -> Self {
        self.backoff = overrides;
        self
    }

    /// Report `host` in every JSON document.
    pub fn with_source_host(mut self, host: impl Into<String>) -> Self {
        self.encoder_host = Some(host.into());
        self
    }

    /// Attach a constant field to every document's `extra` object.
    pub fn with_static_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_fields.push((key.into(), value.into()));
        self
    }

    fn validate_endpoint(&self) -> Result<(), HandlerBuildError> {
        match &self.host {
            None => Err(HandlerBuildError::InvalidConfig(
                "handler requires a tcp endpoint".into(),
            )),
            Some(host) if host.trim().is_empty() => Err(HandlerBuildError::InvalidConfig(
                "tcp host must not be empty".into(),
            )),
            Some(_) if self.port == Some(0) => Err(HandlerBuildError::InvalidConfig(
                "tcp port must be greater than zero".into(),
            )),
            Some(_) if self.tls_domain.is_some() && self.tls.is_none() => Err(
                HandlerBuildError::InvalidConfig("tls_domain requires tls to be enabled".into()),
            ),
            _ => Ok(()),
        }
    }

    fn validate_queue(&self) -> Result<(), HandlerBuildError> {
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        if self.enqueue_timeout_ms.is_some()
            && self.policy.is_some_and(|p| p != BackpressurePolicy::Block)
        {
            return Err(HandlerBuildError::InvalidConfig(
                "enqueue_timeout_ms only applies to the block policy".into(),
            ));
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), HandlerBuildError> {
        if let Some(timeout) = self.enqueue_timeout_ms {
            ensure_positive!(timeout, "enqueue_timeout_ms")?;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        if let Some(interval) = self.warn_interval_ms {
            ensure_positive!(interval, "warn_interval_ms")?;
        }
        Ok(())
    }

    /// Validate the transport-independent settings.
    fn delivery_config(&self) -> Result<DeliveryConfig, HandlerBuildError> {
        self.validate_queue()?;
        self.validate_timeouts()?;
        let mut delivery = DeliveryConfig {
            queue: QueueConfig {
                capacity: self.capacity.and_then(NonZeroUsize::new),
                policy: self.policy.unwrap_or_default(),
                enqueue_timeout: self.enqueue_timeout_ms.map(Duration::from_millis),
            },
            ..DeliveryConfig::default()
        };
        if let Some(timeout) = self.connect_timeout_ms {
            delivery.connect_timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = self.write_timeout_ms {
            delivery.write_timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = self.drain_timeout_ms {
            delivery.drain_timeout = Duration::from_millis(timeout);
        }
        if let Some(interval) = self.warn_interval_ms {
            delivery.warn_interval = Duration::from_millis(interval);
        }
        self.backoff.apply(&mut delivery.backoff)?;
        Ok(delivery)
    }

    /// Validate and produce the runtime configuration.
    pub fn build_config(&self) -> Result<SocketHandlerConfig, HandlerBuildError> {
        self.validate_endpoint()?;
        if let Some(size) = self.max_frame_size {
            ensure_positive!(size, "max_frame_size")?;
        }
        let mut config = SocketHandlerConfig {
            delivery: self.delivery_config()?,
            ..SocketHandlerConfig::default()
        };
        if let (Some(host), Some(port)) = (&self.host, self.port) {
            config.transport = TcpTransport {
                host: host.clone(),
                port,
                tls: self.build_tls_options(host),
            };
        }
        if let Some(size) = self.max_frame_size {
            config.max_frame_size = size;
        }
        Ok(config)
    }

    fn build_tls_options(&self, host: &str) -> Option<TlsOptions> {
        self.tls.as_ref().map(|tls_cfg| {
            let domain = self
                .tls_domain
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| host.to_owned());
            TlsOptions {
                domain,
                verify: tls_cfg.verify,
            }
        })
    }

    fn build_encoder(&self, max_frame_size: usize) -> JsonEncoder {
        let mut encoder = JsonEncoder::new().with_max_frame_size(max_frame_size);
        if let Some(host) = &self.encoder_host {
            encoder = encoder.with_host(host.clone());
        }
        for (key, value) in &self.static_fields {
            encoder = encoder.with_static_field(key.clone(), value.clone());
        }
        encoder
    }

    /// Build a TCP handler using the JSON encoder and the logging observer.
    pub fn build(&self) -> Result<LogstashHandler<JsonEncoder>, HandlerBuildError> {
        let config = self.build_config()?;
        let connector = TcpConnector::new(
            config.transport,
            config.delivery.connect_timeout,
            config.delivery.write_timeout,
        );
        let encoder = self.build_encoder(config.max_frame_size);
        let observer = Arc::new(LogObserver::new(config.delivery.warn_interval));
        Ok(LogstashHandler::with_parts(
            config.delivery,
            connector,
            encoder,
            observer,
        )?)
    }

    /// Build a handler around caller-supplied collaborators, keeping the
    /// queue, backoff and timeout settings from this builder. Endpoint, TLS
    /// and encoder settings are ignored because `connector` and `encoder`
    /// replace them.
    pub fn build_with<C, E>(
        &self,
        connector: C,
        encoder: E,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Result<LogstashHandler<E>, HandlerBuildError>
    where
        C: Connector,
        E: FrameEncoder,
    {
        let delivery = self.delivery_config()?;
        Ok(LogstashHandler::with_parts(
            delivery,
            connector,
            encoder,
            observer,
        )?)
    }
}
