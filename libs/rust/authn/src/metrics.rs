//! Authentication metrics
//!
//! Prometheus counters for JWKS fetches and authentication outcomes.

use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

const NAMESPACE: &str = "authn";

/// Authentication and key source metrics.
#[derive(Debug, Clone)]
pub struct AuthMetrics {
    /// JWKS fetches by trigger and outcome
    pub jwks_fetches: IntCounterVec,
    /// Keys held by the most recent successful fetch
    pub jwks_keys: IntGauge,
    /// Authentication attempts by outcome
    pub authentications: IntCounterVec,
}

impl AuthMetrics {
    /// Creates the metrics and registers them with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let jwks_fetches = IntCounterVec::new(
            Opts::new("jwks_fetch_total", "Total JWKS fetch attempts").namespace(NAMESPACE),
            &["trigger", "outcome"],
        )?;
        registry.register(Box::new(jwks_fetches.clone()))?;

        let jwks_keys = IntGauge::with_opts(
            Opts::new("jwks_keys", "Number of keys in the JWKS cache").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(jwks_keys.clone()))?;

        let authentications = IntCounterVec::new(
            Opts::new("authentications_total", "Total authentication attempts")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(authentications.clone()))?;

        Ok(Self {
            jwks_fetches,
            jwks_keys,
            authentications,
        })
    }

    /// Records a JWKS fetch.
    pub fn record_jwks_fetch(&self, trigger: &str, outcome: &str) {
        self.jwks_fetches
            .with_label_values(&[trigger, outcome])
            .inc();
    }

    /// Records the size of a freshly swapped key set.
    pub fn set_jwks_keys(&self, count: usize) {
        self.jwks_keys
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Records an authentication outcome.
    pub fn record_authentication(&self, outcome: &str) {
        self.authentications.with_label_values(&[outcome]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_count() {
        let registry = Registry::new();
        let metrics = AuthMetrics::new(&registry).unwrap();

        metrics.record_jwks_fetch("initial", "success");
        metrics.record_jwks_fetch("initial", "success");
        metrics.set_jwks_keys(3);
        metrics.record_authentication("bad_token");

        assert_eq!(
            metrics
                .jwks_fetches
                .with_label_values(&["initial", "success"])
                .get(),
            2
        );
        assert_eq!(metrics.jwks_keys.get(), 3);

        let names: Vec<_> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"authn_jwks_fetch_total".to_string()));
        assert!(names.contains(&"authn_authentications_total".to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        AuthMetrics::new(&registry).unwrap();
        assert!(AuthMetrics::new(&registry).is_err());
    }
}
