//! Listener normalisation for the proxy's configuration document.
//!
//! When the DNS filter fronts the proxy, the proxy's own DNS listener and TUN
//! hijack targets move to port 1053. Only keys already present are rewritten.

use serde_yaml::Value;
use thiserror::Error;

/// Hijack targets written to `tun.dns-hijack`.
pub const DNS_HIJACK_TARGETS: [&str; 2] = ["any:1053", "tcp://any:1053"];
/// Address written to `dns.listen`.
pub const DNS_LISTEN_ADDR: &str = "0.0.0.0:1053";

/// Errors raised while rewriting the document.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The incoming document is not valid YAML.
    #[error("configuration document is not valid yaml")]
    Parse {
        /// Underlying parser error.
        source: serde_yaml::Error,
    },
    /// The rewritten document could not be serialised.
    #[error("failed to serialise rewritten configuration")]
    Serialize {
        /// Underlying serialiser error.
        source: serde_yaml::Error,
    },
}

/// Rewrite `tun.dns-hijack` and `dns.listen` when present.
///
/// # Errors
///
/// Returns [`TransformError::Parse`] for malformed input and
/// [`TransformError::Serialize`] if re-encoding fails.
pub fn rewrite_listeners(document: &str) -> Result<String, TransformError> {
    let mut root: Value =
        serde_yaml::from_str(document).map_err(|source| TransformError::Parse { source })?;

    if let Some(hijack) = root
        .get_mut("tun")
        .and_then(|tun| tun.get_mut("dns-hijack"))
    {
        *hijack = Value::Sequence(
            DNS_HIJACK_TARGETS
                .iter()
                .map(|target| Value::String((*target).to_string()))
                .collect(),
        );
    }
    if let Some(listen) = root.get_mut("dns").and_then(|dns| dns.get_mut("listen")) {
        *listen = Value::String(DNS_LISTEN_ADDR.to_string());
    }

    serde_yaml::to_string(&root).map_err(|source| TransformError::Serialize { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn rewrites_existing_listener_keys() -> TestResult<()> {
        let input = "port: 7890\ntun:\n  enable: true\n  dns-hijack:\n    - any:53\ndns:\n  enable: true\n  listen: 0.0.0.0:53\n";
        let output: Value = serde_yaml::from_str(&rewrite_listeners(input)?)?;
        assert_eq!(output["tun"]["dns-hijack"][0].as_str(), Some("any:1053"));
        assert_eq!(output["tun"]["dns-hijack"][1].as_str(), Some("tcp://any:1053"));
        assert_eq!(output["dns"]["listen"].as_str(), Some(DNS_LISTEN_ADDR));
        assert_eq!(output["port"].as_u64(), Some(7890));
        assert_eq!(output["tun"]["enable"].as_bool(), Some(true));
        Ok(())
    }

    #[test]
    fn absent_keys_are_not_created() -> TestResult<()> {
        let input = "tun:\n  enable: true\ndns:\n  enable: false\n";
        let output: Value = serde_yaml::from_str(&rewrite_listeners(input)?)?;
        assert!(output["tun"].get("dns-hijack").is_none());
        assert!(output["dns"].get("listen").is_none());
        assert!(output.get("mixed-port").is_none());
        Ok(())
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        assert!(matches!(
            rewrite_listeners("tun: [unterminated"),
            Err(TransformError::Parse { .. })
        ));
    }
}
