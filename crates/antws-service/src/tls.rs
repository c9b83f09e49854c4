//! Self-signed TLS for `--ssl`.
//!
//! A fresh certificate is generated at every start, covering `localhost`,
//! the loopback addresses and the LAN address the service advertises.
//! Browsers will warn about it; that is expected for a local bridge.

use axum_server::tls_rustls::RustlsConfig;
use tracing::info;

/// TLS setup errors.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// Certificate generation failed.
    #[error("failed to generate certificate: {0}")]
    Generate(#[from] rcgen::Error),

    /// The generated PEM could not be loaded.
    #[error("failed to load certificate: {0}")]
    Load(#[from] std::io::Error),
}

/// PEM-encoded certificate and private key.
#[derive(Debug, Clone)]
pub struct SelfSigned {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Generate a self-signed certificate for `hosts` (DNS names or IPs).
pub fn self_signed(hosts: &[String]) -> Result<SelfSigned, TlsError> {
    let mut names = vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "::1".to_string(),
    ];
    for host in hosts {
        if !names.contains(host) {
            names.push(host.clone());
        }
    }

    let certified = rcgen::generate_simple_self_signed(names)?;
    Ok(SelfSigned {
        cert_pem: certified.cert.pem(),
        key_pem: certified.key_pair.serialize_pem(),
    })
}

/// Build the rustls configuration for the listener.
pub async fn rustls_config(hosts: &[String]) -> Result<RustlsConfig, TlsError> {
    let SelfSigned { cert_pem, key_pem } = self_signed(hosts)?;
    info!("Generated self-signed certificate for {}", hosts.join(", "));
    let config = RustlsConfig::from_pem(cert_pem.into_bytes(), key_pem.into_bytes()).await?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_signed_pem() {
        let pem = self_signed(&["192.168.1.20".to_string()]).unwrap();
        assert!(pem.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(pem.key_pem.contains("PRIVATE KEY-----"));
    }

    #[test]
    fn test_each_start_gets_a_new_key() {
        let a = self_signed(&[]).unwrap();
        let b = self_signed(&[]).unwrap();
        assert_ne!(a.key_pem, b.key_pem);
    }

    #[tokio::test]
    async fn test_rustls_config_loads() {
        assert!(rustls_config(&["antws.local".to_string()]).await.is_ok());
    }
}
