use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, pkcs8_private_keys};

/// Build a rustls server config from PEM certificate chain and PKCS#8 key files.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let cert_reader = &mut BufReader::new(File::open(cert_path)?);
    let key_reader = &mut BufReader::new(File::open(key_path)?);

    let cert_chain_der: Vec<CertificateDer<'static>> = certs(cert_reader).collect::<Result<Vec<_>, _>>()?;
    if cert_chain_der.is_empty() {
        return Err(format!("no certificate found in {}", cert_path.display()).into());
    }

    let mut keys = pkcs8_private_keys(key_reader).collect::<Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Err(format!("no PKCS#8 private key found in {}", key_path.display()).into());
    }

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain_der, PrivateKeyDer::Pkcs8(keys.remove(0)))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_reported() {
        let err = load_server_config(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"));
        assert!(err.is_err());
    }
}
