use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{Item, certs, read_one};

use crate::config::TlsSettings;

/// Loads a certificate chain from a PEM file.
///
/// # Errors
///
/// Returns an `io::Error` if the file cannot be opened, the PEM content is
/// invalid, or it holds no certificate.
pub fn load_certs(path: &str) -> io::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| io::Error::new(e.kind(), format!("opening cert {path}: {e}")))?;
    certs_from_reader(&mut BufReader::new(file), path)
}

/// Loads the first private key (PKCS1, PKCS8 or SEC1) from a PEM file.
///
/// # Errors
///
/// Returns an `io::Error` if the file cannot be opened, is malformed, or
/// does not contain a private key.
pub fn load_private_key(path: &str) -> io::Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| io::Error::new(e.kind(), format!("opening key {path}: {e}")))?;
    key_from_reader(&mut BufReader::new(file), path)
}

fn certs_from_reader(
    reader: &mut dyn BufRead,
    origin: &str,
) -> io::Result<Vec<CertificateDer<'static>>> {
    let chain: Vec<CertificateDer<'static>> = certs(reader)
        .collect::<Result<_, _>>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid certs: {e}")))?;

    if chain.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{origin} did not contain any certificates"),
        ));
    }
    Ok(chain)
}

fn key_from_reader(reader: &mut dyn BufRead, origin: &str) -> io::Result<PrivateKeyDer<'static>> {
    // Skip certificates and other items until a key shows up.
    loop {
        match read_one(reader) {
            Ok(Some(Item::Pkcs1Key(key))) => return Ok(key.into()),
            Ok(Some(Item::Pkcs8Key(key))) => return Ok(key.into()),
            Ok(Some(Item::Sec1Key(key))) => return Ok(key.into()),
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("key parse error: {e}"),
                ));
            }
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("no private key found in {origin}"),
    ))
}

/// ServerConfig for the relay: no client auth, single cert chain.
///
/// Built once at startup and shared by every accepted connection.
pub fn build_server_config(settings: &TlsSettings) -> io::Result<Arc<ServerConfig>> {
    let chain = load_certs(&settings.cert_path)?;
    let key = load_private_key(&settings.key_path)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("TLS config error: {e}"))
        })?;

    Ok(Arc::new(config))
}
