//! Helpers for creating TLS connections.

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// A representation of what trust anchors to use for server certificate verification.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
#[non_exhaustive]
pub enum Trust {
    /// Only use the provided root certificates.
    Only(Vec<PathBuf>),
    /// Use system root certificates.
    #[default]
    Default,
    /// Use these root certificates in addition to system root certificates.
    Also(Vec<PathBuf>),
    /// Disables server identity verification.
    ///
    /// This is usually a bad idea, but some bouncers only have self-signed certificates.
    NoVerify,
}

/// `ServerCertVerifier` that verifies literally everything.
#[derive(Clone, Copy, Debug, Default)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _: &CertificateDer<'_>,
        _: &[CertificateDer<'_>],
        _: &ServerName<'_>,
        _: &[u8],
        _: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        // :)
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _: &[u8],
        _: &CertificateDer<'_>,
        _: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _: &[u8],
        _: &CertificateDer<'_>,
        _: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
        ]
    }
}

/// `rustls` client configuration wrapped in an [`Arc`].
pub type TlsConfig = Arc<ClientConfig>;

/// Basic options for creating a [`TlsConfig`].
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TlsConfigOptions {
    /// Options for validating the server's identity.
    pub trust: Trust,
    /// An optional path to a PEM-encoded file containing
    /// one private key and client certificate chain.
    ///
    /// Used for networks that support CertFP.
    pub cert: Option<PathBuf>,
}

fn invalid_data(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

fn load_pem(path: &Path, certs: &mut RootCertStore) -> std::io::Result<()> {
    let mut file = std::io::BufReader::new(std::fs::File::open(path)?);
    for cert in rustls_pemfile::certs(&mut file) {
        certs.add(cert?).map_err(invalid_data)?;
    }
    Ok(())
}

fn load_client_cert(
    path: &Path,
) -> std::io::Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let mut file = std::io::BufReader::new(std::fs::File::open(path)?);
    let certs = rustls_pemfile::certs(&mut file).collect::<Result<Vec<_>, _>>()?;
    let mut file = std::io::BufReader::new(std::fs::File::open(path)?);
    let key = rustls_pemfile::private_key(&mut file)?
        .ok_or_else(|| invalid_data("missing private key"))?;
    Ok((certs, key))
}

impl TlsConfigOptions {
    /// Builds a [`TlsConfig`] from `self`.
    ///
    /// This is an expensive operation. It should ideally be done only once per network,
    /// not once per reconnect.
    pub fn build(&self) -> std::io::Result<TlsConfig> {
        let cli_auth =
            if let Some(path) = &self.cert { Some(load_client_cert(path)?) } else { None };
        let builder = ClientConfig::builder();
        let config = if matches!(&self.trust, Trust::NoVerify) {
            let builder =
                builder.dangerous().with_custom_certificate_verifier(Arc::new(NoVerifier));
            if let Some((certs, key)) = cli_auth {
                builder.with_client_auth_cert(certs, key).map_err(invalid_data)?
            } else {
                builder.with_no_client_auth()
            }
        } else {
            let mut certs = RootCertStore::empty();
            if matches!(&self.trust, Trust::Default | Trust::Also(_)) {
                let natives = rustls_native_certs::load_native_certs()?;
                let (added, skipped) = certs.add_parsable_certificates(natives);
                tracing::debug!(target: "ircsession", "loaded {added} system roots, skipped {skipped}");
            }
            if let Trust::Only(paths) | Trust::Also(paths) = &self.trust {
                for path in paths {
                    load_pem(path.as_ref(), &mut certs)?;
                }
            }
            let builder = builder.with_root_certificates(certs);
            if let Some((certs, key)) = cli_auth {
                builder.with_client_auth_cert(certs, key).map_err(invalid_data)?
            } else {
                builder.with_no_client_auth()
            }
        };
        Ok(Arc::new(config))
    }
}
