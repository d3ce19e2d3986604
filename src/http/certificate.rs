//! Backchannel certificate validation hooks.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, error::ConfigError};

/// Peer presented during a backchannel TLS handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerCertificate {
	/// Host name the connection was opened for.
	pub host: String,
	/// DER-encoded chain, end-entity certificate first.
	pub chain: Vec<Vec<u8>>,
}
impl PeerCertificate {
	/// DER bytes of the end-entity certificate.
	pub fn end_entity(&self) -> Option<&[u8]> {
		self.chain.first().map(Vec::as_slice)
	}
}

/// Application-supplied check applied to every backchannel TLS peer.
///
/// Runs after the standard chain and host name verification succeeds; returning `false`
/// aborts the handshake.
pub trait CertificateValidator
where
	Self: Send + Sync + Debug,
{
	/// Returns true when `peer` is acceptable.
	fn validate(&self, peer: &PeerCertificate) -> bool;
}

/// Pins backchannel peers to a set of SHA-256 certificate thumbprints.
///
/// A peer is accepted when any certificate in its chain matches a pin.
#[derive(Clone, Debug, Default)]
pub struct CertificateThumbprintValidator {
	pins: BTreeSet<[u8; 32]>,
}
impl CertificateThumbprintValidator {
	/// Creates a validator from raw SHA-256 digests.
	pub fn new(pins: impl IntoIterator<Item = [u8; 32]>) -> Self {
		Self { pins: pins.into_iter().collect() }
	}

	/// Creates a validator from base64-encoded SHA-256 digests.
	pub fn from_base64<I, S>(pins: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut decoded = BTreeSet::new();

		for pin in pins {
			let pin = pin.as_ref();
			let bytes = STANDARD
				.decode(pin.trim())
				.map_err(|_| ConfigError::InvalidThumbprint { value: pin.to_owned() })?;
			let digest = <[u8; 32]>::try_from(bytes.as_slice())
				.map_err(|_| ConfigError::InvalidThumbprint { value: pin.to_owned() })?;

			decoded.insert(digest);
		}

		Ok(Self { pins: decoded })
	}

	/// Number of configured pins.
	pub fn len(&self) -> usize {
		self.pins.len()
	}

	/// Returns true when no pin is configured; such a validator rejects every peer.
	pub fn is_empty(&self) -> bool {
		self.pins.is_empty()
	}
}
impl CertificateValidator for CertificateThumbprintValidator {
	fn validate(&self, peer: &PeerCertificate) -> bool {
		peer.chain.iter().any(|der| self.pins.contains(&thumbprint(der)))
	}
}

/// SHA-256 thumbprint of a DER-encoded certificate.
pub fn thumbprint(der: &[u8]) -> [u8; 32] {
	let mut digest = [0_u8; 32];

	digest.copy_from_slice(&Sha256::digest(der));

	digest
}

#[cfg(feature = "reqwest")]
pub(crate) use tls::validating_tls_config;

#[cfg(feature = "reqwest")]
mod tls {
	// crates.io
	use rustls::{
		ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
		client::{
			WebPkiServerVerifier,
			danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
		},
		crypto::ring,
		pki_types::{CertificateDer, ServerName, UnixTime},
	};
	// self
	use super::*;

	/// Builds a rustls configuration that layers `validator` on top of webpki verification.
	pub(crate) fn validating_tls_config(
		validator: Arc<dyn CertificateValidator>,
	) -> Result<ClientConfig, ConfigError> {
		let provider = Arc::new(ring::default_provider());
		let mut roots = RootCertStore::empty();

		roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

		let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
			.build()
			.map_err(ConfigError::tls)?;
		let verifier = Arc::new(ValidatingVerifier { inner, validator });
		let mut config = ClientConfig::builder_with_provider(provider)
			.with_safe_default_protocol_versions()
			.map_err(ConfigError::tls)?
			.dangerous()
			.with_custom_certificate_verifier(verifier)
			.with_no_client_auth();

		config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

		Ok(config)
	}

	#[derive(Debug)]
	struct ValidatingVerifier {
		inner: Arc<WebPkiServerVerifier>,
		validator: Arc<dyn CertificateValidator>,
	}
	impl ServerCertVerifier for ValidatingVerifier {
		fn verify_server_cert(
			&self,
			end_entity: &CertificateDer<'_>,
			intermediates: &[CertificateDer<'_>],
			server_name: &ServerName<'_>,
			ocsp_response: &[u8],
			now: UnixTime,
		) -> Result<ServerCertVerified, TlsError> {
			let verified = self.inner.verify_server_cert(
				end_entity,
				intermediates,
				server_name,
				ocsp_response,
				now,
			)?;
			let chain = std::iter::once(end_entity)
				.chain(intermediates)
				.map(|der| der.as_ref().to_vec())
				.collect();
			let peer = PeerCertificate { host: server_name.to_str().into_owned(), chain };

			if self.validator.validate(&peer) {
				Ok(verified)
			} else {
				Err(TlsError::General(
					"Backchannel certificate validator rejected the peer.".into(),
				))
			}
		}

		fn verify_tls12_signature(
			&self,
			message: &[u8],
			cert: &CertificateDer<'_>,
			dss: &DigitallySignedStruct,
		) -> Result<HandshakeSignatureValid, TlsError> {
			self.inner.verify_tls12_signature(message, cert, dss)
		}

		fn verify_tls13_signature(
			&self,
			message: &[u8],
			cert: &CertificateDer<'_>,
			dss: &DigitallySignedStruct,
		) -> Result<HandshakeSignatureValid, TlsError> {
			self.inner.verify_tls13_signature(message, cert, dss)
		}

		fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
			self.inner.supported_verify_schemes()
		}
	}
}
