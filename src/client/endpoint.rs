//! Network endpoint value type.
//!
//! An [`Endpoint`] identifies a broker or name-server destination and is
//! the key of the connection pool: two endpoints compare equal exactly when
//! they address the same destination, so at most one pooled connection
//! exists per distinct value.

use std::fmt;

use crate::error::{Error, Result};

/// Transport scheme for reaching an endpoint.
///
/// The handshake itself happens inside the transport; the scheme is
/// routing metadata that selects which kind of channel the connection
/// factory builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressScheme {
    /// Plaintext channel.
    #[default]
    Plain,
    /// TLS channel.
    Tls,
}

impl fmt::Display for AddressScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressScheme::Plain => write!(f, "plain"),
            AddressScheme::Tls => write!(f, "tls"),
        }
    }
}

/// Immutable network destination: scheme, host, and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: AddressScheme,
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from its parts.
    pub fn new(scheme: AddressScheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` address with the given scheme.
    pub fn parse(scheme: AddressScheme, address: &str) -> Result<Self> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| Error::Validation(format!("address missing port: {address}")))?;
        if host.is_empty() {
            return Err(Error::Validation(format!("address missing host: {address}")));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| Error::Validation(format!("invalid port in address: {address}")))?;
        Ok(Self::new(scheme, host, port))
    }

    /// Transport scheme.
    #[inline]
    pub fn scheme(&self) -> AddressScheme {
        self.scheme
    }

    /// Host name or address.
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port number.
    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
