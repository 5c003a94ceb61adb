//! Download URL construction.
//!
//! The base URL is settled once at startup: either the configured public
//! URL (a tunnel or reverse proxy), or this machine's LAN address plus the
//! listening port so that a phone on the same network can reach it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use depot::ArtifactId;
use dropconf::{BindConfig, UrlStyle};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum BaseUrlError {
    #[error("invalid base URL '{input}': {source}")]
    Parse {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base URL '{0}' must use http or https")]
    UnsupportedScheme(String),

    #[error("base URL '{0}' must not carry a query or fragment")]
    HasQuery(String),

    #[error("base URL '{0}' has no host")]
    MissingHost(String),
}

/// Scheme, host, port and optional path prefix shared by every download URL.
///
/// Stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn parse(input: &str) -> Result<Self, BaseUrlError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|source| BaseUrlError::Parse {
            input: trimmed.to_string(),
            source,
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(BaseUrlError::UnsupportedScheme(trimmed.to_string()));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(BaseUrlError::MissingHost(trimmed.to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(BaseUrlError::HasQuery(trimmed.to_string()));
        }

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    /// `http://{ip}:{port}`, bracketing IPv6 addresses.
    pub fn from_addr(ip: IpAddr, port: u16) -> Self {
        Self(format!("http://{}", SocketAddr::new(ip, port)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn download_url(&self, id: &ArtifactId, style: UrlStyle) -> String {
        build_download_url(self, id, style)
    }

    /// Where the QR image for `id` is served.
    pub fn qr_url(&self, id: &ArtifactId) -> String {
        format!("{}/qr/{}", self.0, id)
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The shareable URL for an artifact. Pure: same inputs, same output.
pub fn build_download_url(base: &BaseUrl, id: &ArtifactId, style: UrlStyle) -> String {
    match style {
        UrlStyle::Path => format!("{}/download/{}", base.0, id),
        UrlStyle::Query => format!("{}/?file_id={}&download=true", base.0, id),
    }
}

/// Settle the base URL from bind settings.
pub fn resolve_base_url(bind: &BindConfig) -> Result<BaseUrl, BaseUrlError> {
    if let Some(public) = bind.public_url() {
        return BaseUrl::parse(public);
    }

    // A specific bind address is what clients must use anyway.
    let ip = match bind.host.trim().parse::<IpAddr>() {
        Ok(ip) if !ip.is_unspecified() => ip,
        _ => local_ip(),
    };
    Ok(BaseUrl::from_addr(ip, bind.port))
}

/// The address this host uses for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only asks the kernel which
/// interface would route to the target. Falls back to loopback offline.
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) => {
            debug!(%ip, "Detected local address");
            ip
        }
        Err(e) => {
            warn!(error = %e, "Could not detect local address, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
