/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Transport addresses: `scheme://host:port[/path]`.
//!
//! The `scheme://host:port` part names a domain (its base). The optional
//! path is the opaque token a domain minted for one exported capability.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    scheme: String,
    host: String,
    port: u16,
    path: Option<String>,
}

impl Address {
    pub fn parse(address: &str) -> Result<Self> {
        let url = Url::parse(address).map_err(|source| Error::InvalidAddress {
            address: address.to_string(),
            source,
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::MissingHost(address.to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::MissingPort(address.to_string()))?;
        let path = Some(url.path().trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Address {
            scheme: url.scheme().to_string(),
            host,
            port,
            path,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// `host:port`, the key transports route on.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `scheme://host:port` without any path.
    pub fn base(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn with_path(&self, path: &str) -> Address {
        Address {
            path: Some(path.trim_matches('/').to_string()),
            ..self.clone()
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}/{}", self.base(), path),
            None => f.write_str(&self.base()),
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}
