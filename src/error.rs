/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Error type for the fallible steps behind the actor boundary.
//!
//! Sends never return these to the sender. Transports and domains turn them
//! into `DeliveryFailure` messages for the caller's `fail` continuation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("address '{0}' has no host")]
    MissingHost(String),

    #[error("address '{0}' has no port")]
    MissingPort(String),

    #[error("domain base '{0}' must not carry a path")]
    BaseWithPath(String),

    #[error("scheme '{scheme}' is not handled by this transport (expected '{expected}')")]
    UnsupportedScheme { scheme: String, expected: String },

    #[error("address '{0}' is already in use")]
    AddressInUse(String),

    #[error("no listener reachable at '{0}'")]
    Unreachable(String),

    #[error("no local actor exported at '{0}'")]
    UnknownAddress(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AddressInUse("mem://alpha:9000".to_string());
        assert_eq!(err.to_string(), "address 'mem://alpha:9000' is already in use");

        let err = Error::Unreachable("mem://beta:1".to_string());
        assert_eq!(err.to_string(), "no listener reachable at 'mem://beta:1'");

        let err = Error::UnsupportedScheme {
            scheme: "udp".to_string(),
            expected: "tcp".to_string(),
        };
        assert!(err.to_string().contains("'udp'"));
        assert!(err.to_string().contains("'tcp'"));

        let err = Error::MissingPort("mem://alpha".to_string());
        assert_eq!(err.to_string(), "address 'mem://alpha' has no port");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_codec() {
        let codec_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = codec_err.into();
        assert!(err.to_string().starts_with("codec error"));
    }
}
