// src/cli/ssl.rs

//! SSL option handling for `create monitor`/`create postgres`, matching the
//! original's `SSLCommandLineOptions` enum (see `original_source` /
//! `cli_common.h`): exactly one of `--ssl-self-signed`, `--no-ssl`, or a
//! user-provided certificate pair may be given. Resolved explicitly into an
//! `SslMode` rather than left as three independent booleans, so a
//! contradictory combination is a `BadArgs` error instead of the keeper
//! discovering it later at startup.

use crate::core::errors::PgAutoCtlError;
use clap::Args;
use serde::{Deserialize, Serialize};

#[derive(Args, Debug, Default)]
pub struct SslArgs {
    #[arg(long)]
    pub ssl_self_signed: bool,

    #[arg(long)]
    pub no_ssl: bool,

    #[arg(long, requires = "ssl_key")]
    pub ssl_cert: Option<String>,

    #[arg(long, requires = "ssl_cert")]
    pub ssl_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SslMode {
    SelfSigned,
    NoSsl,
    UserProvided,
}

impl SslArgs {
    pub fn resolve(&self) -> Result<SslMode, PgAutoCtlError> {
        let user_provided = self.ssl_cert.is_some() || self.ssl_key.is_some();
        match (self.ssl_self_signed, self.no_ssl, user_provided) {
            (true, false, false) => Ok(SslMode::SelfSigned),
            (false, true, false) => Ok(SslMode::NoSsl),
            (false, false, true) => Ok(SslMode::UserProvided),
            (false, false, false) => Ok(SslMode::SelfSigned),
            _ => Err(PgAutoCtlError::BadArgs(
                "only one of --ssl-self-signed, --no-ssl, or --ssl-cert/--ssl-key may be given".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_self_signed() {
        let args = SslArgs::default();
        assert_eq!(args.resolve().unwrap(), SslMode::SelfSigned);
    }

    #[test]
    fn rejects_conflicting_flags() {
        let args = SslArgs {
            ssl_self_signed: true,
            no_ssl: true,
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn user_provided_cert_pair_is_accepted() {
        let args = SslArgs {
            ssl_cert: Some("cert.pem".to_string()),
            ssl_key: Some("key.pem".to_string()),
            ..Default::default()
        };
        assert_eq!(args.resolve().unwrap(), SslMode::UserProvided);
    }
}
