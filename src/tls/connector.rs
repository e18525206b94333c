//! TLS connector creation for the upstream leg

use log::{debug, info, warn};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use std::path::Path;

use crate::common::Result;
use crate::config::TlsVerifyMode;

/// Create the TLS connector used for every upstream handshake
///
/// In strict mode the connector trusts the system store, plus `ca_file` when
/// given, and requires a valid peer chain. Hostname checks are armed per
/// connection when the `Ssl` is configured for a server name.
///
/// # Example
///
/// ```no_run
/// # use tls_relay::tls::create_tls_connector;
/// # use tls_relay::config::TlsVerifyMode;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = create_tls_connector(TlsVerifyMode::Strict, None)?;
/// # Ok(())
/// # }
/// ```
pub fn create_tls_connector(mode: TlsVerifyMode, ca_file: Option<&Path>) -> Result<SslConnector> {
    // Loads the default verify paths and enables peer verification
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;

    match mode {
        TlsVerifyMode::Strict => {
            if let Some(ca_file) = ca_file {
                info!("Trusting additional CA certificates from {}", ca_file.display());
                builder.set_ca_file(ca_file)?;
            }
            builder.set_verify(SslVerifyMode::PEER);
            debug!("Upstream certificates will be verified");
        }
        TlsVerifyMode::Insecure => {
            warn!("Upstream certificate verification disabled");
            builder.set_verify(SslVerifyMode::NONE);
        }
    }

    Ok(builder.build())
}
