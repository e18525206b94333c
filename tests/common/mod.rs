//! Shared test helpers: an in-process TLS upstream and a relay launcher

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{Ssl, SslAcceptor, SslMethod};
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509Name, X509NameBuilder, X509Ref, X509};
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_openssl::SslStream;

use tls_relay::config::RelayConfig;
use tls_relay::{Proxy, Result};

/// A throwaway CA and a server certificate for `localhost` / `127.0.0.1`
pub struct TestPki {
    /// CA certificate in PEM form, written to a temp file
    pub ca_file: NamedTempFile,
    /// Acceptor presenting the server certificate
    pub acceptor: Arc<SslAcceptor>,
}

fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("CN", common_name).unwrap();
    builder.build()
}

fn validity(builder: &mut openssl::x509::X509Builder, serial: u32) {
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(2).unwrap()).unwrap();
}

/// Generate a CA and a CA-signed server certificate
pub fn generate_pki() -> TestPki {
    let ca_key = ec_key();
    let ca_name = name("tls-relay test CA");

    let mut ca = X509::builder().unwrap();
    validity(&mut ca, 1);
    ca.set_subject_name(&ca_name).unwrap();
    ca.set_issuer_name(&ca_name).unwrap();
    ca.set_pubkey(&ca_key).unwrap();
    ca.append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    ca.append_extension(
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()
            .unwrap(),
    )
    .unwrap();
    ca.sign(&ca_key, MessageDigest::sha256()).unwrap();
    let ca = ca.build();

    let leaf_key = ec_key();
    let mut leaf = X509::builder().unwrap();
    validity(&mut leaf, 2);
    leaf.set_subject_name(&name("localhost")).unwrap();
    leaf.set_issuer_name(ca.subject_name()).unwrap();
    leaf.set_pubkey(&leaf_key).unwrap();
    leaf.append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();
    leaf.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .build()
            .unwrap(),
    )
    .unwrap();
    leaf.append_extension(ExtendedKeyUsage::new().server_auth().build().unwrap())
        .unwrap();
    let issuer: &X509Ref = &ca;
    let san = SubjectAlternativeName::new()
        .dns("localhost")
        .ip("127.0.0.1")
        .build(&leaf.x509v3_context(Some(issuer), None))
        .unwrap();
    leaf.append_extension(san).unwrap();
    leaf.sign(&ca_key, MessageDigest::sha256()).unwrap();
    let leaf = leaf.build();

    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&leaf_key).unwrap();
    acceptor.set_certificate(&leaf).unwrap();
    acceptor.add_extra_chain_cert(ca.clone()).unwrap();
    acceptor.check_private_key().unwrap();

    let mut ca_file = NamedTempFile::new().unwrap();
    ca_file.write_all(&ca.to_pem().unwrap()).unwrap();
    ca_file.flush().unwrap();

    TestPki {
        ca_file,
        acceptor: Arc::new(acceptor.build()),
    }
}

type Handler = Arc<
    dyn Fn(SslStream<TcpStream>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
>;

/// Start a TLS upstream test double on an ephemeral loopback port
///
/// Every accepted connection completes a TLS handshake and is then handed to
/// `handler` on its own task. Failed handshakes are dropped silently.
pub async fn spawn_tls_upstream<F, Fut>(acceptor: Arc<SslAcceptor>, handler: F) -> SocketAddr
where
    F: Fn(SslStream<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handler: Handler = Arc::new(
        move |stream: SslStream<TcpStream>| -> Pin<Box<dyn Future<Output = ()> + Send>> {
            Box::pin(handler(stream))
        },
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let acceptor = Arc::clone(&acceptor);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let ssl = Ssl::new(acceptor.context()).unwrap();
                let mut stream = SslStream::new(ssl, tcp).unwrap();
                if Pin::new(&mut stream).accept().await.is_ok() {
                    handler(stream).await;
                }
            });
        }
    });

    addr
}

/// Relay configuration pointing at a local upstream that trusts `pki`
pub fn relay_config(upstream: SocketAddr, pki: &TestPki) -> RelayConfig {
    RelayConfig {
        listen: "127.0.0.1:0".to_string(),
        upstream: upstream.to_string(),
        ca_file: Some(pki.ca_file.path().to_path_buf()),
        drain_timeout: 5,
        shutdown_timeout: 5,
        ..RelayConfig::default()
    }
}

/// A running relay
pub struct RunningRelay {
    /// Address clients connect to
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl RunningRelay {
    /// Request shutdown and wait for the listener to return
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("relay task panicked")
    }
}

/// Bind and run a relay in the background
pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let proxy = Proxy::bind(&config).await.expect("relay should bind");
    let addr = proxy.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(proxy.run_until(async {
        let _ = rx.await;
    }));

    RunningRelay {
        addr,
        shutdown: Some(tx),
        handle,
    }
}
