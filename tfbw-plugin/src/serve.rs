//! The plugin process: listener, handshake line and gRPC services.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tfbw_core::Provider;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, mpsc};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tonic_health::ServingStatus;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::handshake::{self, CLIENT_CERT_KEY, PROTOCOL_VERSIONS_KEY};
use crate::proto::ProviderServer;
use crate::proto::plugin::{Empty, GrpcController, GrpcControllerServer};
use crate::service::PluginProvider;
use crate::tls::AutoMtls;

/// Health service name go-plugin clients check.
const HEALTH_SERVICE: &str = "plugin";

/// Serve `provider` to the Terraform process that launched us.
///
/// Prints the handshake line to stdout and returns once Terraform calls
/// `GRPCController.Shutdown`.
pub async fn serve(provider: Arc<dyn Provider>) -> Result<()> {
    let protocol =
        handshake::negotiate_protocol(std::env::var(PROTOCOL_VERSIONS_KEY).ok().as_deref())?;
    let mtls = match std::env::var(CLIENT_CERT_KEY) {
        Ok(pem) if !pem.trim().is_empty() => Some(AutoMtls::from_client_pem(&pem)?),
        _ => None,
    };

    let server = PluginServer::bind(protocol, mtls).await?;
    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", server.handshake_line())?;
        stdout.flush()?;
    }

    // go-plugin servers outlive Ctrl-C; Terraform stops them through the controller.
    tokio::spawn(async {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("ignoring interrupt");
        }
    });

    server.run(provider).await
}

pub struct PluginServer {
    listener: TcpListener,
    addr: SocketAddr,
    protocol: u32,
    mtls: Option<AutoMtls>,
    shutdown: Arc<Notify>,
}

impl PluginServer {
    /// Listen on an ephemeral loopback port.
    pub async fn bind(protocol: u32, mtls: Option<AutoMtls>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            protocol,
            mtls,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn handshake_line(&self) -> String {
        handshake::handshake_line(
            self.protocol,
            self.addr,
            self.mtls.as_ref().map(AutoMtls::server_cert_der),
        )
    }

    /// Notified by `GRPCController.Shutdown`; notifying it stops [`Self::run`].
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub async fn run(self, provider: Arc<dyn Provider>) -> Result<()> {
        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_service_status(HEALTH_SERVICE, ServingStatus::Serving)
            .await;

        let router = Server::builder()
            .add_service(health_service)
            .add_service(GrpcControllerServer::new(Controller {
                shutdown: Arc::clone(&self.shutdown),
            }))
            .add_service(ProviderServer::new(PluginProvider::new(provider)));

        let shutdown = Arc::clone(&self.shutdown);
        let signal = async move { shutdown.notified().await };

        info!(
            addr = %self.addr,
            protocol = self.protocol,
            tls = self.mtls.is_some(),
            "plugin server listening"
        );
        match self.mtls {
            Some(mtls) => {
                router
                    .serve_with_incoming_shutdown(tls_incoming(self.listener, mtls.acceptor()), signal)
                    .await?
            }
            None => {
                router
                    .serve_with_incoming_shutdown(TcpListenerStream::new(self.listener), signal)
                    .await?
            }
        }
        info!("plugin server stopped");
        Ok(())
    }
}

/// Accept TCP connections and complete the TLS handshake off the accept loop.
fn tls_incoming(
    listener: TcpListener,
    acceptor: TlsAcceptor,
) -> ReceiverStream<std::io::Result<TlsStream<TcpStream>>> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        while !tx.is_closed() {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let acceptor = acceptor.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => {
                                let _ = tx.send(Ok(tls_stream)).await;
                            }
                            Err(err) => warn!(error = %err, %addr, "TLS handshake failed"),
                        }
                    });
                }
                Err(err) => {
                    error!("plugin accept error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });
    ReceiverStream::new(rx)
}

struct Controller {
    shutdown: Arc<Notify>,
}

#[tonic::async_trait]
impl GrpcController for Controller {
    async fn shutdown(&self, _request: Request<Empty>) -> std::result::Result<Response<Empty>, Status> {
        info!("shutdown requested");
        self.shutdown.notify_one();
        Ok(Response::new(Empty {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfbw_provider::BitwardenProvider;
    use tfbw_provider::testing::MemoryConnector;
    use tonic::transport::Channel;
    use tonic_health::pb::HealthCheckRequest;
    use tonic_health::pb::health_check_response::ServingStatus as WireStatus;
    use tonic_health::pb::health_client::HealthClient;

    fn provider() -> Arc<dyn Provider> {
        Arc::new(BitwardenProvider::new("test", MemoryConnector::default()))
    }

    #[tokio::test]
    async fn controller_shutdown_notifies() {
        let shutdown = Arc::new(Notify::new());
        let controller = Controller {
            shutdown: Arc::clone(&shutdown),
        };
        controller.shutdown(Request::new(Empty {})).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn plaintext_handshake_line_names_listener() {
        let server = PluginServer::bind(6, None).await.unwrap();
        let line = server.handshake_line();
        assert_eq!(line, format!("1|6|tcp|{}|grpc|", server.local_addr()));
        assert!(server.local_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn serves_health_until_shutdown() {
        let server = PluginServer::bind(6, None).await.unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let running = tokio::spawn(server.run(provider()));

        let channel = Channel::from_shared(format!("http://{addr}"))
            .unwrap()
            .connect()
            .await
            .unwrap();
        let status = HealthClient::new(channel)
            .check(HealthCheckRequest {
                service: HEALTH_SERVICE.to_string(),
            })
            .await
            .unwrap()
            .into_inner()
            .status;
        assert_eq!(status, WireStatus::Serving as i32);

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
