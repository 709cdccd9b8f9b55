use crate::chain::{Handler, Outcome, QueryContext, Reply};

use hickory_proto::op::{Header, ResponseCode};
use hickory_proto::rr::Record;

use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use hickory_server::ServerFuture;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, error};

/// Hickory request handler in front of the handler chain.
#[derive(Clone)]
pub struct DnsHandler {
    chain: Arc<dyn Handler>,
    request_timeout: Duration,
}

impl DnsHandler {
    pub fn new(chain: Arc<dyn Handler>, request_timeout: Duration) -> Self {
        Self {
            chain,
            request_timeout,
        }
    }

    /// Binds UDP and TCP and serves until `shutdown` resolves.
    pub async fn serve<F>(self, udp: SocketAddr, tcp: SocketAddr, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let udp_socket = UdpSocket::bind(udp).await?;
        let tcp_listener = TcpListener::bind(tcp).await?;
        self.serve_sockets(udp_socket, tcp_listener, shutdown).await
    }

    /// Serves on already bound sockets until `shutdown` resolves, then drains
    /// in-flight requests.
    pub async fn serve_sockets<F>(
        self,
        udp_socket: UdpSocket,
        tcp_listener: TcpListener,
        shutdown: F,
    ) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut server = ServerFuture::new(self);
        server.register_socket(udp_socket);
        server.register_listener(tcp_listener, Duration::from_secs(10));

        let finished = tokio::select! {
            r = server.block_until_done() => Some(r),
            _ = shutdown => None,
        };
        match finished {
            Some(r) => r?,
            None => server.shutdown_gracefully().await?,
        }
        Ok(())
    }

    fn failure_info(req: &Request, rcode: ResponseCode) -> ResponseInfo {
        let mut h = Header::response_from_request(req.header());
        h.set_response_code(rcode);
        ResponseInfo::from(h)
    }

    async fn send_reply<R: ResponseHandler>(
        req: &Request,
        response: &mut R,
        reply: &Reply,
    ) -> ResponseInfo {
        let mut header = Header::response_from_request(req.header());
        header.set_authoritative(reply.authoritative);
        header.set_recursion_available(!reply.authoritative);
        header.set_response_code(reply.rcode);

        let none: Vec<Record> = Vec::new();
        let msg = MessageResponseBuilder::from_message_request(req).build(
            header,
            reply.answers.iter(),
            none.iter(),
            none.iter(),
            none.iter(),
        );

        match response.send_response(msg).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, src = %req.src(), "no pude escribir la respuesta");
                Self::failure_info(req, ResponseCode::ServFail)
            }
        }
    }

    async fn send_error<R: ResponseHandler>(
        req: &Request,
        response: &mut R,
        rcode: ResponseCode,
    ) -> ResponseInfo {
        let msg = MessageResponseBuilder::from_message_request(req).error_msg(req.header(), rcode);
        match response.send_response(msg).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, src = %req.src(), "no pude escribir la respuesta");
                Self::failure_info(req, rcode)
            }
        }
    }
}

#[async_trait::async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        req: &Request,
        mut response: R,
    ) -> ResponseInfo {
        let query = match req.queries().first() {
            Some(q) => q.original().clone(),
            None => return Self::send_error(req, &mut response, ResponseCode::FormErr).await,
        };

        let ctx = QueryContext {
            src: req.src().ip(),
            query,
            deadline: tokio::time::Instant::now() + self.request_timeout,
        };

        match self.chain.try_handle(&ctx).await {
            Outcome::Handled(reply) => Self::send_reply(req, &mut response, &reply).await,
            Outcome::NotHandled => {
                // ningún handler de la cadena la tomó
                debug!(qname = %ctx.query.name(), src = %ctx.src, "sin handler siguiente");
                Self::send_error(req, &mut response, ResponseCode::ServFail).await
            }
        }
    }
}
