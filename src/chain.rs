//! Chained query handlers.
//!
//! Each handler either answers a query or declines it. A handler that
//! declines may pass the query to the next one, which it holds only as an
//! opaque `Arc<dyn Handler>`.

use crate::resolver::{Resolution, ViewResolver};
use crate::upstream::Upstream;
use async_trait::async_trait;
use hickory_proto::op::{Query, ResponseCode};
use hickory_proto::rr::Record;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

pub struct QueryContext {
    pub src: IpAddr,
    pub query: Query,
    pub deadline: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub authoritative: bool,
    pub rcode: ResponseCode,
    pub answers: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Handled(Reply),
    NotHandled,
}

#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_handle(&self, ctx: &QueryContext) -> Outcome;
}

async fn next_or_decline(next: Option<&Arc<dyn Handler>>, ctx: &QueryContext) -> Outcome {
    match next {
        Some(h) => {
            debug!(next = h.name(), qname = %ctx.query.name(), "paso al siguiente handler");
            h.try_handle(ctx).await
        }
        None => Outcome::NotHandled,
    }
}

/// Answers from the split-horizon views; anything else goes to `next`.
pub struct ViewHandler {
    resolver: ViewResolver,
    next: Option<Arc<dyn Handler>>,
}

impl ViewHandler {
    pub fn new(resolver: ViewResolver) -> Self {
        Self {
            resolver,
            next: None,
        }
    }

    pub fn with_next(mut self, next: Arc<dyn Handler>) -> Self {
        self.next = Some(next);
        self
    }
}

#[async_trait]
impl Handler for ViewHandler {
    fn name(&self) -> &'static str {
        "views"
    }

    async fn try_handle(&self, ctx: &QueryContext) -> Outcome {
        let q = &ctx.query;
        let res = self
            .resolver
            .resolve(ctx.src, q.name(), q.query_type(), q.query_class(), ctx.deadline)
            .await;

        match res {
            Ok(Resolution::Answer(answers)) => Outcome::Handled(Reply {
                authoritative: true,
                rcode: ResponseCode::NoError,
                answers,
            }),
            Ok(Resolution::NoMatch) => next_or_decline(self.next.as_ref(), ctx).await,
            Err(e) => {
                warn!(error = %e, qname = %q.name(), src = %ctx.src, "vistas: error, paso al siguiente handler");
                next_or_decline(self.next.as_ref(), ctx).await
            }
        }
    }
}

/// Fallback handler: forwards the original question to the upstream and
/// relays the result non-authoritatively.
pub struct ForwardHandler {
    upstream: Arc<dyn Upstream>,
}

impl ForwardHandler {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl Handler for ForwardHandler {
    fn name(&self) -> &'static str {
        "forward"
    }

    async fn try_handle(&self, ctx: &QueryContext) -> Outcome {
        let q = &ctx.query;
        let servfail = Outcome::Handled(Reply {
            authoritative: false,
            rcode: ResponseCode::ServFail,
            answers: vec![],
        });

        match timeout_at(ctx.deadline, self.upstream.lookup(q.name(), q.query_type())).await {
            Ok(Ok(ans)) => Outcome::Handled(Reply {
                authoritative: false,
                rcode: ans.rcode,
                answers: ans.records,
            }),
            Ok(Err(e)) => {
                warn!(error = %e, qname = %q.name(), "forward falló");
                servfail
            }
            Err(_) => {
                debug!(qname = %q.name(), "forward: deadline vencido");
                servfail
            }
        }
    }
}
