//! Declarative route table: lanes of guards and agents, flattened and
//! verified once at [`RouteTable::build`] time, before the listening socket
//! opens. The table is immutable afterward and safe for concurrent reads
//! (held behind an `Arc` by the server).
//!
//! Handler polymorphism is modeled the way the teacher models pluggable
//! connection behavior: a tagged method kind selecting among type-erased,
//! boxed-future callables, rather than subtype polymorphism or a sealed
//! trait hierarchy per handler shape.

use crate::{
    errors::RouteTableError,
    http::types::{Method as WireMethod, StatusCode},
    server::connection::ConnectionData,
    Handled, Handler, Request, Response,
};
use std::{future::Future, pin::Pin, sync::Arc};

/// Method kind an [`Agent`] or [`Guard`] is declared against.
///
/// Distinct from [`Method`](crate::Method): `Tunnel` never appears on the
/// wire (WebSocket upgrade is out of the implemented scope), it exists only
/// to express lane legality at the declarative level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMethod {
    Get,
    Post,
    Tunnel,
}

impl AgentMethod {
    #[inline]
    fn matches_wire(self, wire: WireMethod) -> bool {
        matches!(
            (self, wire),
            (AgentMethod::Get, WireMethod::Get) | (AgentMethod::Post, WireMethod::Post)
        )
    }
}

/// The kind of traffic a [`Lane`] serves; governs which [`AgentMethod`]s are
/// legal inside it (checked in [`RouteTable::build`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    DataApi,
    WebPage,
    WebSocket,
}

type GuardFuture<'a> = Pin<Box<dyn Future<Output = Option<Handled>> + Send + 'a>>;
type AgentFuture<'a> = Pin<Box<dyn Future<Output = Handled> + Send + 'a>>;

#[allow(clippy::type_complexity)]
type GuardCall<S> = Arc<dyn for<'a> Fn(&'a mut S, &'a Request, &'a mut Response) -> GuardFuture<'a> + Send + Sync>;
#[allow(clippy::type_complexity)]
type AgentCall<S> = Arc<dyn for<'a> Fn(&'a mut S, &'a Request, &'a mut Response) -> AgentFuture<'a> + Send + Sync>;

/// A pre-handler filtered by method; may short-circuit the matched
/// [`Agent`] by returning `Some` before the agent's own handler runs.
pub struct Guard<S = ()> {
    method: AgentMethod,
    call: GuardCall<S>,
}

impl<S> Clone for Guard<S> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            call: Arc::clone(&self.call),
        }
    }
}

impl<S: 'static> Guard<S> {
    /// Builds a guard that runs for agents declared with `method`, and may
    /// preempt the agent by returning `Some(Handled)`.
    pub fn new<F, Fut>(method: AgentMethod, f: F) -> Self
    where
        F: Fn(&mut S, &Request, &mut Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Handled>> + Send + 'static,
    {
        Self {
            method,
            call: Arc::new(move |data, req, resp| Box::pin(f(data, req, resp))),
        }
    }
}

/// A handler binding inside a [`Lane`]: method + URL suffix + function.
///
/// Only `Get` agents carry a real callable — `Post` and `Tunnel` agents are
/// reserved bindings dispatched per the fixed rules in [`RouteTable`]
/// (POST body ingestion and WebSocket upgrade are both out of scope; see
/// `dispatch paths` in the design notes).
pub struct Agent<S = ()> {
    method: AgentMethod,
    suffix: &'static str,
    call: Option<AgentCall<S>>,
}

impl<S: 'static> Agent<S> {
    /// A `GET` agent invoking `f` when matched.
    pub fn get<F, Fut>(suffix: &'static str, f: F) -> Self
    where
        F: Fn(&mut S, &Request, &mut Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Handled> + Send + 'static,
    {
        Self {
            method: AgentMethod::Get,
            suffix,
            call: Some(Arc::new(move |data, req, resp| Box::pin(f(data, req, resp)))),
        }
    }

    /// A reserved `POST` agent binding. Always dispatches 503 (see §4.5
    /// item 5 in the design notes: body ingestion is unimplemented).
    pub fn post(suffix: &'static str) -> Self {
        Self {
            method: AgentMethod::Post,
            suffix,
            call: None,
        }
    }

    /// A reserved `TUNNEL` (WebSocket) agent binding. Always dispatches 503.
    pub fn tunnel(suffix: &'static str) -> Self {
        Self {
            method: AgentMethod::Tunnel,
            suffix,
            call: None,
        }
    }
}

/// A declarative grouping of routes sharing a scope prefix, kind, guards,
/// and body limits. Flattened and verified by [`RouteTable::build`].
pub struct Lane<S = ()> {
    kind: RouteKind,
    scope: &'static str,
    body_limit_kib: Option<usize>,
    body_capacity_kib: Option<usize>,
    guards: Vec<Guard<S>>,
    agents: Vec<Agent<S>>,
}

impl<S> Lane<S> {
    #[inline]
    pub fn new(kind: RouteKind, scope: &'static str) -> Self {
        Self {
            kind,
            scope,
            body_limit_kib: None,
            body_capacity_kib: None,
            guards: Vec::new(),
            agents: Vec::new(),
        }
    }

    #[inline]
    pub fn body_limit(mut self, kib: usize) -> Self {
        self.body_limit_kib = Some(kib);
        self
    }

    #[inline]
    pub fn body_capacity(mut self, kib: usize) -> Self {
        self.body_capacity_kib = Some(kib);
        self
    }

    #[inline]
    pub fn guard(mut self, guard: Guard<S>) -> Self {
        self.guards.push(guard);
        self
    }

    #[inline]
    pub fn agent(mut self, agent: Agent<S>) -> Self {
        self.agents.push(agent);
        self
    }
}

struct RouteRecord<S> {
    kind: RouteKind,
    url: String,
    method: AgentMethod,
    guards: Vec<Guard<S>>,
    call: Option<AgentCall<S>>,
}

/// Immutable, flattened route table built from a set of [`Lane`]s.
///
/// Implements [`Handler`] directly, so it can be passed straight to
/// [`ServerBuilder::handler`](crate::ServerBuilder::handler).
pub struct RouteTable<S = ()> {
    records: Vec<RouteRecord<S>>,
}

impl<S: 'static> RouteTable<S> {
    /// Flattens `lanes` into a route table, verifying the four legality
    /// rules before returning. Every rule violation is fatal (returns
    /// `Err`, the caller is expected to log and exit per the `Fatal`
    /// error bucket).
    pub fn build(lanes: Vec<Lane<S>>) -> Result<Self, RouteTableError> {
        let mut records: Vec<RouteRecord<S>> = Vec::new();

        for lane in lanes {
            for agent in &lane.agents {
                let url = format!("{}{}", lane.scope, agent.suffix);

                match (lane.kind, agent.method) {
                    (RouteKind::DataApi, AgentMethod::Tunnel) => {
                        return Err(RouteTableError::TunnelInDataApi(url));
                    }
                    (RouteKind::WebPage, method) if method != AgentMethod::Get => {
                        return Err(RouteTableError::NonGetInWebPage(url));
                    }
                    (RouteKind::WebSocket, method) if method != AgentMethod::Tunnel => {
                        return Err(RouteTableError::NonTunnelInWebSocket(url));
                    }
                    _ => {}
                }

                if records.iter().any(|r| r.url == url) {
                    return Err(RouteTableError::DuplicateUrl(url));
                }

                let guards = lane
                    .guards
                    .iter()
                    .filter(|g| g.method == agent.method)
                    .cloned()
                    .collect();

                records.push(RouteRecord {
                    kind: lane.kind,
                    url,
                    method: agent.method,
                    guards,
                    call: agent.call.clone(),
                });
            }
        }

        Ok(Self { records })
    }

    #[inline]
    fn find(&self, url: &[u8]) -> Option<&RouteRecord<S>> {
        self.records.iter().find(|r| r.url.as_bytes() == url)
    }
}

impl<S: ConnectionData + Send> Handler<S> for RouteTable<S> {
    /// Dispatches per the fixed rules: no match → 404; a WebSocket-lane
    /// match → 503 regardless of method (the lane itself is unsupported);
    /// a method mismatch on any other lane → 405; a matched `POST` agent →
    /// 503 (body ingestion is reserved, unimplemented); a matched `GET`
    /// agent → run its guards, then its handler.
    async fn handle(&self, connection_data: &mut S, request: &Request, response: &mut Response) -> Handled {
        let Some(record) = self.find(request.path()) else {
            return response.status(StatusCode::NotFound).body("");
        };

        if record.kind == RouteKind::WebSocket {
            return response.status(StatusCode::ServiceUnavailable).body("");
        }

        if !record.method.matches_wire(request.method()) {
            return response.status(StatusCode::MethodNotAllowed).body("");
        }

        let Some(call) = &record.call else {
            return response.status(StatusCode::ServiceUnavailable).body("");
        };

        for guard in &record.guards {
            if let Some(handled) = (guard.call)(connection_data, request, response).await {
                return handled;
            }
        }

        call(connection_data, request, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ReqLimits;

    fn req() -> Request {
        Request::new(&ReqLimits::default())
    }

    fn lanes_ok() -> Vec<Lane<()>> {
        vec![
            Lane::new(RouteKind::WebPage, "/home").agent(Agent::get("", |_, _, resp| async move {
                resp.status(StatusCode::Ok).body("hi")
            })),
            Lane::new(RouteKind::DataApi, "/api/user").agent(Agent::post("/add")),
        ]
    }

    #[test]
    fn build_flattens_scope_and_suffix() {
        let table = RouteTable::build(lanes_ok()).unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].url, "/home");
        assert_eq!(table.records[1].url, "/api/user/add");
    }

    #[test]
    fn duplicate_url_rejected() {
        let lanes = vec![
            Lane::new(RouteKind::WebPage, "/x").agent(Agent::get("", |_, _, resp| async move {
                resp.status(StatusCode::Ok).body("")
            })),
            Lane::new(RouteKind::WebPage, "/x").agent(Agent::get("", |_, _, resp| async move {
                resp.status(StatusCode::Ok).body("")
            })),
        ];
        assert!(matches!(
            RouteTable::build(lanes),
            Err(RouteTableError::DuplicateUrl(_))
        ));
    }

    #[test]
    fn tunnel_in_data_api_rejected() {
        let lanes: Vec<Lane<()>> = vec![Lane::new(RouteKind::DataApi, "/ws").agent(Agent::tunnel(""))];
        assert!(matches!(
            RouteTable::build(lanes),
            Err(RouteTableError::TunnelInDataApi(_))
        ));
    }

    #[test]
    fn non_get_in_web_page_rejected() {
        let lanes: Vec<Lane<()>> = vec![Lane::new(RouteKind::WebPage, "/page").agent(Agent::post(""))];
        assert!(matches!(
            RouteTable::build(lanes),
            Err(RouteTableError::NonGetInWebPage(_))
        ));
    }

    #[test]
    fn non_tunnel_in_web_socket_rejected() {
        let lanes: Vec<Lane<()>> =
            vec![Lane::new(RouteKind::WebSocket, "/ws").agent(Agent::get("", |_, _, resp| async move {
                resp.status(StatusCode::Ok).body("")
            }))];
        assert!(matches!(
            RouteTable::build(lanes),
            Err(RouteTableError::NonTunnelInWebSocket(_))
        ));
    }

    #[tokio::test]
    async fn no_match_is_404() {
        let table = RouteTable::build(lanes_ok()).unwrap();
        let request = req();
        let mut response = Response::new(&crate::limits::RespLimits::default());
        table.handle(&mut (), &request, &mut response).await;
        assert!(response.buffer().starts_with(b"HTTP/1.1 404"));
    }
}
