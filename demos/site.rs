use lanehost::{
    config::Config, logging, Agent, AgentMethod, ConnectionData, Guard, Lane, RouteKind,
    RouteTable, Server, StatusCode,
};

/// Per-connection session state: whether `/admin` has already been visited
/// once this connection (just enough to exercise a [`Guard`]).
struct Session {
    admin_visits: usize,
}

impl ConnectionData for Session {
    fn new() -> Self {
        Self { admin_visits: 0 }
    }

    fn reset(&mut self) {
        self.admin_visits = 0;
    }
}

fn lanes() -> Vec<Lane<Session>> {
    vec![
        Lane::new(RouteKind::WebPage, "").agent(Agent::get("/", |_, _, resp| async move {
            resp.status(StatusCode::Ok)
                .header("content-type", "text/html")
                .body("<h1>Welcome</h1>")
        })),
        Lane::new(RouteKind::WebPage, "").agent(Agent::get("/about", |_, _, resp| async move {
            resp.status(StatusCode::Ok)
                .header("content-type", "text/html")
                .body("<p>A small origin server built from lanes of guarded agents.</p>")
        })),
        Lane::new(RouteKind::WebPage, "/admin")
            .guard(Guard::new(AgentMethod::Get, |session: &mut Session, _, resp| async move {
                if session.admin_visits > 0 {
                    Some(resp.status(StatusCode::BadRequest).body("one visit per connection"))
                } else {
                    session.admin_visits += 1;
                    None
                }
            }))
            .agent(Agent::get("", |_, _, resp| async move {
                resp.status(StatusCode::Ok).body("admin panel")
            })),
        // Reserved bindings: both always answer 503 today (body ingestion
        // and WebSocket upgrade are out of the implemented scope).
        Lane::new(RouteKind::DataApi, "/api/user").agent(Agent::post("/add")),
        Lane::new(RouteKind::WebSocket, "/ws").agent(Agent::tunnel("/live")),
    ]
}

#[tokio::main]
async fn main() {
    let config = Config::from_path("demos/site.toml").expect("failed to load demos/site.toml");
    let _guard = logging::init_logging(&config).expect("failed to initialize logging");

    let addr = std::net::SocketAddr::new(config.server.http.ip_address, config.server.http.port);
    let listener = Server::bind(
        addr,
        config.server.http.backlog,
        std::time::Duration::from_secs(config.server.http.keepalive.max(0) as u64),
    )
    .unwrap_or_else(|err| panic!("failed to bind {addr}: {err}"));

    let table = RouteTable::build(lanes()).expect("route table failed verification");

    Server::builder()
        .listener(listener)
        .handler(table)
        .connection_limits(config.connection_limits())
        .build()
        .launch()
        .await;
}
