//! lanehost - High-performance, zero-allocation HTTP/1.1 origin server
//!
//! A performance-oriented HTTP/1.1 server with comprehensive configuration
//! for memory management, connection handling, and declarative routing.
//! Designed for microservices requiring fine-grained control over resources.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1 only**: strict CRLF framing, no chunked transfer-encoding,
//!   no HTTP/1.0 or HTTP/0.9 fallback.
//!
//! # Features
//!
//! ## 🔒 Security & Protection
//! - **Built-in DoS/DDoS protection** - enabled by default, with no performance penalty.
//! - **Fully configurable limits and timeouts** for requests, responses, and connections.
//! - **Custom connection filtering** - implement the [`ConnectionFilter`] trait to
//!   reject unwanted connections at the TCP level.
//!
//! ## 🚀 Performance & Memory
//! - **Zero-allocation parsing** - the request parser writes only into
//!   preallocated, fixed-capacity arrays.
//! - **Pre-allocated memory for each connection** - linear and transparent scaling.
//!
//! ## 🧭 Routing
//! - **Declarative route table** - [`routes::Lane`]s of [`routes::Guard`]s and
//!   [`routes::Agent`]s, flattened and verified once at [`routes::RouteTable::build`]
//!   time, before the listening socket opens.
//! - **Storing data between requests** - ability to store data between requests in a
//!   single connection using the [`ConnectionData`] trait.
//!
//! ## 🏭 Production Ready
//! - **Graceful performance degradation** - automatic 503 responses when overloaded.
//! - [**Custom error format**
//!   ](https://docs.rs/lanehost/latest/lanehost/limits/struct.ServerLimits.html#structfield.json_errors) -
//!   structured JSON (with codes/descriptions) or a plain HTTP response.
//! - **Resource protection** - automatic closure of connections exceeding set limits.
//! - **Structured logging** and **TOML configuration** via [`logging`] and [`config`].
//!
//! # Quick Start
//!
//! ## 1. Installation
//!
//! Add `lanehost` and [`tokio`](https://crates.io/crates/tokio) to your `Cargo.toml`:
//!
//! ```bash
//! cargo add lanehost tokio --features tokio/full
//! ```
//! Or manually:
//! ```toml
//! [dependencies]
//! lanehost = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## 2. Usage example
//! ```no_run
//! use lanehost::{Server, Handler, Request, Response, Handled, StatusCode};
//!
//! struct MyHandler;
//!
//! impl Handler for MyHandler {
//!     async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
//!         resp.status(StatusCode::Ok).body("Hello World!")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = Server::bind(
//!         "127.0.0.1:8080".parse().unwrap(),
//!         1024,
//!         std::time::Duration::from_secs(120),
//!     ).unwrap();
//!
//!     Server::builder()
//!         .listener(listener)
//!         .handler(MyHandler)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//!
//! For a fuller example wiring lanes, guards, and agents through a route
//! table, see
//! [`demos/site.rs`](https://github.com/AmakeSashaDev/lanehost/tree/main/demos).
//!
//! # Use Cases
//!
//! - **High-throughput microservices** - configurable for specific workloads
//! - **Resource-constrained environments** - predictable memory usage
//! - **Internal APIs** - security-conscious defaults
//! - **Performance-critical applications** - zero-allocation design
//!
//! # 🌐 Beyond the Documentation
//! For live statistics, deeper insights, and ongoing project thoughts,
//! visit the [project website](https://amakesashadev.github.io/lanehost/).
pub(crate) mod http {
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub mod config;
pub(crate) mod errors;
pub mod limits;
pub mod logging;
pub mod routes;

pub use crate::{
    errors::{ConfigError, RouteTableError},
    http::{
        query,
        request::Request,
        response::{
            write::{BodyWriter, WriteBuffer},
            Handled, Response,
        },
        types::{Method, StatusCode, Version},
    },
    routes::{Agent, AgentMethod, Guard, Lane, RouteKind, RouteTable},
    server::{
        connection::{ConnectionData, ConnectionFilter},
        server_impl::{Handler, Server, ServerBuilder},
    },
};

#[doc(hidden)]
pub fn run_test<F: FnOnce(&Request, &mut Response) -> Handled>(f: F) {
    f(
        &Request::new(&crate::limits::ReqLimits::default()),
        &mut Response::new(&crate::limits::RespLimits::default()),
    );
}

#[doc(hidden)]
#[macro_export]
macro_rules! impt_default_handler {
    ($name:ident) => {
        use lanehost::{Handled, Handler, Request, Response, StatusCode};
        struct $name;

        // `<()>` to check functionality
        impl Handler<()> for $name {
            async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
                resp.status(StatusCode::Ok).body("Hello world!")
            }
        }
    };
}
