// Gateway under test: route specification, forwarding runtime and lifecycle harness

pub mod harness;
pub mod proxy;
pub mod route;

pub use harness::{GatewayHarness, GatewaySettings};
pub use proxy::{GatewayRuntime, RequestInterceptor, SeverityProbe};
pub use route::{HostAndPort, RouteSpec, RouteSpecBuilder};
