//! Route specification handed to the gateway runtime.

use std::fs;
use std::path::Path;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Placeholder capturing the remainder of the upstream path
const CATCH_ALL: &str = "{everything}";

/// Downstream host and port pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostAndPort {
    pub host: String,
    pub port: u16,
}

/// One upstream → downstream mapping
///
/// Built once per scenario run and never mutated; use [`RouteSpec::builder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteSpec {
    upstream_path_template: String,
    upstream_http_method: Vec<String>,
    downstream_host_and_ports: Vec<HostAndPort>,
    downstream_scheme: String,
    downstream_path_template: String,
}

/// Routing document persisted next to the scenario's log file
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoutingDocument<'a> {
    routes: Vec<&'a RouteSpec>,
}

impl RouteSpec {
    pub fn builder() -> RouteSpecBuilder {
        RouteSpecBuilder::default()
    }

    pub fn upstream_path_template(&self) -> &str {
        &self.upstream_path_template
    }

    pub fn upstream_methods(&self) -> &[String] {
        &self.upstream_http_method
    }

    pub fn downstream(&self) -> &HostAndPort {
        // The builder guarantees exactly one downstream.
        &self.downstream_host_and_ports[0]
    }

    pub fn downstream_scheme(&self) -> &str {
        &self.downstream_scheme
    }

    pub fn downstream_path_template(&self) -> &str {
        &self.downstream_path_template
    }

    /// Whether this route accepts `method`
    pub fn accepts_method(&self, method: &Method) -> bool {
        self.upstream_http_method
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method.as_str()))
    }

    /// Match an upstream request path, returning the downstream path on success
    pub fn resolve(&self, path: &str) -> Option<String> {
        match self.upstream_path_template.strip_suffix(CATCH_ALL) {
            Some(prefix) => {
                let rest = path.strip_prefix(prefix)?;
                let downstream = self
                    .downstream_path_template
                    .strip_suffix(CATCH_ALL)
                    .map(|p| format!("{}{}", p, rest))
                    .unwrap_or_else(|| self.downstream_path_template.clone());
                Some(downstream)
            }
            None if trim_slash(path) == trim_slash(&self.upstream_path_template) => {
                Some(self.downstream_path_template.clone())
            }
            None => None,
        }
    }

    /// Full downstream URL for a resolved downstream path and optional query
    pub fn downstream_url(&self, downstream_path: &str, query: Option<&str>) -> String {
        let target = self.downstream();
        let mut url = format!(
            "{}://{}:{}{}",
            self.downstream_scheme, target.host, target.port, downstream_path
        );
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Persist this route as a routing document, replacing any previous file
    pub fn write_document(&self, path: &Path) -> Result<()> {
        let to_sink_error = |source| BenchError::Sink {
            path: path.to_path_buf(),
            source,
        };

        let document = RoutingDocument {
            routes: vec![self],
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| BenchError::Internal(anyhow::anyhow!(e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(to_sink_error)?;
        }
        if path.exists() {
            fs::remove_file(path).map_err(to_sink_error)?;
        }
        fs::write(path, json).map_err(to_sink_error)
    }
}

fn trim_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Builder for [`RouteSpec`]
#[derive(Debug, Clone)]
pub struct RouteSpecBuilder {
    upstream_path_template: String,
    upstream_methods: Vec<String>,
    downstream_host: String,
    downstream_port: Option<u16>,
    downstream_scheme: String,
    downstream_path_template: String,
}

impl Default for RouteSpecBuilder {
    fn default() -> Self {
        Self {
            upstream_path_template: "/".to_string(),
            upstream_methods: vec!["Get".to_string()],
            downstream_host: "localhost".to_string(),
            downstream_port: None,
            downstream_scheme: "http".to_string(),
            downstream_path_template: "/".to_string(),
        }
    }
}

impl RouteSpecBuilder {
    pub fn upstream_path(mut self, template: impl Into<String>) -> Self {
        self.upstream_path_template = template.into();
        self
    }

    pub fn upstream_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upstream_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn downstream_host(mut self, host: impl Into<String>) -> Self {
        self.downstream_host = host.into();
        self
    }

    pub fn downstream_port(mut self, port: u16) -> Self {
        self.downstream_port = Some(port);
        self
    }

    pub fn downstream_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.downstream_scheme = scheme.into();
        self
    }

    pub fn downstream_path(mut self, template: impl Into<String>) -> Self {
        self.downstream_path_template = template.into();
        self
    }

    pub fn build(self) -> Result<RouteSpec> {
        let port = self
            .downstream_port
            .filter(|p| *p != 0)
            .ok_or_else(|| BenchError::Config("Route needs a downstream port".to_string()))?;

        for template in [&self.upstream_path_template, &self.downstream_path_template] {
            if !template.starts_with('/') {
                return Err(BenchError::Config(format!(
                    "Path template must start with '/': {}",
                    template
                )));
            }
        }
        if self.upstream_methods.is_empty() {
            return Err(BenchError::Config(
                "Route needs at least one upstream method".to_string(),
            ));
        }
        for method in &self.upstream_methods {
            Method::from_bytes(method.to_uppercase().as_bytes()).map_err(|_| {
                BenchError::Config(format!("Invalid upstream method: {}", method))
            })?;
        }
        if self.downstream_host.is_empty() {
            return Err(BenchError::Config("Route needs a downstream host".to_string()));
        }

        Ok(RouteSpec {
            upstream_path_template: self.upstream_path_template,
            upstream_http_method: self.upstream_methods,
            downstream_host_and_ports: vec![HostAndPort {
                host: self.downstream_host,
                port,
            }],
            downstream_scheme: self.downstream_scheme,
            downstream_path_template: self.downstream_path_template,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(upstream: &str, downstream: &str) -> RouteSpec {
        RouteSpec::builder()
            .upstream_path(upstream)
            .downstream_path(downstream)
            .downstream_host("127.0.0.1")
            .downstream_port(51879)
            .build()
            .unwrap()
    }

    #[test]
    fn test_root_route_resolves_root_only() {
        let route = route("/", "/");
        assert_eq!(route.resolve("/"), Some("/".to_string()));
        assert_eq!(route.resolve(""), Some("/".to_string()));
        assert_eq!(route.resolve("/other"), None);
    }

    #[test]
    fn test_catch_all_route() {
        let route = route("/api/{everything}", "/v1/{everything}");
        assert_eq!(route.resolve("/api/users/7"), Some("/v1/users/7".to_string()));
        assert_eq!(route.resolve("/api/"), Some("/v1/".to_string()));
        assert_eq!(route.resolve("/other/users"), None);
    }

    #[test]
    fn test_methods_case_insensitive() {
        let route = route("/", "/");
        assert!(route.accepts_method(&Method::GET));
        assert!(!route.accepts_method(&Method::POST));
    }

    #[test]
    fn test_downstream_url() {
        let route = route("/", "/");
        assert_eq!(
            route.downstream_url("/status", Some("a=1")),
            "http://127.0.0.1:51879/status?a=1"
        );
        assert_eq!(route.downstream_url("/", None), "http://127.0.0.1:51879/");
    }

    #[test]
    fn test_build_requires_port() {
        let err = RouteSpec::builder().build().unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_build_rejects_bad_templates_and_methods() {
        let err = RouteSpec::builder()
            .downstream_port(80)
            .upstream_path("no-slash")
            .build()
            .unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));

        let err = RouteSpec::builder()
            .downstream_port(80)
            .upstream_methods(["GE T"])
            .build()
            .unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_write_document_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(&path, "old").unwrap();

        route("/", "/").write_document(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let first = &json["Routes"][0];
        assert_eq!(first["UpstreamPathTemplate"], "/");
        assert_eq!(first["UpstreamHttpMethod"][0], "Get");
        assert_eq!(first["DownstreamScheme"], "http");
        assert_eq!(first["DownstreamHostAndPorts"][0]["Port"], 51879);
    }
}
