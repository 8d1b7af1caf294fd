//! HTTP middleware (CORS, 404 handler)

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::core::config::is_all_interfaces;

/// Origins the dashboard may be served from
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Create allowed origins from host and port configuration
    ///
    /// The port after the server's own is allowed too, for a dashboard dev
    /// server running next to it.
    pub fn new(host: &str, port: u16) -> Self {
        let dev_port = port.saturating_add(1);
        let base_hosts: Vec<&str> =
            if is_all_interfaces(host) || host == "127.0.0.1" || host == "localhost" {
                vec!["localhost", "127.0.0.1"]
            } else {
                vec![host]
            };

        let mut origins = Vec::new();
        for h in &base_hosts {
            origins.push(format!("http://{}:{}", h, port));
            origins.push(format!("http://{}:{}", h, dev_port));
            origins.push(format!("http://{}", h));
        }

        Self { origins }
    }

    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create CORS layer for the read-only dashboard API
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
        ])
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!(method = %req.method(), uri = %req.uri(), "[404]");
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_interfaces_allow_loopback_origins() {
        let allowed = AllowedOrigins::new("0.0.0.0", 18630);
        assert!(allowed.origins.contains(&"http://localhost:18630".to_string()));
        assert!(allowed.origins.contains(&"http://127.0.0.1:18631".to_string()));
    }

    #[test]
    fn test_specific_host_used_directly() {
        let allowed = AllowedOrigins::new("192.168.1.5", 8080);
        assert_eq!(
            allowed.origins,
            vec![
                "http://192.168.1.5:8080",
                "http://192.168.1.5:8081",
                "http://192.168.1.5",
            ]
        );
        assert_eq!(allowed.as_header_values().len(), 3);
    }
}
