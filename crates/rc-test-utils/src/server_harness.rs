//! Test server harness for E2E testing
//!
//! Provides `TestRcServer` for spawning real RC server instances in tests.

use crate::fixtures::{test_config, test_master_key};
use rc_service::config::Config;
use rc_service::repositories::InMemoryAttendanceRepository;
use rc_service::routes::{self, AppState};
use rc_service::token::TokenCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning a Roster Controller server in E2E tests.
///
/// The server runs over the in-memory repository, so tests need no
/// database and every harness is fully isolated.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<(), anyhow::Error> {
///     let server = TestRcServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .get(format!("{}/health", server.url()))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRcServer {
    addr: SocketAddr,
    repository: Arc<InMemoryAttendanceRepository>,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestRcServer {
    /// Spawn a new test server instance over a fresh in-memory store.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use the fixed test master key for its token codec
    /// - Start the HTTP server in the background
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let config = test_config();
        let repository = Arc::new(InMemoryAttendanceRepository::new());

        let state = Arc::new(AppState {
            repository: repository.clone(),
            config: config.clone(),
            codec: Arc::new(TokenCodec::new(test_master_key())),
        });

        // Initialize metrics recorder for the test server.
        // Note: This may fail if already installed in the test process.
        // In that case, we create a new recorder without installing it globally.
        let metrics_handle = match rc_service::observability::metrics::init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                // If the metrics recorder is already installed globally, create a
                // standalone recorder without installing it. This allows each test
                // to have its own metrics.
                use metrics_exporter_prometheus::PrometheusBuilder;
                let recorder = PrometheusBuilder::new().build_recorder();
                recorder.handle()
            }
        };

        // Build routes using rc-service's real route builder
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            // Use into_make_service_with_connect_info to support SocketAddr extraction
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            repository,
            config,
            _handle: handle,
        })
    }

    /// Get a handle to the in-memory repository backing the server.
    ///
    /// Useful for seeding state or asserting on storage directly.
    pub fn repository(&self) -> Arc<InMemoryAttendanceRepository> {
        self.repository.clone()
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestRcServer {
    fn drop(&mut self) {
        // Explicitly abort the HTTP server task to ensure immediate cleanup
        // when the test completes. This stops the server gracefully.
        self._handle.abort();
    }
}
