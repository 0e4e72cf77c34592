use httpmock::MockServer;

/// Start a fresh `httpmock::MockServer` without blocking the async test runtime.
pub async fn start_mock_server_async() -> MockServer {
    MockServer::start_async().await
}
