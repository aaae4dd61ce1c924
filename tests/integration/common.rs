use std::sync::Arc;
use std::time::Duration;

use forcelink::{ClientConfig, Record, Salesforce, StaticToken};
use wiremock::MockServer;

pub const API: &str = "/services/data/v64.0";

/// Route library logs to the test output; `RUST_LOG=forcelink=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> forcelink::client::ClientConfigBuilder {
    ClientConfig::builder()
        .without_retry()
        .with_poll_interval(Duration::from_millis(10))
}

/// A session whose token is already known, pointed at `server`.
pub fn session_for(server: &MockServer) -> Salesforce {
    session_with(server, test_config().build().unwrap())
}

pub fn session_with(server: &MockServer, config: ClientConfig) -> Salesforce {
    init_tracing();
    let token = Arc::new(StaticToken::new("token", server.uri()));
    Salesforce::with_token_source(token, config).unwrap()
}

pub fn accounts(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| Record::new().with("Name", format!("Account {i}")))
        .collect()
}
