//! The perception side's HTTP client against a real pilot server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use skyloop_pilot::{PilotError, PilotServer, VisionModel};
use skyloop_runtime::{DecisionService, VisionClient};
use tokio::net::TcpListener;

struct FixedAnswer(&'static str);

#[async_trait]
impl VisionModel for FixedAnswer {
    async fn ask(&self, _prompt: &str, _image_b64: &str) -> Result<String, PilotError> {
        Ok(self.0.to_string())
    }
}

async fn pilot_url(answer: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(PilotServer::new(Arc::new(FixedAnswer(answer))).serve(listener));
    format!("http://{addr}/pilot")
}

#[tokio::test]
async fn grass_verdict_reaches_client_as_land() {
    let client = VisionClient::new(pilot_url("A").await, Some(Duration::from_secs(5))).unwrap();
    assert_eq!(client.decide("aGk=".into()).await.unwrap(), "LAND");
}

#[tokio::test]
async fn cliff_verdict_reaches_client_as_move_next() {
    let client = VisionClient::new(pilot_url("B").await, Some(Duration::from_secs(5))).unwrap();
    assert_eq!(client.decide("aGk=".into()).await.unwrap(), "MOVE_NEXT");
}
