//! Email Pipeline Service - Entry Point
//!
//! Serves the enqueue, worker trigger, webhook and unsubscribe endpoints.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    zerg_email_pipeline::run().await
}
