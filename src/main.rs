/*
 * Responsibility
 * - boot the tokio runtime
 * - call app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    jwks_guard::app::run().await
}
