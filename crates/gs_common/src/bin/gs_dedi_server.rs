use anyhow::Result;
use gs_common::dedicated_server::run_dedicated_server;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    run_dedicated_server()
}
