//! ciphermat-server: the evaluator service.
//!
//! Serves encrypted matrix operations over HTTP. Holds no matrix data
//! between requests; the only persistent state is the per-session key
//! store.

use std::sync::Arc;

use clap::Parser;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ciphermat::{router, BfvParams, EvaluatorState, MemoryKeyStore, SchemeContext};

#[derive(Parser)]
#[command(name = "ciphermat-server")]
#[command(about = "Encrypted matrix evaluator service")]
#[command(version)]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Use the reduced test parameter set instead of the full 4096-degree set
    #[arg(long)]
    reduced_params: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let params = if args.reduced_params {
        BfvParams::test_1024()
    } else {
        BfvParams::demo_4096()
    };
    info!(
        degree = params.poly_degree,
        plain_modulus = params.plain_modulus,
        "building scheme context"
    );
    let ctx = Arc::new(SchemeContext::new(params).map_err(|e| eyre::eyre!(e.to_string()))?);

    let state = Arc::new(EvaluatorState::new(ctx, Arc::new(MemoryKeyStore::new())));
    let app = router(state);

    info!("starting evaluator on {}", args.bind);
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;

    println!();
    println!("=== ciphermat evaluator running ===");
    println!("Listening on: http://{}", args.bind);
    println!();
    println!("Endpoints:");
    println!("  POST /add          - Encrypted matrix addition");
    println!("  POST /subtract     - Encrypted matrix subtraction");
    println!("  POST /multiply     - Encrypted elementwise multiplication");
    println!("  POST /product      - Encrypted matrix product");
    println!("  POST /keys/query   - Query session key presence");
    println!("  POST /keys/upload  - Upload a session key");
    println!("  POST /keys/delete  - Delete a session key");
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}
