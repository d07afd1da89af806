//! ciphermat-client: drive one encrypted operation against an evaluator.
//!
//! Matrices are given as semicolon-separated rows of comma-separated
//! integers, e.g. "1,2;3,4". The session's keys are generated at startup,
//! provisioned on demand, and deleted again before exit.

use clap::{Parser, ValueEnum};
use eyre::{eyre, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use ciphermat::{BfvParams, Matrix, MatrixClient};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Product,
}

#[derive(Parser)]
#[command(name = "ciphermat-client")]
#[command(about = "Encrypted matrix computation client")]
#[command(version)]
struct Args {
    /// Evaluator address
    #[arg(long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Operation to perform
    #[arg(long, value_enum)]
    op: Operation,

    /// Left operand, rows separated by ';', entries by ','
    matrix_a: String,

    /// Right operand
    matrix_b: String,

    /// Use the reduced test parameter set instead of the full 4096-degree set
    #[arg(long)]
    reduced_params: bool,
}

fn parse_matrix(text: &str) -> Result<Matrix> {
    let rows = text
        .split(';')
        .map(|row| {
            row.split(',')
                .map(|cell| {
                    cell.trim()
                        .parse::<i64>()
                        .map_err(|_| eyre!("invalid matrix entry {cell:?}"))
                })
                .collect::<Result<Vec<i64>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Matrix::from_rows(rows).map_err(|e| eyre!(e.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let a = parse_matrix(&args.matrix_a)?;
    let b = parse_matrix(&args.matrix_b)?;

    let params = if args.reduced_params {
        BfvParams::test_1024()
    } else {
        BfvParams::demo_4096()
    };

    let mut client = MatrixClient::connect(&args.server, params)
        .await
        .map_err(|e| eyre!(e.to_string()))?;

    let outcome = match args.op {
        Operation::Add => client.add(&a, &b).await,
        Operation::Subtract => client.subtract(&a, &b).await,
        Operation::Multiply => client.multiply_elementwise(&a, &b).await,
        Operation::Product => client.product(&a, &b).await,
    };

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            client.shutdown().await;
            return Err(eyre!(err.to_string()));
        }
    };

    println!("Result:");
    print!("{result}");

    client.shutdown().await;
    Ok(())
}
