use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the chain gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:15888")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show chain connection status
    Status,
    /// Poll a transaction's lifecycle status
    Poll {
        chain: String,
        network: String,
        tx_hash: String,
    },
    /// Show the next nonce for an address
    Nonce {
        chain: String,
        network: String,
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/chain/status", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Poll {
            chain,
            network,
            tx_hash,
        } => {
            let res = client
                .post(format!("{}/chain/poll", cli.url))
                .json(&serde_json::json!({
                    "chain": chain,
                    "network": network,
                    "txHash": tx_hash,
                }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Nonce {
            chain,
            network,
            address,
        } => {
            let res = client
                .post(format!("{}/chain/nonce", cli.url))
                .json(&serde_json::json!({
                    "chain": chain,
                    "network": network,
                    "address": address,
                }))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);
    println!("{}", status);
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
