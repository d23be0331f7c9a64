use clap::Parser;
use dotenv::dotenv;
use drago_rs::drago::loadtest::{self, LoadTestConfig};

/// Fire concurrent POST requests at the trigger endpoint
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of requests to send
    #[arg(long, default_value_t = 100)]
    requests: usize,

    /// Maximum requests in flight
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Target URL
    #[arg(long, default_value = "http://localhost:8080/trigger")]
    url: String,

    /// JSON request body
    #[arg(long, default_value = r#"{"data":"test"}"#)]
    payload: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = LoadTestConfig::new(&args.url, args.requests, args.concurrency, args.payload)?;

    let report = loadtest::run(&config).await?;
    println!("{}", report);

    Ok(())
}
