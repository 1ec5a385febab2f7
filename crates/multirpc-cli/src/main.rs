//! # multirpc CLI Entry Point
//!
//! Makes JSON-RPC calls from the command line, either to one server or to
//! several servers at once.
//!
//! ## Usage
//!
//! ```bash
//! # Call one server (outputs raw JSON)
//! multirpc call http://127.0.0.1:8080/RPC2 sample.add -a '[5, 7]'
//!
//! # Call three servers at once and print the aggregated report
//! multirpc multicall -t http://127.0.0.1:8080/RPC2 -t http://127.0.0.1:8081/RPC2 \
//!     -t http://127.0.0.1:8082/RPC2 sample.add -a '[5, 7]'
//!
//! # Repeat the fan-out 100 times
//! multirpc multicall -t http://127.0.0.1:8080/RPC2 sample.add -a '[5, 7]' --repeat 100
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `info` level), so
//! stdout only ever carries JSON.

use anyhow::Result;
use argh::FromArgs;
use multirpc_client::{AggregationPolicy, ClientConfig, MultirpcClient};
use multirpc_common::Target;
use serde_json::{json, Value};


/// Parses the `--args` string into JSON-RPC params.
fn parse_params(raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("Invalid JSON in args: {}", e))?;
    if !(value.is_array() || value.is_object()) {
        anyhow::bail!("Invalid args: params must be a JSON array or object, got {}", value);
    }
    Ok(value)
}

#[derive(FromArgs)]
/// multirpc - send one JSON-RPC call to many servers at once
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Call(CallArgs),
    Multicall(MulticallArgs),
}

/// Arguments for a single call.
///
/// Prints the result as raw JSON on stdout. A fault or transport failure is
/// reported on stderr with a non-zero exit code.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call an RPC method on one server
struct CallArgs {
    /// server URL, including the http:// prefix
    #[argh(positional)]
    server_address: String,

    /// name of the RPC method to call
    #[argh(positional)]
    method: String,

    /// JSON array or object with the method's params (default `[]`)
    #[argh(option, short = 'a', long = "args", default = "\"[]\".into()")]
    args: String,

    /// per-call timeout in milliseconds
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,
}

/// Arguments for a fan-out call.
///
/// Sends the call to every `--target` concurrently and prints one JSON
/// report per round once all targets have answered:
///
/// ```json
/// {"round":1,"method":"sample.add","report":{"status":"all_succeeded","detail":{"results":[12,12]}}}
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "multicall")]
/// call an RPC method on several servers at once
struct MulticallArgs {
    /// server URL to call; repeat for every server
    #[argh(option, short = 't', long = "target")]
    targets: Vec<String>,

    /// name of the RPC method to call
    #[argh(positional)]
    method: String,

    /// JSON array or object with the method's params (default `[]`)
    #[argh(option, short = 'a', long = "args", default = "\"[]\".into()")]
    args: String,

    /// number of fan-out rounds to run, one after another (default 1)
    #[argh(option, short = 'n', long = "repeat", default = "1")]
    repeat: u32,

    /// which outcomes to report: `all` (default) or `triggering`
    #[argh(option, long = "policy")]
    policy: Option<String>,

    /// per-call timeout in milliseconds
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Logs go to stderr so stdout stays clean JSON for piping to jq
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Call(args) => run_call(args).await,
        Commands::Multicall(args) => run_multicall(args).await,
    }
}

fn build_config(timeout_ms: Option<u64>, policy: Option<&str>) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?.with_app("multirpc-cli", env!("CARGO_PKG_VERSION"));
    if let Some(timeout_ms) = timeout_ms {
        config = config.with_request_timeout_ms(timeout_ms);
    }
    if let Some(policy) = policy {
        config = config.with_aggregation(policy.parse::<AggregationPolicy>()?);
    }
    config.validate()?;
    Ok(config)
}

/// Executes the `call` subcommand.
async fn run_call(args: CallArgs) -> Result<()> {
    let target = Target::parse(args.server_address.as_str())?;
    let params = parse_params(&args.args)?;

    let client = MultirpcClient::new(build_config(args.timeout_ms, None)?)?;
    let result = client.call(&target, &args.method, params).await?;

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

/// Executes the `multicall` subcommand.
///
/// Rounds run one after another; each round waits for every target before
/// the next starts. Returns an error after the last round if any round had
/// a failing target.
async fn run_multicall(args: MulticallArgs) -> Result<()> {
    if args.targets.is_empty() {
        anyhow::bail!("multicall needs at least one --target");
    }
    if args.repeat == 0 {
        anyhow::bail!("--repeat must be at least 1");
    }
    let targets = Target::parse_all(args.targets.iter().map(String::as_str))?;
    let params = parse_params(&args.args)?;

    let config = build_config(args.timeout_ms, args.policy.as_deref())?;
    let client = MultirpcClient::new(config)?;

    let mut failed_rounds = 0;
    for round in 1..=args.repeat {
        let report = client
            .multicall_sync(targets.clone(), &args.method, params.clone())
            .await?;
        if !report.is_success() {
            failed_rounds += 1;
        }
        let line = json!({
            "round": round,
            "method": args.method,
            "report": report,
        });
        println!("{}", serde_json::to_string(&line)?);
    }

    client.shutdown().await;

    if failed_rounds > 0 {
        anyhow::bail!(
            "{} of {} rounds had at least one failing target",
            failed_rounds,
            args.repeat
        );
    }
    Ok(())
}
