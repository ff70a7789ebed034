//! Signbridge CLI
//!
//!   signbridge serve --tx <hex>                  → serve the bridge page until Ctrl-C
//!   signbridge splice --tx <hex> --witness <hex> → finalized transaction hex
//!   signbridge status <txid>                     → {"tx_id", "confirmations"}
//!   signbridge track <txid>                      → log depth changes until Ctrl-C
//!
//! Output is JSON on stdout; errors are JSON on stderr with exit code 1.

use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::info;

use signbridge::config::load_env_file;
use signbridge::logging::init_logging;
use signbridge::{
    install_signal_handlers, BridgeConfig, BridgeError, ConfirmationTracker, KoiosStatusSource, LocalBridgeServer,
    NetworkContext, StatusSource, TxId, UnsignedTxPayload, WitnessSplicer,
};

fn main() {
    // .env in the working directory; variables already set win
    let _ = load_env_file(".env");
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("signbridge {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("serve") => cmd_serve(&opts),
        Some("splice") => cmd_splice(&opts),
        Some("status") => cmd_status(&opts),
        Some("track") => cmd_track(&opts),
        Some(cmd) => Err(json!({"error": format!("Unknown command: {}", cmd)})),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(err) => {
            eprintln!("{}", render(&err, pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

fn bridge_error(e: &BridgeError) -> Value {
    json!({
        "error": e.to_string(),
        "kind": e.kind(),
        "recoverable": e.is_recoverable(),
        "remedy": e.remedy(),
    })
}

fn message(e: impl std::fmt::Display) -> Value {
    json!({"error": e.to_string()})
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    tx_id: Option<String>,
    tx: Option<String>,
    witness: Option<String>,
    network: Option<String>,
    port: Option<String>,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--tx" | "-t" => {
                    opts.tx = value;
                    i += 1;
                }
                "--witness" | "-w" => {
                    opts.witness = value;
                    i += 1;
                }
                "--network" | "-n" => {
                    opts.network = value;
                    i += 1;
                }
                "--port" | "-p" => {
                    opts.port = value;
                    i += 1;
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {}
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        opts.command = positional.next();
        opts.tx_id = positional.next();
        opts
    }

    /// Environment first, then CLI flags on top.
    fn config(&self) -> Result<BridgeConfig, Value> {
        let mut config = BridgeConfig::from_env().map_err(message)?;
        if let Some(network) = self.network.as_deref() {
            config = config.with_network(network.parse::<NetworkContext>().map_err(message)?);
        }
        if let Some(port) = self.port.as_deref() {
            let port = port.parse::<u16>().map_err(|e| message(format!("--port {port:?}: {e}")))?;
            config = config.with_port(port);
        }
        Ok(config)
    }

    fn tx_id(&self) -> Result<TxId, Value> {
        let raw = self.tx_id.as_deref().ok_or_else(|| message("Missing transaction id"))?;
        TxId::parse(raw).ok_or_else(|| message(format!("Not a transaction id: {raw}")))
    }
}

fn print_usage() {
    println!(
        r#"signbridge - browser wallet signing bridge

USAGE:
    signbridge <command> [args] [options]

COMMANDS:
    serve                   Serve the signing page for an unsigned transaction
    splice                  Attach a wallet witness set to an unsigned transaction
    status <txid>           Query confirmation depth once
    track <txid>            Poll confirmation depth until Ctrl-C

OPTIONS:
    --tx, -t <hex>          Unsigned transaction CBOR hex (serve, splice)
    --witness, -w <hex>     Witness set CBOR hex from signTx (splice)
    --network, -n <net>     mainnet|preprod (default: preprod, env: SIGNBRIDGE_NETWORK)
    --port, -p <port>       Server port (default: 44203, env: SIGNBRIDGE_PORT)
    --json                  Compact JSON output
    --pretty                Pretty-print JSON
    --version, -V           Print version

ENVIRONMENT:
    SIGNBRIDGE_HOST, SIGNBRIDGE_POLL_MS, SIGNBRIDGE_MAX_ATTEMPTS,
    SIGNBRIDGE_STATUS_SECS, SIGNBRIDGE_KOIOS_URL, SIGNBRIDGE_LOG_JSON, RUST_LOG
    A .env file in the working directory is read first.

EXAMPLES:
    signbridge serve --tx 84a400... --network preprod
    signbridge splice --tx 84a400...a0f5f6 --witness a10081...
    signbridge status 3f1c...e9 --network mainnet --json | jq .confirmations
"#
    );
}

fn runtime() -> Result<tokio::runtime::Runtime, Value> {
    tokio::runtime::Runtime::new().map_err(|e| message(format!("Failed to create runtime: {e}")))
}

fn status_source(config: &BridgeConfig) -> KoiosStatusSource {
    match config.koios_url.as_deref() {
        Some(base) => KoiosStatusSource::new().with_base(base),
        None => KoiosStatusSource::new(),
    }
}

fn cmd_serve(opts: &ParsedArgs) -> Result<Value, Value> {
    let config = opts.config()?;
    let raw = opts.tx.as_deref().ok_or_else(|| message("Missing --tx <hex>"))?;
    let payload = UnsignedTxPayload::from_hex(raw).map_err(|e| bridge_error(&BridgeError::MalformedUnsignedTx(e)))?;
    // reject a payload the page could never splice before opening it in a browser
    signbridge::decode_layout(payload.as_bytes()).map_err(|e| bridge_error(&BridgeError::MalformedUnsignedTx(e)))?;

    runtime()?.block_on(async {
        let shutdown = install_signal_handlers();
        let server = LocalBridgeServer::new(&config);
        let url = server.start(&payload, config.network).await.map_err(|e| bridge_error(&e))?;
        info!("Open {} in a browser with a CIP-30 wallet installed", url);
        info!("Hit Ctrl-C to stop the server");

        shutdown.wait().await;
        server.stop().await;
        Ok::<Value, Value>(json!({"status": "stopped", "url": url, "network": config.network}))
    })
}

fn cmd_splice(opts: &ParsedArgs) -> Result<Value, Value> {
    let tx = opts.tx.as_deref().ok_or_else(|| message("Missing --tx <hex>"))?;
    let witness = opts.witness.as_deref().ok_or_else(|| message("Missing --witness <hex>"))?;
    let finalized = WitnessSplicer::splice_hex(tx, witness).map_err(|e| bridge_error(&e))?;
    Ok(json!({"tx": finalized}))
}

fn cmd_status(opts: &ParsedArgs) -> Result<Value, Value> {
    let config = opts.config()?;
    let tx_id = opts.tx_id()?;
    let source = status_source(&config);

    runtime()?.block_on(async {
        let depth = source.status(config.network, &tx_id).await.map_err(message)?;
        Ok::<Value, Value>(json!({
            "tx_id": tx_id,
            "network": config.network,
            "confirmations": depth,
            "explorer": config.network.explorer_tx_url(tx_id.as_str()),
        }))
    })
}

fn cmd_track(opts: &ParsedArgs) -> Result<Value, Value> {
    let config = opts.config()?;
    let tx_id = opts.tx_id()?;
    let source: Arc<dyn StatusSource> = Arc::new(status_source(&config));

    runtime()?.block_on(async {
        let shutdown = install_signal_handlers();
        let tracker = ConfirmationTracker::start(source, config.network, tx_id.clone(), config.status_interval());
        let mut depth = tracker.subscribe();

        let mut stop = shutdown.subscribe();
        loop {
            tokio::select! {
                _ = stop.recv() => break,
                changed = depth.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *depth.borrow_and_update();
                    info!(tx = %tx_id, confirmations = current, "confirmation depth");
                }
            }
        }

        let confirmations = tracker.confirmations();
        let skipped = tracker.skipped_ticks();
        tracker.stop().await;
        Ok::<Value, Value>(json!({"tx_id": tx_id, "confirmations": confirmations, "skipped_ticks": skipped}))
    })
}
