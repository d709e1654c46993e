use clap::{Parser, Subcommand};
use m2x_node::dispatch::Pending;
use m2x_node::message::FlowMessage;
use m2x_node::node::{M2xNode, NodeError, Output, OutputReceiver};
use m2x_node::registry::Namespace;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "m2x")]
#[command(about = "M2X flow node CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// List the operations of each namespace with their formal parameter names.
    Operations {
        /// Only this namespace (e.g. devices)
        #[arg(long, short)]
        topic: Option<String>,
    },

    /// Read newline-delimited JSON messages from stdin and dispatch each one.
    /// Outbound messages go to stdout as JSON lines; error-port reports go to stderr.
    Run {
        /// Config file path (default: M2X_CONFIG_PATH or ~/.m2x/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Dispatch a single message and print the outbound message.
    Call {
        /// Config file path (default: M2X_CONFIG_PATH or ~/.m2x/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Namespace (e.g. devices)
        #[arg(long)]
        topic: String,

        /// Operation (e.g. view)
        #[arg(long)]
        action: String,

        #[arg(long, value_name = "ID")]
        topic_id: Option<String>,

        #[arg(long, value_name = "ID")]
        sub_topic_id: Option<String>,

        /// Payload as JSON (e.g. '{"limit": 10}')
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("m2x {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Operations { topic }) => {
            if let Err(e) = run_operations(topic) {
                log::error!("operations failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_stdin(config).await {
                log::error!("run failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Call {
            config,
            topic,
            action,
            topic_id,
            sub_topic_id,
            payload,
        }) => {
            let mut msg = FlowMessage::new(topic, action);
            msg.topic_id = topic_id;
            msg.sub_topic_id = sub_topic_id;
            match run_call(config, msg, payload).await {
                Ok(true) => {}
                Ok(false) => std::process::exit(1),
                Err(e) => {
                    log::error!("call failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_operations(topic: Option<String>) -> anyhow::Result<()> {
    let namespaces = match topic {
        Some(t) => vec![t.parse::<Namespace>()?],
        None => Namespace::ALL.to_vec(),
    };
    for ns in namespaces {
        println!("{}", ns);
        for op in ns.operations() {
            println!("  {}", op.signature());
        }
    }
    Ok(())
}

fn build_node(
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<(M2xNode, OutputReceiver)> {
    let (config, path) = m2x_node::config::load_config(config_path)?;
    log::debug!("loaded config from {}", path.display());
    let (output, rx) = Output::channel();
    Ok((M2xNode::from_config(&config, output), rx))
}

fn print_message(msg: &FlowMessage) {
    println!("{}", msg.to_json());
}

fn print_error(err: &NodeError) {
    let report = match err {
        NodeError::Dispatch { error, message } => serde_json::json!({
            "error": error.to_string(),
            "message": message.to_json(),
        }),
        other => serde_json::json!({ "error": other.to_string() }),
    };
    eprintln!("{}", report);
}

/// Invocations still running. Finished ones are reaped whenever a new one is tracked.
#[derive(Default)]
struct InFlight {
    tasks: JoinSet<()>,
}

impl InFlight {
    fn track(&mut self, pending: Pending) {
        while self.tasks.try_join_next().is_some() {}
        self.tasks.spawn(pending.wait());
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    async fn drain(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

async fn run_stdin(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (node, rx) = build_node(config_path)?;
    let OutputReceiver {
        mut messages,
        mut errors,
    } = rx;
    let printer = tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            print_message(&msg);
        }
    });
    let reporter = tokio::spawn(async move {
        while let Some(err) = errors.recv().await {
            print_error(&err);
        }
    });

    let mut in_flight = InFlight::default();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match FlowMessage::from_json(line) {
            Ok(msg) => {
                if let Some(pending) = node.on_input(msg) {
                    in_flight.track(pending);
                }
            }
            Err(e) => log::warn!("skipping input line that is not a JSON object: {}", e),
        }
    }

    log::debug!("stdin closed; waiting for {} invocation(s)", in_flight.len());
    in_flight.drain().await;
    drop(node);
    let _ = printer.await;
    let _ = reporter.await;
    Ok(())
}

/// Returns false when the node reported on its error port instead of emitting.
async fn run_call(
    config_path: Option<std::path::PathBuf>,
    mut msg: FlowMessage,
    payload: Option<String>,
) -> anyhow::Result<bool> {
    use anyhow::Context;

    if let Some(p) = payload {
        let value: serde_json::Value =
            serde_json::from_str(&p).with_context(|| format!("parsing --payload {}", p))?;
        msg.payload = Some(value);
    }
    let (node, mut rx) = build_node(config_path)?;
    if let Some(pending) = node.on_input(msg) {
        pending.wait().await;
    }
    drop(node);

    let mut emitted = false;
    while let Some(out) = rx.messages.recv().await {
        print_message(&out);
        emitted = true;
    }
    while let Ok(err) = rx.errors.try_recv() {
        print_error(&err);
    }
    Ok(emitted)
}
