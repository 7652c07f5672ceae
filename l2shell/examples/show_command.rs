//! Run one show command on a switch and print the transcript.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example show_command -- --host 10.0.0.1 --user admin --password secret \
//!     --dialect dell_force10 --command "show vlan brief"
//! ```
//!
//! Add `--telnet` for switches without SSH.

use std::env;
use std::time::Duration;

use l2shell::{DialectRegistry, Protocol, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG=debug for the full session log
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = SessionBuilder::new(&args.host)
        .username(&args.user)
        .password(&args.password)
        .dialect(&args.dialect)
        .transaction_timeout(Duration::from_secs(args.timeout));
    if args.telnet {
        builder = builder.protocol(Protocol::Telnet);
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }

    let mut session = builder.build()?;

    println!("Executing: {}", args.command);
    println!("{}", "-".repeat(50));

    match session.send_command(&args.command).await {
        Ok(transcript) => {
            println!("{}", transcript);
            println!("{}", "-".repeat(50));
            println!("Completed in {:?}", transcript.elapsed());
        }
        Err(e) if e.command_failure().is_some() => {
            eprintln!("Switch rejected the command: {}", e);
        }
        Err(e) => return Err(e.into()),
    }

    session.close().await;
    Ok(())
}

struct Args {
    host: String,
    port: Option<u16>,
    user: String,
    password: String,
    dialect: String,
    command: String,
    telnet: bool,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: None,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            dialect: "dell_force10".to_string(),
            command: "show version".to_string(),
            telnet: false,
            timeout: 180,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => parsed.port = value.and_then(|v| v.parse().ok()),
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value.unwrap_or_default(),
                "--dialect" | "-d" => parsed.dialect = value.unwrap_or(parsed.dialect),
                "--command" | "-c" => parsed.command = value.unwrap_or(parsed.command),
                "--timeout" | "-t" => {
                    parsed.timeout = value.and_then(|v| v.parse().ok()).unwrap_or(180)
                }
                "--telnet" => {
                    parsed.telnet = true;
                    i += 1;
                    continue;
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }

    fn print_help() {
        let registry = DialectRegistry::global()
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut dialects: Vec<_> = registry.names().cloned().collect();
        dialects.sort();

        println!(
            r#"l2shell show_command example

USAGE:
    cargo run --example show_command -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target switch [default: localhost]
    -p, --port <PORT>        Port [default: 22, or 23 with --telnet]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password
    -d, --dialect <NAME>     Switch dialect [default: dell_force10]
    -c, --command <CMD>      Command to run [default: show version]
    -t, --timeout <SECS>     Transaction timeout [default: 180]
    --telnet                 Use Telnet instead of SSH
    --help                   Print this help message

DIALECTS:
    {}"#,
            dialects.join(", ")
        );
    }
}
