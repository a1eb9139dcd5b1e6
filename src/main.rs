//! rcstat - Live per-command statistics monitor for Redis.
//!
//! Usage:
//!   rcstat localhost:6379
//!
//! or with auth:
//!   rcstat my-redis-endpoint.com:15151 mypassword
//!
//! While running: `+`/`-` change the refresh interval, `1`-`4` pick the
//! sort column, `q` or escape exits.

use std::io;

use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use rcstat::app::{App, DEFAULT_INTERVAL_SECS, LoopState};
use rcstat::input::TerminalInput;
use rcstat::source::RedisSource;

/// Live per-command statistics monitor for Redis.
#[derive(Parser)]
#[command(name = "rcstat", about = "Live per-command statistics monitor for Redis", version)]
struct Args {
    /// Redis address in host:port form.
    #[arg(value_name = "ADDR")]
    addr: String,

    /// Password sent with AUTH after connecting.
    /// Falls back to $REDISCLI_AUTH when omitted.
    #[arg(value_name = "PASSWORD")]
    password: Option<String>,

    /// Initial refresh interval in seconds.
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Splits `host:port` into its parts.
fn parse_addr(s: &str) -> Result<(String, u16), String> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("invalid address '{}': expected host:port", s))?;
    if host.is_empty() {
        return Err(format!("invalid address '{}': empty host", s));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| format!("invalid address '{}': bad port '{}'", s, port))?;
    if port == 0 {
        return Err(format!("invalid address '{}': port must be nonzero", s));
    }
    Ok((host.to_string(), port))
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so they never interleave with the stdout display.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("rcstat={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let (host, port) = match parse_addr(&args.addr) {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let password = args
        .password
        .or_else(|| std::env::var("REDISCLI_AUTH").ok());

    let source = match RedisSource::connect(&host, port, password.as_deref()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    println!("Connected to Redis at {}:{}.", host, port);

    let input = match TerminalInput::new() {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error: cannot set up raw keyboard input: {}", e);
            std::process::exit(1);
        }
    };

    let mut app = App::new(source, input, LoopState::new(args.interval), io::stdout());
    let result = app.run();
    // Drop the app (and with it the raw-mode guard) before touching the
    // terminal again or exiting.
    drop(app);

    match result {
        Ok(()) => info!("rcstat exiting"),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
