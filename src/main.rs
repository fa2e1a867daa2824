use airlift::cli::commands::{CliArgs, Commands};
use airlift::cli::handlers::{handle_deliver, handle_download, handle_poll, handle_run, handle_trigger};
use airlift::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("airlift v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Trigger(trigger_args) => handle_trigger(trigger_args).await,
        Commands::Poll(poll_args) => handle_poll(poll_args).await,
        Commands::Download(download_args) => handle_download(download_args).await,
        Commands::Deliver(deliver_args) => handle_deliver(deliver_args).await,
        Commands::Run(run_args) => handle_run(run_args).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = if let Some(level_str) = &args.log_level {
            parse_level(level_str)
        } else if args.verbose {
            Level::DEBUG
        } else if args.quiet {
            Level::ERROR
        } else {
            let level_str = env::var("AIRLIFT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            parse_level(&level_str)
        };

        let mut filter = EnvFilter::from_default_env();

        if env::var("RUST_LOG").is_err() {
            filter = filter
                .add_directive(format!("airlift={}", level).parse().expect("valid directive"))
                .add_directive("h2=warn".parse().expect("valid directive"))
                .add_directive("hyper=warn".parse().expect("valid directive"))
                .add_directive("reqwest=warn".parse().expect("valid directive"));
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    });
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}
