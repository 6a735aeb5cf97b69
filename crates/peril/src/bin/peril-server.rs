//! Peril server: pause/resume control and the game-log writer.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use peril::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "peril-server", author, version, about = "Run the Peril server", long_about = None)]
struct Args {
    #[command(flatten)]
    broker: BrokerArgs,

    #[command(flatten)]
    game_log: GameLogArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(&args.broker.log_level) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), PerilError> {
    let config = args.game_log.apply(args.broker.apply(PerilConfig::default()));

    let broker = AmqpBroker::connect(&config.amqp_url).await?;
    let server = Server::start(&broker, &config).await?;
    println!("Starting Peril server...");
    println!("{SERVER_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt("> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ServerCommand>() {
            Ok(ServerCommand::Pause) => {
                println!("Sending pause message");
                server.set_paused(true).await?;
            }
            Ok(ServerCommand::Resume) => {
                println!("Sending resume message");
                server.set_paused(false).await?;
            }
            Ok(ServerCommand::Help) => println!("{SERVER_HELP}"),
            Ok(ServerCommand::Quit) => break,
            Err(e) => {
                println!("{e}");
                println!("{SERVER_HELP}");
            }
        }
    }

    server.shutdown();
    broker.close().await?;
    println!("Shutting down Peril server");
    Ok(())
}

fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}
