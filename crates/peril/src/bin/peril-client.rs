//! Interactive Peril client.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use peril::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "peril-client", author, version, about = "Play Peril", long_about = None)]
struct Args {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Player name (prompted for when absent)
    #[arg(short, long, env = "PERIL_USERNAME")]
    username: Option<String>,

    /// Capacity of the session actor's request queue
    #[arg(long, env = "PERIL_SESSION_CHANNEL_SIZE", default_value_t = 64)]
    session_channel_size: usize,
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
            tracing::error!(error = %e, "client failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), PerilError> {
    let config = args
        .broker
        .apply(PerilConfig::default())
        .with_session_channel_size(args.session_channel_size);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let username = match args.username {
        Some(username) => username,
        None => {
            prompt("Please enter your username: ")?;
            lines.next_line().await?.unwrap_or_default().trim().to_string()
        }
    };

    let broker = AmqpBroker::connect(&config.amqp_url).await?;
    let (client, mut notices) = Client::start(&broker, &username, &config).await?;
    println!("Welcome to Peril, {username}!");
    println!("{CLIENT_HELP}");

    loop {
        prompt("> ")?;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ClientCommand>() {
                    Ok(ClientCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = execute(&client, command).await {
                            println!("{e}");
                        }
                    }
                    Err(e) => {
                        println!("{e}");
                        println!("{CLIENT_HELP}");
                    }
                }
            }
            Some(notice) = notices.recv() => println!("\n{notice}"),
        }
    }

    client.shutdown();
    broker.close().await?;
    println!("Goodbye!");
    Ok(())
}

async fn execute(client: &Client<AmqpBroker>, command: ClientCommand) -> Result<(), PerilError> {
    match command {
        ClientCommand::Spawn { location, rank } => {
            let unit = client.spawn(&location, rank).await?;
            println!("Spawned {} in {} with id {}", unit.rank, unit.location, unit.id);
        }
        ClientCommand::Move { location, unit_ids } => {
            let mv = client.move_units(&location, unit_ids).await?;
            println!("Moved {} unit(s) to {}", mv.units.len(), mv.to_location);
        }
        ClientCommand::Status => print!("{}", client.status().await?),
        ClientCommand::Spam(count) => {
            client.spam(count).await?;
            println!("Published {count} malicious logs");
        }
        ClientCommand::Help => println!("{CLIENT_HELP}"),
        ClientCommand::Quit => {}
    }
    Ok(())
}

fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}
