//! AudioBox - play or record a single audio item from the terminal
//!
//! This is the main entry point for the AudioBox command-line harness.

mod cli;

use anyhow::{bail, Context, Result};
use audiobox::{AudioBox, AudioSession, Bus, Event, ItemConfiguration, Settings};
use clap::Parser;
use cli::{Control, HELP};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments and initialize logging
    let args = cli::Args::parse();
    cli::init_logging(&args);

    let mut settings = Settings::load().context("Failed to load settings")?;
    args.apply(&mut settings);
    let configuration = args.configuration(&settings)?;

    info!("Starting AudioBox");

    let session = AudioSession::new();
    let audio_box = AudioBox::with_factory(session.clone(), settings.engine_factory());

    let item = audio_box.create(&configuration);
    if !audio_box.has_engine(&item) {
        bail!("Could not prepare audio for {:?} (run with -v for details)", configuration);
    }

    let events = Bus::new();
    let _attachment = audio_box.attach(&events);

    // Report every state change of the item
    let mut states = item.watch_state();
    let reporter = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("state: {}", state);
        }
    });

    events.send(Event::Activate(item.clone()));
    if let ItemConfiguration::Record { destination } = &configuration {
        println!("Recording into {}", destination.display());
    }
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from stdin")?
    {
        if line.trim().is_empty() {
            continue;
        }
        match Control::parse(&line) {
            Some(Control::Event(event)) => events.send(event.into_event()),
            Some(Control::Interruption(kind)) => session.post(kind.notification()),
            Some(Control::Help) => println!("{}", HELP),
            Some(Control::Quit) => break,
            None => eprintln!("Unknown command: {} (type help)", line.trim()),
        }
    }

    events.send(Event::DeactivateSession);
    drop(item);
    drop(audio_box);
    reporter.abort();

    info!("AudioBox finished");
    Ok(())
}
