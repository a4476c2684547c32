//! Greeting client: subscribes to /topic/greetings and sends a name.
//!
//! Run against a STOMP-over-WebSocket broker:
//!   cargo run --example greetings -- ws://localhost:7777/hello Jack
//!
//! Set STOMPWS_LOG=debug for frame-level logging.

use std::sync::mpsc;
use std::time::Duration;

use stompws::session::{connect, ConnectionEvent};
use tracing_subscriber::filter::LevelFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = match std::env::var("STOMPWS_LOG").as_deref() {
        Ok("trace") => LevelFilter::TRACE,
        Ok("debug") => LevelFilter::DEBUG,
        Ok("warn") => LevelFilter::WARN,
        _ => LevelFilter::INFO,
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "ws://localhost:7777/hello".to_string());
    let name = args.next().unwrap_or_else(|| "Jack".to_string());

    let session = connect(&url)?;
    eprintln!("Connected to {url} (STOMP {:?})", session.server_version());

    session.set_connection_listener(|event| match event {
        ConnectionEvent::Disconnected { by_server: true } => eprintln!("Server closed the session"),
        ConnectionEvent::ProtocolError { message, .. } => {
            eprintln!("Server error: {}", message.as_deref().unwrap_or("unknown"))
        }
        _ => {}
    });

    let (tx, rx) = mpsc::channel();
    session.subscribe("/topic/greetings", move |frame| {
        let _ = tx.send(frame.body().unwrap_or_default().to_string());
    })?;

    session.send("/app/hello", name)?;

    match rx.recv_timeout(Duration::from_secs(5)) {
        Ok(message) => println!("Server message: {message}"),
        Err(_) => eprintln!("No greeting within 5s"),
    }

    session.disconnect()?;
    Ok(())
}
