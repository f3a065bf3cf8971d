use std::sync::Arc;

use anyhow::Result;
use memchat_client::{spawn_driver, ChatMessage, ClientConfig, ConnectionSession, WsTransport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::load();
    println!("memchat -> {}", config.endpoint());
    println!("Commands: /reset, /status, /quit");

    let transport = WsTransport::new();
    let session = ConnectionSession::new(config, Arc::new(transport.clone()));
    let driver = spawn_driver(session.clone(), transport);
    let printer = tokio::spawn(print_log(session.clone()));
    let status_printer = tokio::spawn(print_status(session.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/status" => println!("Status: {}", session.status_label()),
            "/reset" => {
                // Every failure path appends a system notice to the log.
                if let Err(e) = session.reset().await {
                    tracing::debug!("Reset failed: {}", e);
                }
            }
            input => {
                if session.can_send(input) {
                    if let Err(e) = session.send(input).await {
                        tracing::debug!("Send failed: {}", e);
                    }
                } else if session.is_sending() {
                    println!("(still waiting for the previous reply)");
                }
            }
        }
    }

    printer.abort();
    status_printer.abort();
    driver.abort();
    Ok(())
}

/// Prints new log entries as they land; a wholesale replacement reprints the log.
async fn print_log(session: ConnectionSession) {
    let mut changes = session.subscribe_log();
    let mut shown: Vec<ChatMessage> = Vec::new();

    while changes.changed().await.is_ok() {
        let current = session.messages();
        let extends = current.len() >= shown.len()
            && current.iter().zip(&shown).all(|(a, b)| a.id == b.id);

        if !extends {
            println!("--- conversation synced ---");
            shown.clear();
        }
        for message in &current[shown.len()..] {
            println!("[{}] {}", message.role.as_str(), message.text);
        }
        shown = current;
    }
}

/// Prints every connection status change.
async fn print_status(session: ConnectionSession) {
    let mut status = session.subscribe_status();

    while status.changed().await.is_ok() {
        let label = status.borrow_and_update().label();
        println!("Status: {}", label);
    }
}
