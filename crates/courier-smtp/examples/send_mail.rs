#![allow(clippy::uninlined_format_args)]
//! Example: send one message with a pipelined envelope.
//!
//! ## Running
//!
//! ```bash
//! export SMTP_HOST="localhost"
//! export SMTP_PORT="2525"
//! export SMTP_FROM="sender@example.com"
//! export SMTP_TO="recipient@example.com"
//! # Optional AUTH PLAIN
//! export SMTP_USER="sender@example.com"
//! export SMTP_PASSWORD="secret"
//! RUST_LOG=courier_smtp=debug cargo run --package courier-smtp --example send_mail
//! ```

use std::env;

use courier_smtp::{Client, ClientConfig, Command, Event};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("SMTP_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(courier_smtp::DEFAULT_PORT);
    let from = env::var("SMTP_FROM").unwrap_or_else(|_| "sender@example.com".to_string());
    let to = env::var("SMTP_TO").unwrap_or_else(|_| "recipient@example.com".to_string());

    let mut config = ClientConfig::new(host).port(port);
    if let (Ok(user), Ok(password)) = (env::var("SMTP_USER"), env::var("SMTP_PASSWORD")) {
        config = config.credentials(user, password);
    }

    let mut client = Client::new(config)?;
    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Connected => println!("connected"),
                Event::Error(err) => eprintln!("session error: {}", err),
                Event::UnsolicitedReply(reply) => println!("unsolicited: {}", reply),
                Event::Closed => println!("closed"),
            }
        }
    });

    // Envelope and DATA go out together; replies come back in order.
    let mail = client.send(Command::MailFrom { from: from.clone() });
    let rcpt = client.send(Command::RcptTo { to: to.clone() });
    let data = client.send(Command::Data);
    println!("MAIL FROM: {}", mail.await?);
    println!("RCPT TO:   {}", rcpt.await?);
    println!("DATA:      {}", data.await?);
    println!("server capabilities: {:?}", client.capabilities());

    let body = format!(
        "From: <{from}>\r\nTo: <{to}>\r\nSubject: courier-smtp example\r\n\r\nHello from courier-smtp.\r\n"
    );
    client.send_raw(body)?;
    println!("queued:    {}", client.command(".").await?);

    println!("QUIT:      {}", client.command(Command::Quit).await?);
    client.close();

    Ok(())
}
