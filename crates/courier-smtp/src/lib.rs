//! # courier-smtp
//!
//! An SMTP client engine over a single persistent connection.
//!
//! ## Features
//!
//! - **Lazy sessions**: the first command opens the connection and runs the
//!   greeting, EHLO (with HELO fallback) and optional AUTH PLAIN exchange
//! - **Pipelining**: replies are matched to commands in issue order, so
//!   several commands can be in flight at once
//! - **Multi-line replies**: continuation lines are reassembled into one
//!   [`Reply`] before classification
//! - **Events**: connect, error, unsolicited reply and close notifications
//!   through [`Client::subscribe`]
//!
//! TLS is not supported; a STARTTLS advertisement is only recorded in
//! [`Capabilities`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use courier_smtp::{Client, ClientConfig, Command};
//!
//! # async fn example() -> courier_smtp::Result<()> {
//! let config = ClientConfig::new("smtp.example.com")
//!     .port(587)
//!     .local_hostname("client.example.com")
//!     .credentials("user@example.com", "password");
//! let mut client = Client::new(config)?;
//!
//! // Pipelined envelope: all three go out before any reply is read.
//! let from = client.send(Command::MailFrom { from: "user@example.com".into() });
//! let to = client.send(Command::RcptTo { to: "friend@example.com".into() });
//! let data = client.send(Command::Data);
//! from.await?;
//! to.await?;
//! data.await?;
//!
//! // The body goes out raw; the closing dot is sent as a command so its
//! // reply is correlated.
//! client.send_raw("Subject: Hi\r\n\r\nHello!\r\n")?;
//! let queued = client.command(".").await?;
//! println!("{queued}");
//!
//! client.command(Command::Quit).await?;
//! client.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Client handle, session lifecycle and transport
//! - [`parser`]: Reply reassembly
//! - [`types`]: Replies and capabilities

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod config;
pub mod connection;
mod error;
pub mod parser;
mod queue;
pub mod types;

pub use command::Command;
pub use config::{ClientConfig, Credentials, DEFAULT_LOCAL_HOSTNAME, DEFAULT_PORT};
pub use connection::{Client, Connector, Event, PendingReply, State, TcpConnector};
pub use error::{Error, Result};
pub use types::{Capabilities, Reply, ReplyCode};
