#![allow(clippy::expect_used, clippy::doc_markdown)]
//! Example: list the attachments of the newest messages in INBOX
//!
//! Reads credentials from the environment and keeps the session alive
//! across network drops, printing reconnection events as they happen.
//!
//! ## Running
//!
//! ```bash
//! IMAP_HOST=imap.example.com IMAP_USER=me@example.com IMAP_PASSWORD=secret \
//!     RUST_LOG=quillmail_imap=debug \
//!     cargo run --package quillmail-imap --example inbox_attachments
//! ```

use std::env;

use quillmail_imap::{Client, Config, EventKind, FetchAttribute, FetchItems};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quillmail_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = env::var("IMAP_HOST")?;
    let config = Config::builder(&host)
        .credentials(env::var("IMAP_USER")?, env::var("IMAP_PASSWORD")?)
        .build();

    let mut client = Client::new(config);
    client.on(EventKind::Reconnecting, |_| println!("Connection lost, reconnecting..."));
    client.on(EventKind::Reconnected, |event| println!("Back online: {event:?}"));
    client.on(EventKind::ReconnectFailed, |event| println!("Gave up: {event:?}"));

    println!("Connecting to {host}...");
    client.connect().await?;
    client.authenticate().await?;

    let inbox = client.select("INBOX").await?;
    println!(
        "INBOX: {} messages, {} unseen",
        inbox.exists,
        inbox.unseen.unwrap_or_default()
    );
    if inbox.exists == 0 {
        client.disconnect().await;
        return Ok(());
    }

    let first = inbox.exists.saturating_sub(9).max(1);
    let items = FetchItems::Items(vec![
        FetchAttribute::Uid,
        FetchAttribute::Envelope,
        FetchAttribute::BodyStructure,
    ]);
    let messages = client.fetch(&format!("{first}:*"), &items).await?;

    for message in messages {
        let subject = message
            .envelope
            .as_ref()
            .and_then(|e| e.subject.clone())
            .unwrap_or_default();
        println!("#{} {subject}", message.seq);

        let Some(body) = message.body_structure.as_ref() else {
            continue;
        };
        for attachment in quillmail_imap::parser::find_attachments(body) {
            println!(
                "    [{}] {} ({}/{}, {} bytes)",
                attachment.section,
                attachment.filename,
                attachment.media_type,
                attachment.subtype,
                attachment.size
            );
        }
    }

    client.disconnect().await;
    Ok(())
}
