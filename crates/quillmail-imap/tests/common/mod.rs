//! Scripted in-memory IMAP server for client tests.
//!
//! A [`MockConnector`] holds one [`Plan`] per connection attempt. A served
//! plan runs its [`Step`]s on the far end of a `tokio::io::duplex` pipe and
//! records every line the client sends.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

use quillmail_imap::connection::Endpoint;
use quillmail_imap::{AuthMechanism, Client, Config, Connector, Error, Event, EventKind, Security};

/// Capabilities advertised by default.
pub const CAPS: &str = "IMAP4rev1 AUTH=PLAIN AUTH=LOGIN MOVE";

/// One scripted server action.
#[derive(Debug, Clone)]
pub enum Step {
    /// Write a line (CRLF is appended).
    Send(String),
    /// Write bytes as they are.
    Raw(Vec<u8>),
    /// Read one line; a different line ends the connection.
    Expect(String),
    /// Read `n` raw bytes (an APPEND literal).
    Literal(usize),
    /// Keep reading without ever answering.
    Hang,
    /// Close the connection.
    Close,
}

/// Writes `line`.
pub fn send(line: impl Into<String>) -> Step {
    Step::Send(line.into())
}

/// Reads exactly `line`.
pub fn expect(line: impl Into<String>) -> Step {
    Step::Expect(line.into())
}

/// What one connection attempt does.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Refuse to connect.
    Refuse,
    /// Accept and run the steps.
    Serve(Vec<Step>),
}

#[derive(Default)]
struct Inner {
    plans: VecDeque<Plan>,
    opened: usize,
}

/// Connector backed by scripted servers.
#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<Inner>>,
    received: Arc<Mutex<Vec<String>>>,
    hangups: Arc<AtomicUsize>,
}

impl MockConnector {
    /// A connector that plays `plans` in order; later attempts are refused.
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Self {
        let connector = Self::default();
        connector.inner.lock().unwrap().plans.extend(plans);
        connector
    }

    /// Queues another plan.
    pub fn push(&self, plan: Plan) {
        self.inner.lock().unwrap().plans.push_back(plan);
    }

    /// Connection attempts so far.
    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().opened
    }

    /// Every line the servers read, in order.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Times a server saw the client close its end while reading.
    pub fn hangups(&self) -> usize {
        self.hangups.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Stream = DuplexStream;

    fn open(self, _: Endpoint) -> impl Future<Output = quillmail_imap::Result<DuplexStream>> + Send + 'static {
        let plan = {
            let mut inner = self.inner.lock().unwrap();
            inner.opened += 1;
            inner.plans.pop_front()
        };
        let received = Arc::clone(&self.received);
        let hangups = Arc::clone(&self.hangups);

        async move {
            match plan {
                Some(Plan::Serve(steps)) => {
                    let (client, server) = tokio::io::duplex(64 * 1024);
                    tokio::spawn(async move {
                        if serve(server, steps, received).await == Ended::Hangup {
                            hangups.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                    Ok(client)
                }
                Some(Plan::Refuse) | None => Err(Error::connection("connection refused")),
            }
        }
    }
}

async fn read_line<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// How a served connection ended.
#[derive(Debug, PartialEq, Eq)]
enum Ended {
    /// The client closed its end while the server was reading.
    Hangup,
    /// The script or the LOGOUT exchange finished it.
    Done,
}

async fn serve(stream: DuplexStream, steps: Vec<Step>, received: Arc<Mutex<Vec<String>>>) -> Ended {
    let (read, mut write) = tokio::io::split(stream);
    let mut reader = BufReader::new(read);

    for step in steps {
        match step {
            Step::Send(line) => {
                if write.write_all(format!("{line}\r\n").as_bytes()).await.is_err() {
                    return Ended::Done;
                }
            }
            Step::Raw(bytes) => {
                if write.write_all(&bytes).await.is_err() {
                    return Ended::Done;
                }
            }
            Step::Expect(expected) => {
                let Some(line) = read_line(&mut reader).await else {
                    return Ended::Hangup;
                };
                let matched = line == expected;
                received.lock().unwrap().push(line);
                if !matched {
                    return Ended::Done;
                }
            }
            Step::Literal(size) => {
                let mut data = vec![0; size];
                if reader.read_exact(&mut data).await.is_err() {
                    return Ended::Hangup;
                }
                received
                    .lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&data).into_owned());
            }
            Step::Hang => {
                while let Some(line) = read_line(&mut reader).await {
                    received.lock().unwrap().push(line);
                }
                return Ended::Hangup;
            }
            Step::Close => return Ended::Done,
        }
    }

    // Script done: record what follows and answer LOGOUT.
    while let Some(line) = read_line(&mut reader).await {
        let logout = line
            .split_once(' ')
            .filter(|(_, command)| command.eq_ignore_ascii_case("LOGOUT"))
            .map(|(tag, _)| tag.to_string());
        received.lock().unwrap().push(line);
        if let Some(tag) = logout {
            let reply = format!("* BYE logging out\r\n{tag} OK LOGOUT completed\r\n");
            let _ = write.write_all(reply.as_bytes()).await;
            return Ended::Done;
        }
    }
    Ended::Hangup
}

/// Greeting advertising `caps`.
pub fn greeting(caps: &str) -> Step {
    send(format!("* OK [CAPABILITY {caps}] IMAP server ready"))
}

/// LOGIN with the test credentials under `tag`, accepted with `caps`.
pub fn login(tag: &str, caps: &str) -> Vec<Step> {
    vec![
        expect(format!("{tag} LOGIN user secret")),
        send(format!("{tag} OK [CAPABILITY {caps}] Logged in")),
    ]
}

/// SELECT INBOX under `tag`, then the unseen STATUS under `status_tag`.
pub fn select_inbox(tag: &str, status_tag: &str) -> Vec<Step> {
    vec![
        expect(format!("{tag} SELECT INBOX")),
        send("* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)"),
        send("* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Flags permitted"),
        send("* 3 EXISTS"),
        send("* 0 RECENT"),
        send("* OK [UNSEEN 3] First unseen"),
        send("* OK [UIDVALIDITY 1740855787] UIDs valid"),
        send("* OK [UIDNEXT 4] Predicted next UID"),
        send(format!("{tag} OK [READ-WRITE] SELECT completed")),
        expect(format!("{status_tag} STATUS INBOX (UNSEEN)")),
        send("* STATUS INBOX (UNSEEN 1)"),
        send(format!("{status_tag} OK STATUS completed")),
    ]
}

/// Greeting followed by `rest`.
pub fn serve_with(rest: impl IntoIterator<Item = Step>) -> Plan {
    let mut steps = vec![greeting(CAPS)];
    steps.extend(rest);
    Plan::Serve(steps)
}

/// Plain-text LOGIN configuration with short reconnect delays.
pub fn config() -> Config {
    Config::builder("imap.test")
        .security(Security::None)
        .credentials("user", "secret")
        .auth_mechanism(AuthMechanism::Login)
        .reconnect_delay(Duration::from_millis(100))
        .command_timeout(Duration::from_secs(10))
        .build()
}

/// Collected events as `(kind, debug text)`.
pub type Recorded = Arc<Mutex<Vec<(EventKind, String)>>>;

/// Records every event the client emits.
pub fn record(client: &mut Client<MockConnector>) -> Recorded {
    let recorded: Recorded = Arc::default();
    for kind in [
        EventKind::Reconnecting,
        EventKind::Reconnected,
        EventKind::ReconnectFailed,
        EventKind::Error,
        EventKind::Close,
    ] {
        let sink = Arc::clone(&recorded);
        client.on(kind, move |event: &Event| {
            sink.lock().unwrap().push((event.kind(), format!("{event:?}")));
        });
    }
    recorded
}

/// Events of `kind` recorded so far.
pub fn of_kind(recorded: &Recorded, kind: EventKind) -> Vec<String> {
    recorded
        .lock()
        .unwrap()
        .iter()
        .filter(|(k, _)| *k == kind)
        .map(|(_, text)| text.clone())
        .collect()
}
