//! Session driver task.
//!
//! [`spawn()`] moves a [`ScanSession`] into its own task, which multiplexes UI
//! requests with backend events so both are processed strictly one at a
//! time. The UI keeps a cloneable [`SessionHandle`]. Dropping every handle
//! counts as navigating away from the scanner: the task ends and the
//! session's resources are released.

use crate::error::{ErrorKind, Result};
use crate::session::{ScanSession, SessionEvents};
use crate::state::Snapshot;
use binscan_backend::{BackendKind, ImageSource};
use exn::ResultExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Start(BackendKind, Reply<()>),
    Retry(Reply<()>),
    Stop(oneshot::Sender<()>),
    Torch(bool, Reply<()>),
    Zoom(f64, Reply<f64>),
    SubmitCode(String, Reply<String>),
    Skip(Reply<()>),
    SubmitImage(ImageSource, Reply<()>),
}
impl Command {
    /// Answer without touching the session.
    fn reject(self, kind: ErrorKind) {
        fn send<T>(reply: Reply<T>, kind: ErrorKind) {
            let _ = reply.send(Err(exn::Exn::from(kind)));
        }
        match self {
            Self::Start(_, reply)
            | Self::Retry(reply)
            | Self::Torch(_, reply)
            | Self::Skip(reply)
            | Self::SubmitImage(_, reply) => send(reply, kind),
            Self::Zoom(_, reply) => send(reply, kind),
            Self::SubmitCode(_, reply) => send(reply, kind),
            Self::Stop(reply) => {
                let _ = reply.send(());
            },
        }
    }
}

/// Cloneable UI-side handle to a driven session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Snapshot>,
}
impl SessionHandle {
    pub async fn start(&self, kind: BackendKind) -> Result<()> {
        self.request(|reply| Command::Start(kind, reply)).await
    }

    pub async fn retry(&self) -> Result<()> {
        self.request(Command::Retry).await
    }

    /// Stop scanning. Never fails; a closed session is already stopped.
    pub async fn stop(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Stop(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn set_torch(&self, on: bool) -> Result<()> {
        self.request(|reply| Command::Torch(on, reply)).await
    }

    /// Returns the zoom level applied after clamping.
    pub async fn set_zoom(&self, level: f64) -> Result<f64> {
        self.request(|reply| Command::Zoom(level, reply)).await
    }

    pub async fn submit_code(&self, code: impl Into<String>) -> Result<String> {
        let code = code.into();
        self.request(|reply| Command::SubmitCode(code, reply)).await
    }

    pub async fn skip(&self) -> Result<()> {
        self.request(Command::Skip).await
    }

    pub async fn submit_image(&self, source: ImageSource) -> Result<()> {
        self.request(|reply| Command::SubmitImage(source, reply)).await
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Wait for the first snapshot matching `condition`.
    pub async fn wait_for(&self, condition: impl FnMut(&Snapshot) -> bool) -> Result<Snapshot> {
        let mut snapshot = self.snapshot.clone();
        let matched = snapshot.wait_for(condition).await.or_raise(|| ErrorKind::SessionClosed)?;
        Ok(matched.clone())
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(command(tx)).await.is_err() {
            exn::bail!(ErrorKind::SessionClosed);
        }
        rx.await.or_raise(|| ErrorKind::SessionClosed)?
    }
}

/// Drive `session` in a new task.
///
/// The task resolves to the committed value once the handoff has been
/// delivered, or `None` if every handle was dropped first.
pub fn spawn(session: ScanSession, events: SessionEvents) -> (SessionHandle, JoinHandle<Option<String>>) {
    let (tx, rx) = mpsc::channel(16);
    let handle = SessionHandle { commands: tx, snapshot: session.subscribe() };
    let task = tokio::spawn(drive(session, events, rx));
    (handle, task)
}

async fn drive(mut session: ScanSession, mut events: SessionEvents, mut commands: mpsc::Receiver<Command>) -> Option<String> {
    while !session.is_committed() {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => execute(&mut session, command).await,
                None => {
                    tracing::info!(state = %session.state(), "Scanner left before commit");
                    return None;
                },
            },
            Some(event) = events.recv() => session.handle(event),
        }
    }
    loop {
        tokio::select! {
            biased;
            delivered = session.finish() => {
                return delivered.then(|| session.committed_value().map(str::to_string)).flatten();
            },
            command = commands.recv() => match command {
                Some(command) => command.reject(ErrorKind::AlreadyCommitted),
                None => {
                    tracing::info!("Scanner left during success feedback; handoff cancelled");
                    return None;
                },
            },
        }
    }
}

async fn execute(session: &mut ScanSession, command: Command) {
    match command {
        Command::Start(kind, reply) => {
            let _ = reply.send(session.start(kind));
        },
        Command::Retry(reply) => {
            let _ = reply.send(session.retry());
        },
        Command::Stop(reply) => {
            session.stop();
            let _ = reply.send(());
        },
        Command::Torch(on, reply) => {
            let _ = reply.send(session.camera().set_torch(on).await);
        },
        Command::Zoom(level, reply) => {
            let _ = reply.send(session.camera().set_zoom(level).await);
        },
        Command::SubmitCode(code, reply) => {
            let _ = reply.send(session.submit_code(&code));
        },
        Command::Skip(reply) => {
            let _ = reply.send(session.skip());
        },
        Command::SubmitImage(source, reply) => {
            let _ = reply.send(session.submit_image(source));
        },
    }
}
