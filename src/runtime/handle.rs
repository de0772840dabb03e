use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{
    op::OpKind,
    packs::PackId,
    report::ReportRow,
    session::{CommandOutcome, QuickAmounts, Session, SessionError, Totals, ValidationError},
    types::{Count, Delta, ItemKey},
};

use super::events::TallyEvent;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("session runtime is not running")]
    ChannelClosed,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command_queue_bound: usize,
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 64,
            event_capacity: 256,
        }
    }
}

pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<TallyEvent>,
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

type Reply = oneshot::Sender<Result<CommandOutcome, SessionError>>;

enum Command {
    Select { key: ItemKey, resp: Reply },
    ApplyDelta { delta: Delta, resp: Reply },
    ApplyPack { pack: PackId, resp: Reply },
    AddText { text: String, resp: Reply },
    SubtractText { text: String, resp: Reply },
    MarkEmpty { resp: Reply },
    Undo { resp: Reply },
    Reset { resp: Reply },
    QuickAmounts {
        resp: oneshot::Sender<Result<QuickAmounts, ValidationError>>,
    },
    Totals {
        resp: oneshot::Sender<Totals>,
    },
    Report {
        resp: oneshot::Sender<Vec<ReportRow>>,
    },
    Current {
        key: ItemKey,
        resp: oneshot::Sender<Count>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Moves `session` onto a dedicated blocking task that runs one command at
/// a time. Must be called from within a tokio runtime.
pub fn spawn_session(session: Session, config: RuntimeConfig) -> SessionHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<TallyEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();

    tokio::task::spawn_blocking(move || {
        let mut session = session;
        while let Some(cmd) = cmd_rx.blocking_recv() {
            if handle_command(cmd, &mut session, &events_tx_loop) {
                break;
            }
        }
        tracing::debug!("session runtime stopped");
    });

    SessionHandle { cmd_tx, events_tx }
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<TallyEvent> {
        self.events_tx.subscribe()
    }

    pub async fn select(&self, key: ItemKey) -> Result<CommandOutcome, RuntimeError> {
        self.command(|resp| Command::Select { key, resp }).await
    }

    pub async fn apply_delta(&self, delta: Delta) -> Result<CommandOutcome, RuntimeError> {
        self.command(|resp| Command::ApplyDelta { delta, resp }).await
    }

    pub async fn apply_named_pack(&self, pack: PackId) -> Result<CommandOutcome, RuntimeError> {
        self.command(|resp| Command::ApplyPack { pack, resp }).await
    }

    pub async fn add_text(&self, text: impl Into<String>) -> Result<CommandOutcome, RuntimeError> {
        let text = text.into();
        self.command(|resp| Command::AddText { text, resp }).await
    }

    pub async fn subtract_text(&self, text: impl Into<String>) -> Result<CommandOutcome, RuntimeError> {
        let text = text.into();
        self.command(|resp| Command::SubtractText { text, resp }).await
    }

    pub async fn mark_empty(&self) -> Result<CommandOutcome, RuntimeError> {
        self.command(|resp| Command::MarkEmpty { resp }).await
    }

    pub async fn undo(&self) -> Result<CommandOutcome, RuntimeError> {
        self.command(|resp| Command::Undo { resp }).await
    }

    pub async fn reset_all(&self) -> Result<CommandOutcome, RuntimeError> {
        self.command(|resp| Command::Reset { resp }).await
    }

    pub async fn quick_amounts(&self) -> Result<QuickAmounts, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::QuickAmounts { resp: tx }).await?;
        let res = rx.await.map_err(|_| RuntimeError::ChannelClosed)?;
        res.map_err(|err| RuntimeError::Session(err.into()))
    }

    pub async fn totals(&self) -> Result<Totals, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Totals { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn report_rows(&self) -> Result<Vec<ReportRow>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Report { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn current(&self, key: ItemKey) -> Result<Count, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Current { key, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    async fn command(&self, build: impl FnOnce(Reply) -> Command) -> Result<CommandOutcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        let res = rx.await.map_err(|_| RuntimeError::ChannelClosed)?;
        Ok(res?)
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

fn handle_command(cmd: Command, session: &mut Session, events_tx: &broadcast::Sender<TallyEvent>) -> bool {
    match cmd {
        Command::Select { key, resp } => {
            let res = session.select(&key);
            if res.is_ok() {
                let _ = events_tx.send(TallyEvent::Selected { key });
            }
            let _ = resp.send(res);
        }
        Command::ApplyDelta { delta, resp } => {
            let res = session.apply_delta(delta);
            publish(events_tx, &res, false);
            let _ = resp.send(res);
        }
        Command::ApplyPack { pack, resp } => {
            let res = session.apply_named_pack(pack);
            publish(events_tx, &res, false);
            let _ = resp.send(res);
        }
        Command::AddText { text, resp } => {
            let res = session.add_text(&text);
            publish(events_tx, &res, false);
            let _ = resp.send(res);
        }
        Command::SubtractText { text, resp } => {
            let res = session.subtract_text(&text);
            publish(events_tx, &res, false);
            let _ = resp.send(res);
        }
        Command::MarkEmpty { resp } => {
            let res = session.mark_empty();
            publish(events_tx, &res, false);
            let _ = resp.send(res);
        }
        Command::Undo { resp } => {
            let res = session.undo();
            publish(events_tx, &res, true);
            let _ = resp.send(res);
        }
        Command::Reset { resp } => {
            let res = session.reset_all();
            match &res {
                Ok(_) => {
                    let _ = events_tx.send(TallyEvent::Reset);
                }
                Err(err) if err.mutated() => {
                    let _ = events_tx.send(TallyEvent::NotDurable {
                        message: err.to_string(),
                    });
                }
                Err(_) => {}
            }
            let _ = resp.send(res);
        }
        Command::QuickAmounts { resp } => {
            let _ = resp.send(session.quick_amounts());
        }
        Command::Totals { resp } => {
            let _ = resp.send(session.totals());
        }
        Command::Report { resp } => {
            let _ = resp.send(session.report_rows());
        }
        Command::Current { key, resp } => {
            let _ = resp.send(session.current(&key));
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }

    false
}

fn publish(events_tx: &broadcast::Sender<TallyEvent>, res: &Result<CommandOutcome, SessionError>, undo: bool) {
    let outcome = match res {
        Ok(outcome) => outcome,
        Err(err) => {
            if err.mutated() {
                let _ = events_tx.send(TallyEvent::NotDurable {
                    message: err.to_string(),
                });
            }
            return;
        }
    };
    let Some(record) = &outcome.record else {
        return;
    };

    let key = record.key.clone();
    let event = match (undo, record.kind) {
        (true, _) => TallyEvent::Undone {
            key,
            count: outcome.count,
        },
        (false, OpKind::Delta) => TallyEvent::Counted {
            key,
            count: outcome.count,
        },
        (false, OpKind::MarkEmpty) => TallyEvent::MarkedEmpty { key },
    };
    let _ = events_tx.send(event);
}
