use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures::channel::mpsc;

use crate::{api::CommentId, Scope};

/// Something the user (or the viewport) asked the session to do
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    FetchMore(Scope),
    OpenReplies(CommentId),
    Comment(String),
    Reply { to: CommentId, contents: String },
    Edit { target_id: CommentId, contents: String },
    Delete(CommentId),
}

/// Sending half of a session's command feed
#[derive(Clone, Debug)]
pub struct Commands(mpsc::UnboundedSender<Command>);

pub fn channel() -> (Commands, mpsc::UnboundedReceiver<Command>) {
    let (sender, receiver) = mpsc::unbounded();
    (Commands(sender), receiver)
}

impl Commands {
    /// Returns false if the session is not listening anymore
    pub fn send(&self, cmd: Command) -> bool {
        self.0.unbounded_send(cmd).is_ok()
    }

    /// Notifier to hand to whatever watches `scope`'s last rendered item
    pub fn notifier(&self, scope: Scope) -> VisibilityNotifier {
        VisibilityNotifier {
            scope,
            sender: self.0.clone(),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Asks for the next page of a scope whenever its last item becomes visible
#[derive(Debug)]
pub struct VisibilityNotifier {
    scope: Scope,
    sender: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
}

impl VisibilityNotifier {
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn last_item_visible(&self) {
        notify(self.scope, &self.sender, &self.connected)
    }

    /// No-argument callback for viewport observers, that goes quiet once disconnected
    pub fn callback(&self) -> impl Fn() + Send + Sync + 'static {
        let scope = self.scope;
        let sender = self.sender.clone();
        let connected = self.connected.clone();
        move || notify(scope, &sender, &connected)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

fn notify(scope: Scope, sender: &mpsc::UnboundedSender<Command>, connected: &AtomicBool) {
    if !connected.load(Ordering::Relaxed) {
        return;
    }
    tracing::debug!(?scope, "last item visible");
    if sender.unbounded_send(Command::FetchMore(scope)).is_err() {
        tracing::debug!(?scope, "visibility notification after session end");
    }
}
