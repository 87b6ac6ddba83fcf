//! Session controller and the streaming render loop.
//!
//! One session per submission: fragments arrive on a channel, each one
//! triggers exactly one reconciliation pass over the accumulated answer (no
//! batching, no reordering), and every visible change goes out as a
//! [`UiEvent`] snapshot.
//!
//! Resubmission builds a fresh session with fresh channels. Nothing cancels
//! a superseded generation stream or card fetch; their late results land on
//! dropped channels or detached registry entries and are discarded. This is
//! the source's behavior, kept on purpose.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::card::{run_card_fetch, CardOutcome, CardUpdate};
use crate::markup::{escape_html, parse_markup};
use crate::reconcile::Document;
use crate::store::StoredThread;

pub const LOADING_MESSAGE: &str = "Generating your Pok\u{e9}mon team based on your mood...";
pub const EMPTY_PROMPT_MESSAGE: &str =
    "Please tell us how you're feeling so we can generate a team for you!";
pub const FAILURE_MESSAGE: &str =
    "Something went wrong while generating your team. Please try again.";
pub const MISSING_THREAD_MESSAGE: &str = "That shared thread could not be found.";

/// Wrap a user-facing message for the answer region.
pub fn notice_html(message: &str) -> String {
    format!("<div class=\"notice\"><p>{}</p></div>", escape_html(message))
}

/// One item of the upstream fragment sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Fragment(String),
    Done,
    Failed(String),
}

/// Render-loop output, forwarded to the browser as SSE.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Restored thread metadata (question for the input field).
    Thread { question: String },
    /// Latest rendering of the whole answer region.
    Snapshot { html: String },
    /// Stream finished; the share affordance may be enabled.
    Complete { question: String, answer: String },
    /// Fixed user-facing failure message.
    Error { message: String },
}

/// Current conversation turn. Mutable only while its stream is active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionController {
    pub query: String,
    pub answer: String,
    pub complete: bool,
}

impl SessionController {
    pub fn new() -> Self {
        SessionController::default()
    }

    /// Clear all turn state.
    pub fn reset(&mut self) {
        self.query.clear();
        self.answer.clear();
        self.complete = false;
    }

    /// Reset for a new submission.
    pub fn begin(&mut self, query: &str) {
        self.reset();
        self.query = query.to_string();
    }
}

/// Drives one generation (or replay) to completion.
pub struct RenderSession {
    controller: SessionController,
    document: Document,
    client: reqwest::Client,
    pokeapi_base: String,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    card_tx: mpsc::UnboundedSender<CardUpdate>,
    card_rx: mpsc::UnboundedReceiver<CardUpdate>,
    pending_fetches: usize,
    enable_share: bool,
}

impl RenderSession {
    pub fn new(
        query: &str,
        client: reqwest::Client,
        pokeapi_base: String,
        ui_tx: mpsc::UnboundedSender<UiEvent>,
        enable_share: bool,
    ) -> Self {
        let (card_tx, card_rx) = mpsc::unbounded_channel();
        let mut controller = SessionController::new();
        controller.begin(query);
        RenderSession {
            controller,
            document: Document::new(),
            client,
            pokeapi_base,
            ui_tx,
            card_tx,
            card_rx,
            pending_fetches: 0,
            enable_share,
        }
    }

    /// Consume the fragment sequence, merging card fetch results into the
    /// same loop. Returns the finished turn.
    pub async fn run(mut self, mut fragments: mpsc::UnboundedReceiver<StreamEvent>) -> SessionController {
        let mut stream_open = true;
        loop {
            tokio::select! {
                event = fragments.recv(), if stream_open => match event {
                    Some(StreamEvent::Fragment(text)) => self.push_fragment(&text),
                    Some(StreamEvent::Done) => {
                        stream_open = false;
                        self.finish_stream();
                    }
                    Some(StreamEvent::Failed(detail)) => {
                        stream_open = false;
                        self.fail_stream(&detail);
                    }
                    None => {
                        // Upstream dropped without completing: the share
                        // affordance stays disabled, rendered content stays.
                        stream_open = false;
                        debug!("fragment stream interrupted before completion");
                        if self.controller.answer.is_empty() {
                            self.send(UiEvent::Error {
                                message: FAILURE_MESSAGE.to_string(),
                            });
                        }
                    }
                },
                update = self.card_rx.recv() => {
                    if let Some(update) = update {
                        self.apply_card_update(update);
                    }
                }
            }
            if !stream_open && self.pending_fetches == 0 {
                break;
            }
        }
        self.controller
    }

    fn push_fragment(&mut self, text: &str) {
        self.controller.answer.push_str(text);
        self.render_pass();
    }

    fn render_pass(&mut self) {
        let nodes = parse_markup(&self.controller.answer);
        let requests = self.document.apply_markup(&nodes);
        for request in requests {
            self.pending_fetches += 1;
            tokio::spawn(run_card_fetch(
                self.client.clone(),
                self.pokeapi_base.clone(),
                request,
                self.card_tx.clone(),
            ));
        }
        self.send(UiEvent::Snapshot {
            html: self.document.to_html(),
        });
    }

    fn finish_stream(&mut self) {
        if self.controller.answer.is_empty() {
            warn!("generation stream completed without fragments");
            self.send(UiEvent::Error {
                message: FAILURE_MESSAGE.to_string(),
            });
            return;
        }
        self.controller.complete = true;
        if self.enable_share {
            self.send(UiEvent::Complete {
                question: self.controller.query.clone(),
                answer: self.controller.answer.clone(),
            });
        }
    }

    fn fail_stream(&mut self, detail: &str) {
        warn!(error = %detail, "generation stream failed");
        if self.controller.answer.is_empty() {
            self.send(UiEvent::Error {
                message: FAILURE_MESSAGE.to_string(),
            });
        }
    }

    fn apply_card_update(&mut self, update: CardUpdate) {
        if matches!(
            update.outcome,
            CardOutcome::NotFound | CardOutcome::Loaded { .. }
        ) {
            self.pending_fetches = self.pending_fetches.saturating_sub(1);
        }
        if self.document.apply_card_update(update) {
            self.send(UiEvent::Snapshot {
                html: self.document.to_html(),
            });
        }
    }

    fn send(&self, event: UiEvent) {
        // A gone client must not abort the loop; remaining fragments and
        // card results are still applied.
        let _ = self.ui_tx.send(event);
    }
}

/// Re-render a stored thread through the render loop, without re-invoking
/// the generation call. The share affordance is not offered again.
pub async fn replay_thread(
    thread: StoredThread,
    client: reqwest::Client,
    pokeapi_base: String,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
) -> SessionController {
    let _ = ui_tx.send(UiEvent::Thread {
        question: thread.question.clone(),
    });
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(StreamEvent::Fragment(thread.answer));
    let _ = tx.send(StreamEvent::Done);
    drop(tx);
    RenderSession::new(&thread.question, client, pokeapi_base, ui_tx, false)
        .run(rx)
        .await
}
