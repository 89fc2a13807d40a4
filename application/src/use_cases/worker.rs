//! Per-session workers.
//!
//! Each active session owns one worker task fed by an unbounded queue.
//! The worker handles that session's requests strictly one at a time, so
//! a request always sees the history its predecessors left behind, while
//! different sessions proceed in parallel.

use crate::ports::transcript::TranscriptEvent;
use crate::use_cases::chat::ChatStreamHandler;
use crate::use_cases::image::ImageHandler;
use crate::use_cases::shared::{RelayContext, RelayError};
use relay_domain::util::preview;
use relay_domain::{Capability, InboundRequest, Role, SessionKey};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub(crate) struct SessionWorker {
    pub(crate) tx: mpsc::UnboundedSender<InboundRequest>,
    pub(crate) join: JoinHandle<()>,
}

impl SessionWorker {
    /// Start a worker for `key`. When `previous` is given (a worker for the
    /// same session that is winding down) the new one waits for it first.
    pub(crate) fn spawn(
        key: SessionKey,
        ctx: Arc<RelayContext>,
        shutdown: CancellationToken,
        previous: Option<JoinHandle<()>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(run(key, rx, ctx, shutdown, previous));
        Self { tx, join }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

async fn run(
    key: SessionKey,
    mut rx: mpsc::UnboundedReceiver<InboundRequest>,
    ctx: Arc<RelayContext>,
    shutdown: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }
    debug!(session = %key, "Session worker started");

    let idle = ctx.config.worker_idle_timeout;
    loop {
        let request = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = tokio::time::timeout(idle, rx.recv()) => match next {
                Ok(Some(request)) => request,
                Ok(None) => break,
                // Idle: stop accepting, then finish whatever is still queued.
                Err(_) => {
                    rx.close();
                    continue;
                }
            },
        };
        process(&ctx, &shutdown, request).await;
    }

    rx.close();
    while let Ok(request) = rx.try_recv() {
        ctx.report_failure(&request.topic, &RelayError::Cancelled)
            .await;
    }
    debug!(session = %key, "Session worker stopped");
}

async fn process(ctx: &RelayContext, shutdown: &CancellationToken, request: InboundRequest) {
    let key = &request.topic;
    ctx.store.ensure(key);
    ctx.store.append(key, Role::User, &request.msg);

    let capability = ctx.classifier.classify(&request.msg);
    info!(
        session = %key,
        capability = %capability,
        text = %preview(&request.msg, 40),
        "Handling request"
    );
    ctx.record(
        TranscriptEvent::RequestClassified,
        key,
        json!({
            "capability": capability.as_str(),
        }),
    );

    let scope = ctx.scope(shutdown);
    let result = match capability {
        Capability::Chat => ChatStreamHandler::new(ctx)
            .handle(&request, &scope)
            .await
            .map(|_| ()),
        Capability::Draw => ImageHandler::new(ctx)
            .handle(&request, &scope)
            .await
            .map(|_| ()),
    };

    if let Err(e) = result {
        ctx.report_failure(key, &e).await;
    }
}
