//! Inbound dispatch.
//!
//! [`InboundDispatcher`] drains the inbound queue and fans requests out:
//!
//! - invalid requests are answered with an error message right away
//! - audio requests are transcribed on their own task and the resulting text
//!   request is put back on the queue
//! - everything else goes to the per-session worker for its topic
//!
//! The dispatcher itself never waits on a provider, so one slow session
//! cannot hold up another.

use crate::ports::transcript::TranscriptEvent;
use crate::use_cases::audio::AudioHandler;
use crate::use_cases::shared::{RelayContext, RelayError};
use crate::use_cases::worker::SessionWorker;
use relay_domain::{DomainError, InboundRequest, SessionKey};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors returned to whoever feeds the dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Dispatcher is no longer accepting requests")]
    Closed,

    #[error(transparent)]
    Request(#[from] DomainError),
}

/// Producer side of the inbound queue.
///
/// The dispatcher runs until every `RequestSender` is dropped or its
/// shutdown token fires.
/// Never blocks, so it is safe to call from a transport's event loop.
#[derive(Clone)]
pub struct RequestSender {
    tx: mpsc::UnboundedSender<InboundRequest>,
}

impl RequestSender {
    pub fn submit(&self, request: InboundRequest) -> Result<(), DispatchError> {
        self.tx.send(request).map_err(|_| DispatchError::Closed)
    }

    /// Decode a raw broker payload and queue it.
    pub fn submit_raw(&self, body: &[u8]) -> Result<(), DispatchError> {
        let request = InboundRequest::decode(body)?;
        self.submit(request)
    }
}

pub struct InboundDispatcher {
    ctx: Arc<RelayContext>,
    inbound: mpsc::UnboundedReceiver<InboundRequest>,
    /// Used by transcription tasks to requeue text requests
    resubmit: mpsc::WeakUnboundedSender<InboundRequest>,
    workers: HashMap<SessionKey, SessionWorker>,
    transcriptions: JoinSet<()>,
    shutdown: CancellationToken,
}

impl InboundDispatcher {
    pub fn new(ctx: Arc<RelayContext>) -> (Self, RequestSender) {
        let (tx, inbound) = mpsc::unbounded_channel();
        let dispatcher = Self {
            ctx,
            inbound,
            resubmit: tx.downgrade(),
            workers: HashMap::new(),
            transcriptions: JoinSet::new(),
            shutdown: CancellationToken::new(),
        };
        (dispatcher, RequestSender { tx })
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Process requests until shutdown or until all senders are gone, then
    /// wait for in-flight work to finish.
    pub async fn run(mut self) {
        let reap_every = self.ctx.config.worker_idle_timeout.max(Duration::from_secs(1));
        let mut reap = tokio::time::interval(reap_every);
        reap.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Dispatcher started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                request = self.inbound.recv() => match request {
                    Some(request) => self.dispatch(request).await,
                    None => {
                        debug!("All request senders dropped");
                        break;
                    }
                },
                Some(_) = self.transcriptions.join_next(), if !self.transcriptions.is_empty() => {}
                _ = reap.tick() => self.reap_idle_workers(),
            }
        }

        self.drain().await;
        info!("Dispatcher stopped");
    }

    async fn dispatch(&mut self, request: InboundRequest) {
        let key = request.topic.clone();
        self.ctx.record(
            TranscriptEvent::RequestReceived,
            &key,
            json!({
                "text": &request.msg,
                "payload_bytes": request.payload_len(),
                "payload_type": &request.payload_type,
            }),
        );

        if let Err(e) = request.validate() {
            if key.is_empty() {
                warn!(error = %e, "Dropped request without a session key");
            } else {
                self.ctx.report_failure(&key, &RelayError::Request(e)).await;
            }
            return;
        }

        if request.needs_transcription() {
            self.spawn_transcription(request).await;
        } else {
            self.route(request);
        }
    }

    fn route(&mut self, request: InboundRequest) {
        let key = request.topic.clone();
        let request = match self.workers.get(&key) {
            Some(worker) => match worker.tx.send(request) {
                Ok(()) => return,
                // Worker went idle and closed its queue
                Err(mpsc::error::SendError(request)) => request,
            },
            None => request,
        };

        let previous = self.workers.remove(&key).map(|worker| worker.join);
        let worker = SessionWorker::spawn(
            key.clone(),
            self.ctx.clone(),
            self.shutdown.clone(),
            previous,
        );
        if worker.tx.send(request).is_err() {
            warn!(session = %key, "Session worker exited before its first request");
        }
        self.workers.insert(key, worker);
    }

    async fn spawn_transcription(&mut self, request: InboundRequest) {
        let key = request.topic.clone();
        let Some(resubmit) = self.resubmit.upgrade() else {
            self.ctx.report_failure(&key, &RelayError::Cancelled).await;
            return;
        };

        debug!(session = %key, bytes = request.payload_len(), "Transcribing audio request");
        let ctx = self.ctx.clone();
        let shutdown = self.shutdown.clone();
        self.transcriptions.spawn(async move {
            let scope = ctx.scope(&shutdown);
            match AudioHandler::new(&ctx).transcribe(request, &scope).await {
                Ok(text_request) => {
                    if resubmit.send(text_request).is_err() {
                        ctx.report_failure(&key, &RelayError::Cancelled).await;
                    }
                }
                Err(e) => ctx.report_failure(&key, &e).await,
            }
        });
    }

    fn reap_idle_workers(&mut self) {
        let before = self.workers.len();
        self.workers.retain(|_, worker| !worker.is_finished());
        let reaped = before - self.workers.len();
        if reaped > 0 {
            debug!(reaped, active = self.workers.len(), "Reaped idle session workers");
        }
    }

    async fn drain(&mut self) {
        self.inbound.close();
        while let Ok(request) = self.inbound.try_recv() {
            if !request.topic.is_empty() {
                self.ctx
                    .report_failure(&request.topic, &RelayError::Cancelled)
                    .await;
            }
        }

        while self.transcriptions.join_next().await.is_some() {}

        for (_, worker) in self.workers.drain() {
            drop(worker.tx);
            let _ = worker.join.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::ports::ai_provider::ProviderError;
    use crate::ports::session_store::SessionStore;
    use crate::use_cases::test_support::{
        harness, harness_with, png_bytes, until_terminal, ChatScript, Harness, ScriptedProvider,
    };
    use relay_domain::{Role, SessionPolicy, StreamEvent, FINISH_SENTINEL, IMAGE_PNG};
    use tokio::task::JoinHandle;

    const APOLOGY: &str = "抱歉 我出错了，请再试一次";

    fn start(h: &Harness) -> (RequestSender, CancellationToken, JoinHandle<()>) {
        let (dispatcher, sender) = InboundDispatcher::new(h.ctx.clone());
        let shutdown = dispatcher.shutdown_token();
        let task = tokio::spawn(dispatcher.run());
        (sender, shutdown, task)
    }

    fn key(topic: &str) -> SessionKey {
        SessionKey::new(topic)
    }

    #[tokio::test]
    async fn test_chat_request_streams_and_commits() {
        let provider = ScriptedProvider::new().with_chat(ChatScript::Events(vec![
            StreamEvent::Delta("你".into()),
            StreamEvent::Delta("好".into()),
            StreamEvent::Completed,
        ]));
        let mut h = harness(provider);
        let (sender, _shutdown, task) = start(&h);

        sender.submit(InboundRequest::text("t/1", "你好")).unwrap();
        let messages = until_terminal(&mut h.published, &key("t/1")).await;

        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["你", "你好", FINISH_SENTINEL]);
        assert!(messages[2].is_finish);

        let turns = h.store.snapshot(&key("t/1"));
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content, "你好");
        assert_eq!(turns[2].role, Role::Assistant);
        assert_eq!(turns[2].content, "你好");

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_draw_request_never_calls_chat() {
        let mut h = harness(ScriptedProvider::new());
        let (sender, _shutdown, task) = start(&h);

        sender
            .submit(InboundRequest::text("t/2", "画一只可爱的小猫咪"))
            .unwrap();
        let messages = until_terminal(&mut h.published, &key("t/2")).await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload_type.as_deref(), Some(IMAGE_PNG));
        assert_eq!(messages[0].payload.as_deref(), Some(png_bytes().as_slice()));
        assert_eq!(h.provider.chat_calls(), 0);
        assert_eq!(h.provider.image_calls(), 1);

        // user turn recorded, image not
        let turns = h.store.snapshot(&key("t/2"));
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::User);

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_history_cap_over_many_exchanges() {
        let mut h = harness_with(
            ScriptedProvider::new(),
            SessionPolicy::default().with_max_turns(21),
            RelayConfig::default(),
        );
        let (sender, _shutdown, task) = start(&h);
        let topic = key("t/cap");

        for i in 0..25 {
            sender
                .submit(InboundRequest::text("t/cap", format!("q{i}")))
                .unwrap();
        }
        for _ in 0..25 {
            until_terminal(&mut h.published, &topic).await;
        }

        let histories = h.provider.chat_histories.lock().unwrap().clone();
        assert_eq!(histories.len(), 25);

        // each request saw its predecessor's reply
        for (i, history) in histories.iter().enumerate().skip(1) {
            let previous_reply = format!("reply:q{}", i - 1);
            assert!(history.iter().any(|t| t.content == previous_reply));
            assert_eq!(history.last().unwrap().content, format!("q{i}"));
        }

        let last = &histories[24];
        assert_eq!(last.len(), 21);
        assert_eq!(last[0].role, Role::System);
        assert!(last.iter().all(|t| t.content != "q0"));

        let turns = h.store.snapshot(&topic);
        assert_eq!(turns.len(), 21);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[20].content, "reply:q24");

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let mut h = harness(ScriptedProvider::new());
        let (sender, _shutdown, task) = start(&h);

        sender.submit(InboundRequest::text("a", "from a")).unwrap();
        sender.submit(InboundRequest::text("b", "from b")).unwrap();
        until_terminal(&mut h.published, &key("a")).await;

        drop(sender);
        task.await.unwrap();

        let a = h.store.snapshot(&key("a"));
        let b = h.store.snapshot(&key("b"));
        assert!(a.iter().all(|t| !t.content.contains("from b")));
        assert!(b.iter().all(|t| !t.content.contains("from a")));
        assert_eq!(b.last().unwrap().content, "reply:from b");
    }

    #[tokio::test]
    async fn test_slow_session_does_not_block_others() {
        let provider = ScriptedProvider::new().with_hang_on("slow");
        let mut h = harness_with(
            provider,
            SessionPolicy::default(),
            RelayConfig::default().with_request_timeout(Duration::from_secs(600)),
        );
        let (sender, shutdown, task) = start(&h);

        sender.submit(InboundRequest::text("a", "slow")).unwrap();
        sender.submit(InboundRequest::text("b", "fast")).unwrap();

        let b = until_terminal(&mut h.published, &key("b")).await;
        assert!(b.last().unwrap().is_finish);
        assert!(!b.last().unwrap().is_error);

        // shutdown cancels the stalled request with a single error
        shutdown.cancel();
        let a = until_terminal(&mut h.published, &key("a")).await;
        assert_eq!(a.len(), 1);
        assert!(a[0].is_error);
        assert!(a[0].text.starts_with(APOLOGY));

        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_open_failure_sends_bare_apology() {
        let provider = ScriptedProvider::new().with_chat(ChatScript::OpenFail(
            ProviderError::Connection("refused".into()),
        ));
        let mut h = harness(provider);
        let (sender, _shutdown, task) = start(&h);

        sender.submit(InboundRequest::text("t/1", "hello")).unwrap();
        let messages = until_terminal(&mut h.published, &key("t/1")).await;

        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_error);
        assert!(messages[0].is_finish);
        assert_eq!(messages[0].text, APOLOGY);

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_mid_stream_error_then_recovery() {
        let provider = ScriptedProvider::new().with_chat(ChatScript::Events(vec![
            StreamEvent::Delta("你".into()),
            StreamEvent::Delta("好".into()),
            StreamEvent::Error("connection reset".into()),
        ]));
        let mut h = harness(provider);
        let (sender, _shutdown, task) = start(&h);
        let topic = key("t/1");

        sender.submit(InboundRequest::text("t/1", "hello")).unwrap();
        let first = until_terminal(&mut h.published, &topic).await;
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].text, "你");
        assert_eq!(first[1].text, "你好");
        assert!(first[..2].iter().all(|m| !m.is_finish && !m.is_error));
        assert!(first[2].is_error);
        assert!(first[2].text.starts_with(APOLOGY));
        assert!(first[2].text.contains("connection reset"));
        assert_eq!(first.iter().filter(|m| m.is_error).count(), 1);
        assert_eq!(h.store.turn_count(&topic), Some(2));

        sender.submit(InboundRequest::text("t/1", "again")).unwrap();
        let second = until_terminal(&mut h.published, &topic).await;
        assert!(!second.last().unwrap().is_error);

        assert_eq!(
            h.transcript.events_for(&topic),
            [
                TranscriptEvent::RequestReceived,
                TranscriptEvent::RequestClassified,
                TranscriptEvent::RequestFailed,
                TranscriptEvent::RequestReceived,
                TranscriptEvent::RequestClassified,
                TranscriptEvent::ChatCompleted,
            ]
        );

        let turns = h.store.snapshot(&topic);
        let contents: Vec<_> = turns.iter().skip(1).map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["hello", "again", "reply:again"]);

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_audio_transcript_is_redispatched_as_draw() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            ScriptedProvider::new().with_transcript(Ok("画一只可爱的小猫咪".into()));
        let mut h = harness_with(
            provider,
            SessionPolicy::default(),
            RelayConfig::default().with_audio_dir(dir.path()),
        );
        let (sender, _shutdown, task) = start(&h);

        sender
            .submit(InboundRequest::audio("t/3", vec![0; 2048], "m4a"))
            .unwrap();
        let messages = until_terminal(&mut h.published, &key("t/3")).await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload_type.as_deref(), Some(IMAGE_PNG));
        assert_eq!(
            h.provider.image_prompts.lock().unwrap().as_slice(),
            ["画一只可爱的小猫咪"]
        );
        assert_eq!(h.provider.chat_calls(), 0);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_audio_transcript_is_redispatched_as_chat() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new().with_transcript(Ok("今天天气怎么样".into()));
        let mut h = harness_with(
            provider,
            SessionPolicy::default(),
            RelayConfig::default().with_audio_dir(dir.path()),
        );
        let (sender, _shutdown, task) = start(&h);

        sender
            .submit(InboundRequest::audio("t/3", vec![1, 2, 3], "wav"))
            .unwrap();
        let messages = until_terminal(&mut h.published, &key("t/3")).await;

        assert_eq!(messages.last().unwrap().text, FINISH_SENTINEL);
        assert_eq!(h.provider.chat_calls(), 1);
        let turns = h.store.snapshot(&key("t/3"));
        assert_eq!(turns[1].content, "今天天气怎么样");

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_transcription_sends_one_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new()
            .with_transcript(Err(ProviderError::Connection("unreachable".into())));
        let mut h = harness_with(
            provider,
            SessionPolicy::default(),
            RelayConfig::default().with_audio_dir(dir.path()),
        );
        let (sender, _shutdown, task) = start(&h);

        sender
            .submit(InboundRequest::audio("t/3", vec![1, 2, 3], "wav"))
            .unwrap();
        let messages = until_terminal(&mut h.published, &key("t/3")).await;

        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_error);
        assert!(messages[0].text.contains("unreachable"));
        assert_eq!(h.provider.chat_calls(), 0);
        assert_eq!(h.store.turn_count(&key("t/3")), None);

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_request_is_answered_with_error() {
        let mut h = harness(ScriptedProvider::new());
        let (sender, _shutdown, task) = start(&h);

        sender.submit(InboundRequest::text("t/4", "")).unwrap();
        let messages = until_terminal(&mut h.published, &key("t/4")).await;

        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_error);
        assert_eq!(h.provider.chat_calls(), 0);

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_raw_rejects_malformed_json() {
        let h = harness(ScriptedProvider::new());
        let (sender, _shutdown, task) = start(&h);

        let err = sender.submit_raw(b"{not json").unwrap_err();
        assert!(matches!(err, DispatchError::Request(DomainError::MalformedRequest(_))));

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_raw_accepts_wire_request() {
        let mut h = harness(ScriptedProvider::new());
        let (sender, _shutdown, task) = start(&h);

        sender
            .submit_raw(br#"{"topic":"t/5","msg":"hi"}"#)
            .unwrap();
        let messages = until_terminal(&mut h.published, &key("t/5")).await;
        assert_eq!(messages.last().unwrap().text, FINISH_SENTINEL);

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_resumes_after_idle_worker_exit() {
        let mut h = harness_with(
            ScriptedProvider::new(),
            SessionPolicy::default(),
            RelayConfig::default().with_worker_idle_timeout(Duration::from_millis(20)),
        );
        let (sender, _shutdown, task) = start(&h);
        let topic = key("t/idle");

        sender.submit(InboundRequest::text("t/idle", "one")).unwrap();
        until_terminal(&mut h.published, &topic).await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        sender.submit(InboundRequest::text("t/idle", "two")).unwrap();
        until_terminal(&mut h.published, &topic).await;

        let histories = h.provider.chat_histories.lock().unwrap().clone();
        assert!(histories[1].iter().any(|t| t.content == "reply:one"));

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_returns_after_senders_drop() {
        let h = harness(ScriptedProvider::new());
        let (sender, _shutdown, task) = start(&h);
        drop(sender);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("dispatcher did not stop")
            .unwrap();
    }
}
