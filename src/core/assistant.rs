//! Answer-generation collaborator.
//!
//! Answers are produced by a background task fed through a bounded channel.
//! Request handlers reach it with [`ChannelAnswerGenerator`]; the task itself
//! uses [`PlaceholderAnswerGenerator`] until a retrieval-backed model is wired in.

use crate::TASK_SENDER;
use crate::core::error::AnswerError;
use crate::core::traits::AnswerGenerator;
use crate::core::types::{Answer, AnswerRequest};
use async_trait::async_trait;
use di::{inject, injectable};
use log::{debug, info, warn};
use minijinja::Environment;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

const PLACEHOLDER_TEMPLATE: &str = "This is a placeholder answer. In the real app, I will answer using your uploaded notes.

You asked: \"{{ question }}\"";

pub const PLACEHOLDER_SOURCE: &str = "Example Note.pdf (page 2)";

/// Canned answer echoing the question, citing the example note.
pub struct PlaceholderAnswerGenerator {
    templates: Environment<'static>,
}

#[injectable(AnswerGenerator)]
impl PlaceholderAnswerGenerator {
    #[inject]
    pub fn new() -> PlaceholderAnswerGenerator {
        PlaceholderAnswerGenerator {
            templates: Environment::new(),
        }
    }
}

impl PlaceholderAnswerGenerator {
    fn render(&self, request: &AnswerRequest) -> Result<String, minijinja::Error> {
        self.templates.render_str(
            PLACEHOLDER_TEMPLATE,
            minijinja::context! {
                question => &request.question,
            },
        )
    }
}

impl Default for PlaceholderAnswerGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerGenerator for PlaceholderAnswerGenerator {
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AnswerError> {
        let text = self
            .render(&request)
            .map_err(|e| AnswerError(format!("failed to render answer: {e}")))?;

        let mut sources = vec![PLACEHOLDER_SOURCE.to_owned()];
        if let Some(material_id) = request.material_id {
            sources.push(material_id);
        }

        Ok(Answer { text, sources })
    }
}

pub struct AnswerTask {
    request: AnswerRequest,
    return_channel: oneshot::Sender<Result<Answer, AnswerError>>,
}

impl AnswerTask {
    pub fn new(request: AnswerRequest) -> (AnswerTask, oneshot::Receiver<Result<Answer, AnswerError>>) {
        let (sender, receiver) = oneshot::channel();

        (
            AnswerTask {
                request,
                return_channel: sender,
            },
            receiver,
        )
    }
}

pub async fn background_task(mut task_queue: mpsc::Receiver<AnswerTask>) {
    let generator = PlaceholderAnswerGenerator::new();
    info!("answer worker started");

    while let Some(task) = task_queue.recv().await {
        let conversation_id = task.request.conversation_id;
        let started = Instant::now();
        let result = generator.answer(task.request).await;
        debug!(
            "answered in conversation {conversation_id} in {:.2} ms",
            started.elapsed().as_secs_f64() * 1000.0
        );

        if task.return_channel.send(result).is_err() {
            warn!("requester for conversation {conversation_id} went away before the answer");
        }
    }

    info!("answer worker stopped");
}

/// Hands requests to the background worker and waits for its reply.
///
/// Queueing and answering together are bounded by `timeout`.
pub struct ChannelAnswerGenerator {
    task_sender: Option<mpsc::Sender<AnswerTask>>,
    timeout: Duration,
}

impl ChannelAnswerGenerator {
    /// Client of the worker registered in [`TASK_SENDER`].
    pub fn new(timeout: Duration) -> ChannelAnswerGenerator {
        ChannelAnswerGenerator {
            task_sender: None,
            timeout,
        }
    }

    pub fn with_sender(
        task_sender: mpsc::Sender<AnswerTask>,
        timeout: Duration,
    ) -> ChannelAnswerGenerator {
        ChannelAnswerGenerator {
            task_sender: Some(task_sender),
            timeout,
        }
    }
}

#[async_trait]
impl AnswerGenerator for ChannelAnswerGenerator {
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AnswerError> {
        let task_sender = self
            .task_sender
            .as_ref()
            .or_else(|| TASK_SENDER.get())
            .ok_or_else(|| AnswerError("answer worker is not running".to_owned()))?;

        let (task, receiver) = AnswerTask::new(request);
        let round_trip = async {
            if task_sender.send(task).await.is_err() {
                return Err(AnswerError("answer worker stopped".to_owned()));
            }
            match receiver.await {
                Ok(result) => result,
                Err(_) => Err(AnswerError("answer worker dropped the request".to_owned())),
            }
        };

        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(AnswerError(format!(
                "no answer within {:?}",
                self.timeout
            ))),
        }
    }
}
