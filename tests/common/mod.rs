//! Shared fixtures: in-memory stores and scripted answer generators.

#![allow(dead_code)]

use async_trait::async_trait;
use di::Ref;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use study_chat_server::core::assistant::PlaceholderAnswerGenerator;
use study_chat_server::core::error::AnswerError;
use study_chat_server::core::services::StudyConversationService;
use study_chat_server::core::traits::{AnswerGenerator, ConversationService};
use study_chat_server::core::types::{Answer, AnswerRequest};
use study_chat_server::infrastructure::memory::{
    InMemoryConversationRepository, InMemoryMessageRepository, MemoryDatabase,
};
use tokio::sync::Notify;

pub fn memory_service(assistant: Ref<dyn AnswerGenerator>) -> Ref<dyn ConversationService> {
    let database = Ref::new(MemoryDatabase::default());
    Ref::new(StudyConversationService::new(
        Ref::new(InMemoryConversationRepository::new(database.clone())),
        Ref::new(InMemoryMessageRepository::new(database)),
        assistant,
    ))
}

pub fn placeholder_service() -> Ref<dyn ConversationService> {
    memory_service(Ref::new(PlaceholderAnswerGenerator::new()))
}

/// Always fails, like an unreachable model.
pub struct FailingAnswerGenerator;

#[async_trait]
impl AnswerGenerator for FailingAnswerGenerator {
    async fn answer(&self, _request: AnswerRequest) -> Result<Answer, AnswerError> {
        Err(AnswerError("model unavailable".to_owned()))
    }
}

/// Fails the first `failures` calls, then answers.
pub struct FlakyAnswerGenerator {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyAnswerGenerator {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AnswerGenerator for FlakyAnswerGenerator {
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AnswerError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(AnswerError("timed out".to_owned()));
        }
        Ok(Answer {
            text: format!("answer to {}", request.question),
            sources: Vec::new(),
        })
    }
}

/// Records every request it receives.
#[derive(Default)]
pub struct RecordingAnswerGenerator {
    pub requests: Mutex<Vec<AnswerRequest>>,
}

#[async_trait]
impl AnswerGenerator for RecordingAnswerGenerator {
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AnswerError> {
        self.requests.lock().unwrap().push(request);
        Ok(Answer {
            text: "recorded".to_owned(),
            sources: vec!["notes.pdf".to_owned()],
        })
    }
}

/// Holds every answer until released, so a send can be observed in flight.
#[derive(Default)]
pub struct GatedAnswerGenerator {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl AnswerGenerator for GatedAnswerGenerator {
    async fn answer(&self, request: AnswerRequest) -> Result<Answer, AnswerError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(Answer {
            text: format!("answer to {}", request.question),
            sources: Vec::new(),
        })
    }
}
