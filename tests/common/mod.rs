//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use voxdesk::command::{ActionDispatcher, IntentResolver};
use voxdesk::core::config::AssistantConfig;
use voxdesk::core::error::{Result, VoxError};
use voxdesk::core::types::Platform;
use voxdesk::llm::LanguageBackend;
use voxdesk::pipeline::{CommandPipeline, PipelineEvent};
use voxdesk::platform::PlatformExecutor;
use voxdesk::speech::TextToSpeech;

/// Backend that replays canned replies in order, then repeats the last one
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .ok_or_else(|| VoxError::Backend("no scripted reply".into()))
    }
}

/// Backend that is always unreachable
pub struct DownBackend {
    pub calls: AtomicUsize,
}

impl DownBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LanguageBackend for DownBackend {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(VoxError::Backend("connection refused".into()))
    }
}

/// Backend that parks every call until released
pub struct BlockingBackend {
    pub entered: Notify,
    pub release: Notify,
    reply: String,
}

impl BlockingBackend {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
            reply: reply.to_string(),
        })
    }
}

#[async_trait]
impl LanguageBackend for BlockingBackend {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}

/// Executor that records side effects instead of performing them. File
/// operations use the trait defaults and touch the real file system.
#[derive(Default)]
pub struct RecordingExecutor {
    pub opened_apps: Mutex<Vec<String>>,
    pub opened_urls: Mutex<Vec<String>>,
    pub typed: Mutex<Vec<String>>,
    pub clicks: Mutex<Vec<(i32, i32)>>,
    /// When set, `open_url` fails
    pub fail_urls: Mutex<bool>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn apps(&self) -> Vec<String> {
        self.opened_apps.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.opened_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformExecutor for RecordingExecutor {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    async fn open_app(&self, name_or_path: &str) -> Result<()> {
        self.opened_apps.lock().unwrap().push(name_or_path.to_string());
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        if *self.fail_urls.lock().unwrap() {
            return Err(VoxError::Executor("no browser available".into()));
        }
        self.opened_urls.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn take_screenshot(&self) -> Result<PathBuf> {
        Ok(Path::new("screenshots").join("screenshot-2024-01-01T00-00-00-000Z.png"))
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn click_at(&self, x: i32, y: i32) -> Result<()> {
        self.clicks.lock().unwrap().push((x, y));
        Ok(())
    }

    async fn active_window(&self) -> Result<String> {
        Ok("Terminal".to_string())
    }
}

/// Speaker that keeps everything it was asked to say
#[derive(Default)]
pub struct RecordingSpeaker {
    pub lines: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn said(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextToSpeech for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        self.lines.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A wired pipeline plus handles on its collaborators
pub struct Harness {
    pub pipeline: Arc<CommandPipeline>,
    pub executor: Arc<RecordingExecutor>,
    pub speaker: Arc<RecordingSpeaker>,
    pub events: tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>,
}

pub fn harness(backend: Option<Arc<dyn LanguageBackend>>) -> Harness {
    harness_with(backend, AssistantConfig::default())
}

pub fn harness_with(backend: Option<Arc<dyn LanguageBackend>>, config: AssistantConfig) -> Harness {
    let executor = RecordingExecutor::new();
    let speaker = Arc::new(RecordingSpeaker::default());
    let window = config.pipeline.history_window;

    let resolver = match backend {
        Some(backend) => IntentResolver::new(backend, Duration::from_secs(5), window),
        None => IntentResolver::without_backend(window),
    };
    let dispatcher = ActionDispatcher::new(executor.clone(), &config);
    let (pipeline, events) =
        CommandPipeline::new(config.pipeline.clone(), resolver, dispatcher, speaker.clone());

    Harness {
        pipeline: Arc::new(pipeline),
        executor,
        speaker,
        events,
    }
}

/// Query pairs of a URL
pub fn query_pairs(url: &str) -> Vec<(String, String)> {
    reqwest::Url::parse(url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
