//! File operations requested by voice
//!
//! Relative paths resolve against the configured documents directory.

use crate::command::result::ActionResult;
use crate::command::text_param;
use crate::core::error::Result;
use crate::llm::parser::Parameters;
use crate::platform::PlatformExecutor;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Most search hits returned in one result
pub const MAX_SEARCH_RESULTS: usize = 20;

/// Most directory entries returned in one result
pub const MAX_LISTED_ENTRIES: usize = 50;

/// Document operations accepted in `parameters.operation`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOperation {
    Open,
    Search,
    Create,
    List,
    Delete,
    Copy,
    Move,
}

impl DocumentOperation {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "open" => Some(DocumentOperation::Open),
            "search" | "find" => Some(DocumentOperation::Search),
            "create" => Some(DocumentOperation::Create),
            "list" => Some(DocumentOperation::List),
            "delete" => Some(DocumentOperation::Delete),
            "copy" => Some(DocumentOperation::Copy),
            "move" => Some(DocumentOperation::Move),
            _ => None,
        }
    }
}

pub struct DocumentHandler<'a> {
    executor: &'a dyn PlatformExecutor,
    root: &'a Path,
}

impl<'a> DocumentHandler<'a> {
    pub fn new(executor: &'a dyn PlatformExecutor, root: &'a Path) -> Self {
        Self { executor, root }
    }

    pub async fn handle(&self, params: &Parameters) -> ActionResult {
        let Some(name) = text_param(params, "operation") else {
            return ActionResult::failure(
                "No document operation specified",
                "What should I do with the document?",
            );
        };
        let Some(operation) = DocumentOperation::parse(&name) else {
            return ActionResult::failure(
                format!("Unknown document operation: {}", name),
                format!("I don't know how to {} a document", name),
            )
            .with_data(serde_json::Value::Object(params.clone()));
        };

        tracing::info!("Document operation {:?}", operation);
        let file_path = text_param(params, "filePath");
        match operation {
            DocumentOperation::Open => self.open(file_path).await,
            DocumentOperation::Search => self.search(text_param(params, "searchTerm")).await,
            DocumentOperation::Create => {
                self.create(file_path, text_param(params, "content").unwrap_or_default())
                    .await
            }
            DocumentOperation::List => self.list(text_param(params, "directory")).await,
            DocumentOperation::Delete => self.delete(file_path).await,
            DocumentOperation::Copy => {
                self.transfer(file_path, text_param(params, "destination"), false)
                    .await
            }
            DocumentOperation::Move => {
                self.transfer(file_path, text_param(params, "destination"), true)
                    .await
            }
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    async fn open(&self, file_path: Option<String>) -> ActionResult {
        let Some(file_path) = file_path else {
            return missing_path("open");
        };
        let path = self.resolve(&file_path);
        let shown = path.display().to_string();
        match self.executor.open_app(&shown).await {
            Ok(()) => ActionResult::ok_with(
                format!("Opened document: {}", shown),
                json!({ "filePath": shown }),
            ),
            Err(e) => failed("open document", e, json!({ "filePath": shown })),
        }
    }

    async fn search(&self, term: Option<String>) -> ActionResult {
        let Some(term) = term else {
            return ActionResult::failure("No search term specified", "What file should I look for?");
        };
        match self.executor.find_files(self.root, &term).await {
            Ok(found) => {
                let total = found.len();
                let files: Vec<String> = found
                    .iter()
                    .take(MAX_SEARCH_RESULTS)
                    .map(|p| p.display().to_string())
                    .collect();
                ActionResult::ok_with(
                    format!("Found {} files matching \"{}\"", total, term),
                    json!({ "searchTerm": term, "files": files, "totalFound": total }),
                )
            }
            Err(e) => failed("search files", e, json!({ "searchTerm": term })),
        }
    }

    async fn create(&self, file_path: Option<String>, content: String) -> ActionResult {
        let path = match file_path {
            Some(p) => self.resolve(&p),
            None => self.root.join(format!(
                "untitled-{}.txt",
                chrono::Local::now().format("%Y%m%d-%H%M%S")
            )),
        };
        let shown = path.display().to_string();
        match self.executor.write_file(&path, &content).await {
            Ok(()) => ActionResult::ok_with(
                format!("Created document: {}", shown),
                json!({ "filePath": shown, "content": content }),
            ),
            Err(e) => failed("create document", e, json!({ "filePath": shown })),
        }
    }

    async fn list(&self, directory: Option<String>) -> ActionResult {
        let dir = directory
            .as_deref()
            .map(|d| self.resolve(d))
            .unwrap_or_else(|| self.root.to_path_buf());
        let shown = dir.display().to_string();
        match self.executor.read_dir(&dir).await {
            Ok(entries) => {
                let total = entries.len();
                let files: Vec<String> = entries.into_iter().take(MAX_LISTED_ENTRIES).collect();
                ActionResult::ok_with(
                    format!("Found {} items in {}", total, shown),
                    json!({ "directory": shown, "files": files, "totalItems": total }),
                )
            }
            Err(e) => failed("list files", e, json!({ "directory": shown })),
        }
    }

    async fn delete(&self, file_path: Option<String>) -> ActionResult {
        let Some(file_path) = file_path else {
            return missing_path("delete");
        };
        let path = self.resolve(&file_path);
        let shown = path.display().to_string();
        match self.executor.delete_file(&path).await {
            Ok(()) => ActionResult::ok_with(
                format!("Deleted file: {}", shown),
                json!({ "filePath": shown }),
            ),
            Err(e) => failed("delete file", e, json!({ "filePath": shown })),
        }
    }

    async fn transfer(
        &self,
        source: Option<String>,
        destination: Option<String>,
        remove_source: bool,
    ) -> ActionResult {
        let verb = if remove_source { "move" } else { "copy" };
        let (Some(source), Some(destination)) = (source, destination) else {
            return ActionResult::failure(
                "Source and destination are required",
                format!("Which file should I {}, and where to?", verb),
            );
        };
        let from = self.resolve(&source);
        let to = self.resolve(&destination);
        let data = json!({
            "source": from.display().to_string(),
            "destination": to.display().to_string(),
        });

        let outcome: Result<()> = if remove_source {
            self.executor.move_file(&from, &to).await
        } else {
            self.executor.copy_file(&from, &to).await
        };

        match outcome {
            Ok(()) => {
                let past = if remove_source { "Moved" } else { "Copied" };
                ActionResult::ok_with(
                    format!("{} file: {} -> {}", past, from.display(), to.display()),
                    data,
                )
            }
            Err(e) => failed(&format!("{} file", verb), e, data),
        }
    }
}

fn missing_path(verb: &str) -> ActionResult {
    ActionResult::failure("No file specified", format!("Which file should I {}?", verb))
}

fn failed(what: &str, err: crate::core::error::VoxError, data: serde_json::Value) -> ActionResult {
    tracing::warn!("Failed to {}: {}", what, err);
    ActionResult::failure(err.to_string(), format!("Failed to {}: {}", what, err)).with_data(data)
}
