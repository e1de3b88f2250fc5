//! In-memory stand-ins for the database, container runtime, shell and
//! embedding seams.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::database::{Connector, EmbeddingValue, SourceRow, TargetDatabase};
use crate::embeddings::EmbeddingProvider;
use crate::installer::{CommandOutput, ContainerRuntime, HostShell};
use crate::request::ProvisionRequest;
use crate::{ProvisionError, Result};

pub(crate) const DEBIAN_OS_RELEASE: &str =
    "PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\nID=debian\n";

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub extension_installed: bool,
    pub executed: Vec<String>,
    pub counted: Vec<String>,
    pub streamed: Vec<String>,
    pub tables: HashSet<String>,
    pub inserts: Vec<(String, i64, EmbeddingValue)>,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct MemoryDatabase {
    product: String,
    rows: Arc<Vec<SourceRow>>,
    fail_insert_at: Option<usize>,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new(product: &str) -> Self {
        Self {
            product: product.to_string(),
            rows: Arc::new(Vec::new()),
            fail_insert_at: None,
            state: Arc::default(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<SourceRow>) -> Self {
        self.rows = Arc::new(rows);
        self
    }

    pub fn with_extension(self) -> Self {
        self.state().extension_installed = true;
        self
    }

    /// Fail the insert with this zero-based index.
    pub fn failing_insert_at(mut self, index: usize) -> Self {
        self.fail_insert_at = Some(index);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory database lock poisoned")
    }

    pub fn inserted_keys(&self) -> Vec<i64> {
        self.state().inserts.iter().map(|(_, key, _)| *key).collect()
    }
}

/// Table name following `CREATE TABLE [IF NOT EXISTS]`.
fn created_table(sql: &str) -> Option<(String, bool)> {
    let rest = sql.strip_prefix("CREATE TABLE ")?;
    let (conditional, rest) = match rest.strip_prefix("IF NOT EXISTS ") {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let name = rest.split(" (").next()?.to_string();
    Some((name, conditional))
}

#[async_trait]
impl TargetDatabase for MemoryDatabase {
    async fn product_name(&self) -> Result<String> {
        Ok(self.product.clone())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut state = self.state();
        state.executed.push(sql.to_string());

        if sql.starts_with("CREATE EXTENSION") {
            state.extension_installed = true;
        }

        if let Some((table, conditional)) = created_table(sql) {
            if !state.tables.insert(table.clone()) && !conditional {
                return Err(ProvisionError::Sql(format!(
                    "name {table} is already used by an existing object"
                )));
            }
        }

        Ok(0)
    }

    async fn fetch_count(&self, sql: &str) -> Result<i64> {
        let mut state = self.state();
        state.counted.push(sql.to_string());
        Ok(i64::from(state.extension_installed))
    }

    fn stream_rows<'a>(
        &'a self,
        sql: &'a str,
        _field_count: usize,
    ) -> BoxStream<'a, Result<SourceRow>> {
        self.state().streamed.push(sql.to_string());
        stream::iter(self.rows.iter().cloned().map(Ok)).boxed()
    }

    async fn insert_embedding(
        &self,
        sql: &str,
        foreign_key: i64,
        embedding: EmbeddingValue,
    ) -> Result<()> {
        let mut state = self.state();
        if self.fail_insert_at == Some(state.inserts.len()) {
            return Err(ProvisionError::Sql("insert rejected".to_string()));
        }
        state.inserts.push((sql.to_string(), foreign_key, embedding));
        Ok(())
    }

    async fn close(&self) {
        self.state().closed = true;
    }
}

/// Hands out clones of one [`MemoryDatabase`] and counts connection attempts.
#[derive(Debug, Clone)]
pub(crate) struct MemoryConnector {
    pub database: MemoryDatabase,
    connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new(database: MemoryDatabase) -> Self {
        Self {
            database,
            connects: Arc::default(),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _request: &ProvisionRequest) -> Result<Box<dyn TargetDatabase>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.database.clone()))
    }
}

/// Records every call; `cat /etc/os-release` answers with the configured
/// content, any other script exits with `install_exit`.
#[derive(Debug, Clone)]
pub(crate) struct FakeRuntime {
    containers: Vec<String>,
    os_release: String,
    install_exit: i32,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeRuntime {
    pub fn new(containers: &[&str], os_release: &str) -> Self {
        Self {
            containers: containers.iter().map(|name| (*name).to_string()).collect(),
            os_release: os_release.to_string(),
            install_exit: 0,
            calls: Arc::default(),
        }
    }

    pub fn failing_install(mut self, exit_code: i32) -> Self {
        self.install_exit = exit_code;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_running(&self, name_filter: &str) -> Result<Vec<String>> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(format!("ps {name_filter}"));
        Ok(self
            .containers
            .iter()
            .filter(|name| name.contains(name_filter))
            .cloned()
            .collect())
    }

    async fn exec(&self, container: &str, script: &str) -> Result<CommandOutput> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(format!("exec {container}: {script}"));
        Ok(scripted_output(script, &self.os_release, self.install_exit))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeShell {
    os_release: String,
    install_exit: i32,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeShell {
    pub fn new(os_release: &str) -> Self {
        Self {
            os_release: os_release.to_string(),
            install_exit: 0,
            calls: Arc::default(),
        }
    }

    pub fn failing_install(mut self, exit_code: i32) -> Self {
        self.install_exit = exit_code;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl HostShell for FakeShell {
    async fn run(&self, script: &str) -> Result<CommandOutput> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(script.to_string());
        Ok(scripted_output(script, &self.os_release, self.install_exit))
    }
}

fn scripted_output(script: &str, os_release: &str, install_exit: i32) -> CommandOutput {
    if script == "cat /etc/os-release" {
        CommandOutput {
            exit_code: Some(0),
            output: os_release.to_string(),
        }
    } else {
        CommandOutput {
            exit_code: Some(install_exit),
            output: "make: *** [install] Error 1\n".to_string(),
        }
    }
}

/// Returns `[call index, fill, ...]` and records every input text.
#[derive(Debug, Clone)]
pub(crate) struct RecordingEmbedder {
    dimension: usize,
    returned_len: usize,
    fill: f32,
    fail_on: Option<String>,
    not_ready: bool,
    texts: Arc<Mutex<Vec<String>>>,
}

impl RecordingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            returned_len: dimension,
            fill: 0.0,
            fail_on: None,
            not_ready: false,
            texts: Arc::default(),
        }
    }

    /// Return vectors of the wrong length.
    pub fn returning_len(mut self, len: usize) -> Self {
        self.returned_len = len;
        self
    }

    /// Every value after the call index.
    pub fn filled_with(mut self, fill: f32) -> Self {
        self.fill = fill;
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.not_ready = true;
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().expect("texts lock poisoned").clone()
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn check_ready(&self) -> Result<()> {
        if self.not_ready {
            return Err(ProvisionError::Embedding("model is not available".to_string()));
        }
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail_on.as_deref() == Some(text) {
            return Err(ProvisionError::Embedding("provider unavailable".to_string()));
        }

        let mut texts = self.texts.lock().expect("texts lock poisoned");
        let mut embedding = vec![self.fill; self.returned_len];
        if let Some(first) = embedding.first_mut() {
            *first = texts.len() as f32;
        }
        texts.push(text.to_string());
        Ok(embedding)
    }
}

pub(crate) fn row(id: i64, fields: &[Option<&str>]) -> SourceRow {
    SourceRow {
        id,
        fields: fields.iter().map(|field| field.map(str::to_string)).collect(),
    }
}

pub(crate) fn products_request() -> ProvisionRequest {
    ProvisionRequest {
        docker_container_name: Some("pg".to_string()),
        url: "postgresql://localhost:5432/shop".to_string(),
        username: Some("shop".to_string()),
        password: Some("secret".to_string()),
        table_name: "products".to_string(),
        id_name: "id".to_string(),
        fields: vec!["name".to_string(), "description".to_string()],
    }
}

pub(crate) fn products_rows() -> Vec<SourceRow> {
    vec![
        row(1, &[Some("Widget"), Some("A small widget")]),
        row(2, &[Some("Gadget"), None]),
        row(3, &[None, Some("Unnamed thing")]),
    ]
}
