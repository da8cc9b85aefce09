//! Shared fixtures for conduit-core integration tests.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use conduit_core::actions::SlaveActions;
use conduit_core::config::ConnectionParams;
use conduit_core::context::AppContext;
use conduit_core::error::ConduitError;
use conduit_core::install::{InstallContext, InstallOutput};
use conduit_core::installed::InstalledComponentRecord;
use conduit_core::plugin::builtin::factory;
use conduit_core::plugin::{
    Adapter, Installable, PluginDescriptor, PluginInstance, PluginRegistry, PluginVars, Sender,
};
use conduit_core::types::{AdapterTriple, Category, ComponentPath};

// =============================================================================
// Environment
// =============================================================================

/// Isolated config and state directories.
pub struct TestEnv {
    _temp: TempDir,
    root: PathBuf,
    pub app: AppContext,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().to_path_buf();
        let app = AppContext::new(root.join("config"), root.join("state"));
        Self {
            _temp: temp,
            root,
            app,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write a manifest under the plugins directory.
    pub fn write_manifest(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.app.plugins_dir().join(relative);
        std::fs::create_dir_all(path.parent().expect("manifest has a parent"))
            .expect("Failed to create manifest directory");
        std::fs::write(&path, content).expect("Failed to write manifest");
        path
    }
}

pub fn version() -> semver::Version {
    semver::Version::new(1, 0, 0)
}

/// Record an installed component without going through the installer.
pub fn mark_installed(app: &AppContext, path: &ComponentPath, parameters: PluginVars) {
    let record = InstalledComponentRecord {
        component: path.key(),
        category: path.category(),
        installed_at: chrono::Utc::now(),
        version: version(),
        description: String::new(),
        author: String::new(),
        provider: "Local".to_string(),
        parameters,
        provider_parameters: PluginVars::new(),
        artifacts: Default::default(),
        adapter: match path.category() {
            Category::Adapter => AdapterTriple::from_id(path.id()),
            _ => None,
        },
    };
    app.installed_store()
        .record(record)
        .expect("Failed to record installed component");
}

// =============================================================================
// Recording adapter
// =============================================================================

/// Log of `product:user|param,param` lines, one per applied action.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("journal lock").clone()
}

struct RecordingAdapter {
    tag: String,
    journal: Journal,
    fail: bool,
}

impl Installable for RecordingAdapter {}

impl Adapter for RecordingAdapter {
    fn apply(&self, user: &str, params: &[String]) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("{} refused {}", self.tag, params.join(","));
        }
        self.journal
            .lock()
            .expect("journal lock")
            .push(format!("{}:{}|{}", self.tag, user, params.join(",")));
        Ok(())
    }
}

/// Register adapter `id` writing to `journal`. Setting the `fail` variable at
/// install time makes every application fail.
pub fn register_adapter(registry: &mut PluginRegistry, id: &str, journal: &Journal) {
    let tag = id.split('/').next().unwrap_or(id).to_string();
    let journal = Arc::clone(journal);
    registry
        .register(
            Category::Adapter,
            PluginDescriptor::new(id, version()),
            factory(move |ctx| {
                Ok(PluginInstance::Adapter(Box::new(RecordingAdapter {
                    tag: tag.clone(),
                    journal: Arc::clone(&journal),
                    fail: ctx.vars.contains("fail"),
                })))
            }),
        )
        .expect("Failed to register adapter");
}

// =============================================================================
// Recording sender
// =============================================================================

#[derive(Debug, Clone)]
pub struct Delivery {
    pub user: String,
    pub actions: SlaveActions,
    pub params: ConnectionParams,
}

pub type Outbox = Arc<Mutex<Vec<Delivery>>>;

pub fn outbox() -> Outbox {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn deliveries(outbox: &Outbox) -> Vec<Delivery> {
    outbox.lock().expect("outbox lock").clone()
}

struct RecordingSender {
    outbox: Outbox,
}

impl Sender for RecordingSender {
    fn send(
        &self,
        user: &str,
        actions: &SlaveActions,
        params: &ConnectionParams,
    ) -> Result<(), ConduitError> {
        if let Some(target) = params.get("fail") {
            return Err(ConduitError::Transport {
                target: target.clone(),
                message: "connection refused".to_string(),
            });
        }
        self.outbox.lock().expect("outbox lock").push(Delivery {
            user: user.to_string(),
            actions: actions.clone(),
            params: params.clone(),
        });
        Ok(())
    }
}

/// Register sender `id` that records deliveries in `outbox`. A client with a
/// `fail` parameter gets a transport error naming its value.
pub fn register_sender(registry: &mut PluginRegistry, id: &str, outbox: &Outbox) {
    let outbox = Arc::clone(outbox);
    registry
        .register(
            Category::Sender,
            PluginDescriptor::new(id, version()),
            factory(move |_| {
                Ok(PluginInstance::Sender(Box::new(RecordingSender {
                    outbox: Arc::clone(&outbox),
                })))
            }),
        )
        .expect("Failed to register sender");
}

// =============================================================================
// Installable that writes a file
// =============================================================================

struct TouchFile {
    name: String,
}

impl Installable for TouchFile {
    fn execute(&self, ctx: &InstallContext<'_>) -> anyhow::Result<InstallOutput> {
        let dir = ctx.environment.require_persistent_dir()?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.name);
        std::fs::write(&path, "touched\n")?;
        let mut output = InstallOutput::default();
        output.artifact(path);
        Ok(output)
    }
}

impl Adapter for TouchFile {
    fn apply(&self, _user: &str, _params: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Register an adapter whose installation writes `<persistent_dir>/<file>`.
pub fn register_touch_adapter(registry: &mut PluginRegistry, id: &str, file: &str) {
    let name = file.to_string();
    registry
        .register(
            Category::Adapter,
            PluginDescriptor::new(id, version()),
            factory(move |_| Ok(PluginInstance::Adapter(Box::new(TouchFile { name: name.clone() })))),
        )
        .expect("Failed to register adapter");
}

// =============================================================================
// Fake slave endpoint
// =============================================================================

/// HTTP server on an ephemeral port that answers one request.
pub struct FakeSlave {
    url: String,
    handle: Option<thread::JoinHandle<Option<String>>>,
}

impl FakeSlave {
    /// Answer with `status` and `body`.
    pub fn spawn(status: u16, body: &str) -> Self {
        Self::spawn_with_delay(status, body, Duration::ZERO)
    }

    /// Wait `delay` after reading the request before answering.
    pub fn spawn_with_delay(status: u16, body: &str, delay: Duration) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind fake slave");
        let port = listener.local_addr().expect("local addr").port();
        let body = body.to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().ok()?;
            let mut reader = BufReader::new(stream.try_clone().ok()?);
            let request_body = read_request(&mut reader)?;
            thread::sleep(delay);
            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {} Fake\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
            Some(request_body)
        });
        Self {
            url: format!("http://127.0.0.1:{}/cgi-bin/conduit-slave.cgi", port),
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the server thread and return the request body it received.
    pub fn request_body(&mut self) -> Option<String> {
        self.handle.take()?.join().ok().flatten()
    }
}

fn read_request<R: BufRead>(reader: &mut R) -> Option<String> {
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().ok()?;
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    String::from_utf8(body).ok()
}

pub fn params(pairs: &[(&str, &str)]) -> ConnectionParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
