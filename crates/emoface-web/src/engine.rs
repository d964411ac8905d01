use emoface_core::{EmotionBackend, Outcome};
use emoface_intake::IntakeError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Requests queued ahead of the engine thread before senders wait.
const ENGINE_QUEUE_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Analyze {
        path: PathBuf,
        reply: oneshot::Sender<Outcome>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode the stored image at `path` and classify its dominant emotion.
    pub async fn analyze(&self, path: PathBuf) -> Result<Outcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                path,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The backend (and its ONNX sessions) lives on that thread for the lifetime
/// of the server; requests are handled one at a time.
pub fn spawn_engine(
    mut backend: Box<dyn EmotionBackend + Send>,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(ENGINE_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("emoface-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze { path, reply } => {
                        let outcome = run_analyze(backend.as_mut(), &path);
                        let _ = reply.send(outcome);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

/// Load the image and run inference. Unreadable images become a failed
/// outcome rather than an error.
fn run_analyze(backend: &mut dyn EmotionBackend, path: &Path) -> Outcome {
    let image = match emoface_intake::load_image(path) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "upload could not be decoded");
            return Outcome::failed(client_diagnostic(path, &e));
        }
    };
    emoface_core::analyze(backend, &image)
}

/// Names the upload by file name only; server paths stay in the log.
fn client_diagnostic(path: &Path, err: &IntakeError) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    match err {
        IntakeError::Decode { reason, .. } => format!("Could not read image '{name}': {reason}"),
        IntakeError::NotFound(_) => format!("File '{name}' not found"),
        _ => format!("Could not read image '{name}'"),
    }
}
