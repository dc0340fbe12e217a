use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;
use anyhow::Result;

use super::{SpeechBackend, SpeechEvent, SpeechSession, SpeechStatus, UtteranceRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

type Reply<T> = Sender<Result<T, String>>;

enum SpeechCommand {
    Speak(UtteranceRequest, Reply<()>),
    Stop(Reply<()>),
    Pause(Reply<bool>),
    Resume(Reply<bool>),
    Shutdown,
}

/// Owns the speech engine on a dedicated thread. Platform engines are not
/// guaranteed to be `Send`, so the backend is built on that thread and
/// only commands cross over.
pub struct SpeechDriver {
    tx: Sender<SpeechCommand>,
    status: SpeechStatus,
    available: bool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechDriver {
    /// Starts the worker and waits until it has tried to build the engine.
    /// A missing engine is not an error here: the driver still starts and
    /// reports itself unavailable.
    pub fn spawn<F>(make_backend: F, status: SpeechStatus) -> Result<Self>
    where
        F: FnOnce(SpeechStatus) -> Result<Box<dyn SpeechBackend>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker_status = status.clone();
        let worker = std::thread::Builder::new()
            .name("speech".into())
            .spawn(move || run_worker(make_backend, worker_status, rx, ready_tx))?;

        let available = ready_rx.recv_timeout(REPLY_TIMEOUT).unwrap_or_else(|_| {
            tracing::warn!("Speech engine did not report readiness");
            false
        });

        Ok(Self {
            tx,
            status,
            available,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Whether a platform speech engine was created.
    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_speaking(&self) -> bool {
        self.status.is_speaking()
    }

    pub fn speak(&self, request: UtteranceRequest) -> Result<()> {
        self.request(|reply| SpeechCommand::Speak(request, reply))
    }

    pub fn stop(&self) -> Result<()> {
        self.request(SpeechCommand::Stop)
    }

    pub fn pause(&self) -> Result<bool> {
        self.request(SpeechCommand::Pause)
    }

    pub fn resume(&self) -> Result<bool> {
        self.request(SpeechCommand::Resume)
    }

    fn request<T>(&self, make: impl FnOnce(Reply<T>) -> SpeechCommand) -> Result<T> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| anyhow::anyhow!("Speech worker has stopped"))?;
        match reply_rx.recv_timeout(REPLY_TIMEOUT) {
            Ok(result) => result.map_err(|e| anyhow::anyhow!(e)),
            Err(_) => anyhow::bail!("Speech engine did not respond"),
        }
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(SpeechCommand::Shutdown);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.join().is_err() {
                tracing::error!("Speech worker panicked");
            }
        }
    }
}

impl Drop for SpeechDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<F>(make_backend: F, status: SpeechStatus, rx: Receiver<SpeechCommand>, ready: Sender<bool>)
where
    F: FnOnce(SpeechStatus) -> Result<Box<dyn SpeechBackend>>,
{
    let backend = match make_backend(status.clone()) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Speech engine unavailable: {}", e);
            let _ = ready.send(false);
            status.notify(SpeechEvent::Error { message: format!("Text-to-speech not supported: {}", e) });
            drain_unavailable(&rx, &e.to_string());
            return;
        }
    };
    let _ = ready.send(true);
    tracing::info!("Speech worker started");

    let mut session = SpeechSession::new(backend, status);
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(SpeechCommand::Speak(request, reply)) => {
                let _ = reply.send(session.speak(request).map_err(|e| e.to_string()));
            }
            Ok(SpeechCommand::Stop(reply)) => {
                let _ = reply.send(session.stop().map_err(|e| e.to_string()));
            }
            Ok(SpeechCommand::Pause(reply)) => {
                let _ = reply.send(session.pause().map_err(|e| e.to_string()));
            }
            Ok(SpeechCommand::Resume(reply)) => {
                let _ = reply.send(session.resume().map_err(|e| e.to_string()));
            }
            Ok(SpeechCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => session.poll(),
        }
    }

    if let Err(e) = session.stop() {
        tracing::warn!("Failed to stop speech on shutdown: {}", e);
    }
    tracing::info!("Speech worker stopped");
}

fn drain_unavailable(rx: &Receiver<SpeechCommand>, reason: &str) {
    let message = format!("Text-to-speech not supported: {}", reason);
    while let Ok(cmd) = rx.recv() {
        match cmd {
            SpeechCommand::Speak(_, reply) | SpeechCommand::Stop(reply) => {
                let _ = reply.send(Err(message.clone()));
            }
            SpeechCommand::Pause(reply) | SpeechCommand::Resume(reply) => {
                let _ = reply.send(Err(message.clone()));
            }
            SpeechCommand::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::tests::FakeBackend;

    #[test]
    fn commands_reach_the_backend_in_order() {
        let backend = FakeBackend::default();
        let handle = backend.clone();
        let driver = SpeechDriver::spawn(
            move |_| Ok(Box::new(handle) as Box<dyn SpeechBackend>),
            SpeechStatus::silent(),
        )
        .unwrap();
        assert!(driver.is_available());

        driver.speak(UtteranceRequest::new("one")).unwrap();
        assert!(driver.is_speaking());
        driver.speak(UtteranceRequest::new("two")).unwrap();
        driver.stop().unwrap();
        assert!(!driver.is_speaking());
        driver.shutdown();

        let calls = backend.calls();
        assert_eq!(&calls[..5], &["cancel", "speak:one", "cancel", "speak:two", "cancel"]);
    }

    #[test]
    fn unavailable_engine_reports_errors_instead_of_panicking() {
        let driver = SpeechDriver::spawn(
            |_| anyhow::bail!("no speech dispatcher"),
            SpeechStatus::silent(),
        )
        .unwrap();
        assert!(!driver.is_available());

        let err = driver.speak(UtteranceRequest::new("hello")).unwrap_err();
        assert!(err.to_string().contains("no speech dispatcher"));
        assert!(driver.pause().is_err());
    }
}
