//! Notification delivery

use std::process::Command;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::AlertError;

/// Delivers a dispatched alert; must return without waiting for delivery
pub trait Notifier: Send + Sync {
    fn notify(&self, message: String);
}

/// Blocking speech output
pub trait Speaker: Send + Sync {
    fn speak(&self, message: &str) -> Result<(), AlertError>;
}

/// Runs an external text-to-speech program with the message as last argument
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, message: &str) -> Result<(), AlertError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(message)
            .status()
            .map_err(|e| AlertError::Speech(format!("{}: {}", self.program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(AlertError::Speech(format!("{} exited with {}", self.program, status)))
        }
    }
}

/// Writes alerts to the log instead of speaking them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, message: &str) -> Result<(), AlertError> {
        info!("ALERT: {}", message);
        Ok(())
    }
}

/// Speaks each alert on its own detached task.
///
/// Tasks are never joined or cancelled; a message that is still being spoken
/// when the next one is dispatched overlaps with it.
pub struct SpeechNotifier {
    speaker: Arc<dyn Speaker>,
    handle: Handle,
}

impl SpeechNotifier {
    /// Bind to the current tokio runtime
    pub fn new(speaker: Arc<dyn Speaker>) -> Result<Self, AlertError> {
        let handle = Handle::try_current().map_err(|_| AlertError::NoRuntime)?;
        Ok(Self { speaker, handle })
    }
}

impl Notifier for SpeechNotifier {
    fn notify(&self, message: String) {
        let speaker = Arc::clone(&self.speaker);
        debug!("Spawning speech task for: {}", message);
        self.handle.spawn_blocking(move || {
            if let Err(e) = speaker.speak(&message) {
                warn!("Alert speech failed: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ChannelSpeaker(mpsc::UnboundedSender<String>);

    impl Speaker for ChannelSpeaker {
        fn speak(&self, message: &str) -> Result<(), AlertError> {
            self.0
                .send(message.to_string())
                .map_err(|e| AlertError::Speech(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_speech_runs_on_background_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = SpeechNotifier::new(Arc::new(ChannelSpeaker(tx))).unwrap();

        notifier.notify("Detected sign: STOP".to_string());
        assert_eq!(rx.recv().await.as_deref(), Some("Detected sign: STOP"));
    }

    #[test]
    fn test_requires_runtime() {
        assert!(matches!(
            SpeechNotifier::new(Arc::new(LogSpeaker)),
            Err(AlertError::NoRuntime)
        ));
    }

    #[test]
    fn test_missing_program_is_speech_error() {
        let speaker = CommandSpeaker::new("/nonexistent/tts-program", vec![]);
        assert!(matches!(speaker.speak("hello"), Err(AlertError::Speech(_))));
        assert!(LogSpeaker.speak("hello").is_ok());
    }
}
