use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Text-to-speech through an external program (`espeak`, `say`).
///
/// Each utterance runs on its own task; a shared turn lock keeps them
/// from talking over each other and preserves their order.
#[derive(Clone)]
pub struct Speaker {
    command: Option<String>,
    turn: Arc<Mutex<()>>,
}

impl Speaker {
    /// An empty command mutes the speaker.
    pub fn new(command: &str) -> Self {
        let command = command.trim();
        Self {
            command: (!command.is_empty()).then(|| command.to_string()),
            turn: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_muted(&self) -> bool {
        self.command.is_none()
    }

    /// Queue `text` for speaking. Must be called from within the runtime.
    pub fn say(&self, text: &str) {
        let Some(program) = self.command.clone() else {
            return;
        };
        let text = speakable(text);
        if text.trim().is_empty() {
            return;
        }

        let turn = self.turn.clone();
        tokio::spawn(async move {
            let _turn = turn.lock().await;
            let status = Command::new(&program)
                .arg(&text)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(status) if !status.success() => {
                    tracing::debug!(program = %program, %status, "speech command failed")
                }
                Err(e) => tracing::warn!(program = %program, error = %e, "could not run speech command"),
                Ok(_) => {}
            }
        });
    }
}

/// Strip markdown emphasis so it is not read aloud.
pub fn speakable(text: &str) -> String {
    text.replace('*', "")
}
