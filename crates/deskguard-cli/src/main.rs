use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "deskguard", about = "DeskGuard desk security monitor CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show lock state, identity, options and recent log lines
    Status,
    /// Describe the current scene (only while unlocked)
    Analyze,
    /// Turn an overlay or voice option on or off
    Option {
        name: OptionName,
        state: Switch,
    },
    /// Switch to a still image and identify whoever is in it
    Load {
        path: PathBuf,
    },
    /// Switch back to the live camera
    Camera,
    /// Save the latest overlay frame as PNG
    Snapshot {
        path: PathBuf,
    },
    /// Print the event log path
    Logs {
        /// Also print the last N log rows
        #[arg(long)]
        tail: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OptionName {
    IdentityBoxes,
    ObjectBoxes,
    Voice,
}

impl OptionName {
    fn wire_name(self) -> &'static str {
        match self {
            OptionName::IdentityBoxes => "identity_boxes",
            OptionName::ObjectBoxes => "object_boxes",
            OptionName::Voice => "voice",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[zbus::proxy(
    interface = "io.deskguard.Monitor1",
    default_service = "io.deskguard.Monitor1",
    default_path = "/io/deskguard/Monitor1"
)]
trait Monitor {
    async fn status(&self) -> zbus::Result<String>;
    async fn set_option(&self, name: &str, enabled: bool) -> zbus::Result<bool>;
    async fn analyze(&self) -> zbus::Result<String>;
    async fn load_image(&self, path: &str) -> zbus::Result<bool>;
    async fn use_camera(&self) -> zbus::Result<bool>;
    async fn snapshot(&self, path: &str) -> zbus::Result<bool>;
    async fn log_path(&self) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    let monitor = MonitorProxy::new(&connection)
        .await
        .context("failed to reach deskguardd")?;

    match cli.command {
        Commands::Status => {
            let status = monitor.status().await.context("is deskguardd running?")?;
            let value: serde_json::Value = serde_json::from_str(&status)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Analyze => match monitor.analyze().await?.as_str() {
            "started" => println!("Analysis started; the result will appear in the log."),
            "locked" => bail!("system is locked"),
            "busy" => println!("An analysis is already running."),
            "unavailable" => bail!("vision service not connected"),
            other => bail!("unexpected reply: {other}"),
        },
        Commands::Option { name, state } => {
            let enabled = matches!(state, Switch::On);
            monitor.set_option(name.wire_name(), enabled).await?;
            println!("{}: {}", name.wire_name(), if enabled { "on" } else { "off" });
        }
        Commands::Load { path } => {
            let path = std::fs::canonicalize(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            if !monitor.load_image(&path.to_string_lossy()).await? {
                bail!("image not loaded (system locked or unreadable image)");
            }
            println!("Loaded {}", path.display());
        }
        Commands::Camera => {
            if !monitor.use_camera().await? {
                bail!("system is locked");
            }
            println!("Switched to live camera.");
        }
        Commands::Snapshot { path } => {
            let path = absolute(&path)?;
            if !monitor.snapshot(&path.to_string_lossy()).await? {
                bail!("no frame saved (nothing rendered yet or path not writable)");
            }
            println!("Saved {}", path.display());
        }
        Commands::Logs { tail } => {
            let log_path = monitor.log_path().await?;
            println!("{log_path}");
            if let Some(count) = tail {
                let text = std::fs::read_to_string(&log_path)
                    .with_context(|| format!("cannot read {log_path}"))?;
                for line in tail_lines(&text, count) {
                    println!("{line}");
                }
            }
        }
    }

    Ok(())
}

/// The daemon resolves paths against its own working directory.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Last `count` data rows, skipping the CSV header.
fn tail_lines(text: &str, count: usize) -> Vec<&str> {
    let rows: Vec<&str> = text.lines().skip(1).filter(|l| !l.is_empty()).collect();
    rows[rows.len().saturating_sub(count)..].to_vec()
}
