//! Shared fixtures: an in-process fake BIRD control socket and a status
//! command backed by a file.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

pub const GREETING: &str = "0001 BIRD 2.0.12 ready.\n";

/// How the fake daemon answers commands.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answer `enable`/`disable` the way BIRD does on success.
    Confirm,
    /// Send this raw text after every command.
    Reply(String),
    /// Send this raw text instead of the greeting, then close.
    Greeting(String),
    /// Greet, read the command, never answer.
    Silent,
}

pub struct FakeBird {
    pub path: PathBuf,
    pub commands: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeBird {
    pub async fn start(path: &Path, behavior: Behavior) -> Self {
        let listener = UnixListener::bind(path).expect("bind fake bird socket");
        let commands = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&commands);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let behavior = behavior.clone();
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let _ = handle_connection(stream, behavior, recorded).await;
                });
            }
        });
        Self {
            path: path.to_path_buf(),
            commands,
            handle,
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for FakeBird {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_connection(
    stream: UnixStream,
    behavior: Behavior,
    recorded: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    if let Behavior::Greeting(text) = &behavior {
        writer.write_all(text.as_bytes()).await?;
        return Ok(());
    }
    writer.write_all(GREETING.as_bytes()).await?;

    let mut line = String::new();
    while reader.read_line(&mut line).await? > 0 {
        let command = line.trim_end().to_string();
        recorded.lock().unwrap().push(command.clone());

        let reply = match &behavior {
            Behavior::Confirm => confirm(&command),
            Behavior::Reply(text) => text.clone(),
            Behavior::Silent => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }
            Behavior::Greeting(_) => unreachable!(),
        };
        writer.write_all(reply.as_bytes()).await?;
        line.clear();
    }
    Ok(())
}

fn confirm(command: &str) -> String {
    match command.split_once(' ') {
        Some(("enable", proto)) => format!("0011-{proto}: enabled\n0000 \n"),
        Some(("disable", proto)) => format!("0009-{proto}: disabled\n0000 \n"),
        _ => "9001 Parse error\n".to_string(),
    }
}

/// Status command that prints `file`, failing (non-zero exit) when the file
/// does not exist.
pub fn cat_command(file: &Path) -> Vec<String> {
    vec!["cat".to_string(), file.display().to_string()]
}

pub const PRIMARY_JSON: &str = r#"{"BackendState":"Running","Self":{"HostName":"edge-1","PrimaryRoutes":["10.20.0.0/16"]}}"#;
pub const SECONDARY_JSON: &str = r#"{"BackendState":"Running","Self":{"HostName":"edge-1"}}"#;
