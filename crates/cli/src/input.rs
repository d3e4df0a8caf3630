//! Line input from the terminal.
//!
//! Stdin is read on its own task so the interactive loop can wait for a line
//! and for Ctrl-C at the same time.

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Spawn the stdin reader. The channel closes at end of input.
pub fn spawn_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut lines = BufReader::new(io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line.trim().to_string()).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("stdin read error: {e}");
                    break;
                }
            }
        }
    });

    rx
}
