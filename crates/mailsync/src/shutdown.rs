//! Escalating signal handling
//!
//! The first SIGINT, SIGTERM or SIGQUIT cancels every account and lets the
//! main task collect the results. A second one exits immediately.

use std::io;
use std::process;
use std::sync::Arc;

use mailsync_core::AccountManager;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

struct Signals {
    #[cfg(unix)]
    term: Signal,
    #[cfg(unix)]
    quit: Signal,
}

impl Signals {
    fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            term: signal(SignalKind::terminate())?,
            #[cfg(unix)]
            quit: signal(SignalKind::quit())?,
        })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = self.term.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT"
    }
}

/// Watch for termination signals in the background
pub fn spawn(manager: Arc<AccountManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut signals = match Signals::new() {
            Ok(signals) => signals,
            Err(err) => {
                warn!("Failed to install signal handlers: {}", err);
                return;
            }
        };

        let name = signals.recv().await;
        info!(signal = name, "Shutting down, send again to force exit");
        manager.shutdown();

        let name = signals.recv().await;
        warn!(signal = name, "Forced exit");
        process::exit(1);
    })
}
