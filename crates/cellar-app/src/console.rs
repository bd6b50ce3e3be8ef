//! Headless wizard host: serves helper scripts without the full-screen UI
//! and asks prompts on stdin.

use anyhow::{Context, Result};
use cellar_tui::Reconciled;
use cellar_wizard::{
    ProcProbe, PromptKind, UserAnswer, WindowRegistry, WindowView, WizardServer, WizardWindow,
    bridge, generate_cookie,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::download::percent;
use crate::host::{Exit, Host, parse_answer};
use crate::publish::{Endpoint, Published};
use crate::views;

/// What the console shows for the front of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Front {
    Popup(String),
    Window {
        id: String,
        title: String,
        text: String,
        prompt: Option<PromptKind>,
        /// Progress rounded down to tens, so a download prints a handful of
        /// lines rather than one per chunk.
        progress: Option<u8>,
    },
}

fn progress_of(window: &WizardWindow) -> Option<u8> {
    let pct = match &window.view {
        WindowView::Progress { percent, .. } => *percent,
        WindowView::Download {
            received, total, ..
        } => percent(*received, *total),
        _ => None,
    };
    pct.map(|p| p / 10 * 10)
}

/// The popup if any, else the first window waiting on the user, else the
/// first window.
fn front(registry: &WindowRegistry) -> Option<Front> {
    if let Some(popup) = registry.popup() {
        return Some(Front::Popup(popup.message.clone()));
    }
    registry
        .windows()
        .find(|w| w.prompt().is_some())
        .or_else(|| registry.windows().next())
        .map(|w| Front::Window {
            id: w.id.clone(),
            title: w.view.title().to_owned(),
            text: w.view.text().to_owned(),
            prompt: w.prompt().cloned(),
            progress: progress_of(w),
        })
}

fn describe(front: &Front) -> String {
    let (id, title, text, prompt, progress) = match front {
        Front::Popup(message) => return format!("! {message}\n  [enter to dismiss]"),
        Front::Window {
            id,
            title,
            text,
            prompt,
            progress,
        } => (id, title, text, prompt, progress),
    };

    let mut out = if title.is_empty() {
        format!("[{id}] {text}")
    } else {
        format!("[{id}] {title}: {text}")
    };
    if let Some(p) = progress {
        out.push_str(&format!(" ({p}%)"));
    }
    match prompt {
        Some(PromptKind::Acknowledge) => out.push_str("\n  [enter to continue]"),
        Some(PromptKind::Question) => out.push_str("\n  [y/n]"),
        Some(PromptKind::Menu(items) | PromptKind::MenuNum(items)) => {
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("\n  {}) {item}", i + 1));
            }
        }
        Some(PromptKind::Text) => out.push_str("\n  [type a value, enter for the default]"),
        Some(PromptKind::Login) => out.push_str("\n  [login password]"),
        Some(PromptKind::Download) | None => {}
    }
    out
}

/// Apply one typed line to the front of the registry. Returns a complaint
/// to print when the line did not fit.
fn answer_line(host: &mut Host, line: &str) -> Option<String> {
    if host.registry().popup().is_some() {
        host.dismiss_popup();
        return None;
    }
    let window = host
        .registry()
        .windows()
        .find(|w| w.prompt().is_some())
        .or_else(|| host.registry().windows().next())?;
    let id = window.id.clone();

    if line.trim() == "/close" {
        host.cancel_window(&id);
        return None;
    }

    let kind = window.prompt()?.clone();
    let answer = match kind {
        PromptKind::Text => Some(UserAnswer::Text(views::text_answer(
            window,
            line.trim().to_owned(),
        ))),
        _ => parse_answer(&kind, line),
    };
    match answer {
        Some(answer) => {
            host.answer(&id, &answer);
            None
        }
        None => Some(format!("cannot answer [{id}] with {line:?}")),
    }
}

/// Serve until interrupted or a helper asks for a shutdown or restart.
pub(crate) async fn serve(config: &Config) -> Result<Exit> {
    let home = config.paths.home_dir();
    let cancel = CancellationToken::new();

    let cookie = generate_cookie();
    let server =
        WizardServer::bind(config.wizard.port_start, config.wizard.port_span, cookie.as_str())
            .await
            .context("failed to start the wizard server")?;
    let port = server.port();
    let _published = Published::new(&home, &Endpoint { port, cookie })?;
    let _cancel_on_exit = cancel.clone().drop_guard();
    println!("Setup Wizard listening on port {port}");

    let (bridge, mut inbox) = bridge();
    let serve_cancel = cancel.clone();
    let server_task = tokio::spawn(async move {
        if let Err(error) = server.serve(bridge, serve_cancel).await {
            warn!(error = %format!("{error:#}"), "wizard server stopped");
        }
    });

    let mut host = Host::new(cancel.clone());
    let mut shown: Reconciled<Option<Front>> = Reconciled::new();
    let mut stdin = stdin_lines();
    let mut stdin_open = true;

    let exit = loop {
        host.pump(&mut inbox);
        host.drain_downloads();
        host.reap(&ProcProbe);
        for notice in host.take_notices() {
            println!("-- {notice}");
        }
        if let Some(exit) = host.exit() {
            info!(?exit, "wizard requested exit");
            break exit;
        }

        shown.sync(
            || front(host.registry()),
            |front| {
                if let Some(front) = front {
                    println!("{}", describe(front));
                }
            },
        );

        tokio::select! {
            () = tokio::time::sleep(host.tick_period()) => {}
            line = stdin.recv(), if stdin_open => match line {
                Some(line) => {
                    if let Some(complaint) = answer_line(&mut host, &line) {
                        eprintln!("{complaint}");
                    }
                }
                None => stdin_open = false,
            },
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "failed to listen for ctrl-c");
                }
                break Exit::Quit;
            }
        }
    };

    cancel.cancel();
    host.shutdown();
    let _ = server_task.await;
    Ok(exit)
}

/// Lines typed on stdin, read on a detached thread. A blocking read there
/// must not hold up runtime shutdown once the host has exited.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    let spawned = std::thread::Builder::new()
        .name("cellar-stdin".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(%error, "stdin closed");
                        break;
                    }
                }
            }
        });
    if let Err(error) = spawned {
        warn!(%error, "failed to start the stdin reader");
    }
    rx
}
