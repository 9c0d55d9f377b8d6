use std::sync::Arc;

use chat_session_client::{
    ClientConfig, LogNotifier, Navigator, SessionDeps, SessionEvent, SessionHandle, SessionRunner,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// "Reloading the page" in a terminal means starting the session over.
struct RestartNavigator(mpsc::UnboundedSender<()>);

impl Navigator for RestartNavigator {
    fn reload(&self) {
        let _ = self.0.send(());
    }
}

enum Input {
    Text(String),
    Auto,
    Manual,
    Choose(usize),
    Refresh,
    Reload,
    Focus,
    State,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix(':') else {
        return Some(Input::Text(line.to_string()));
    };
    let mut parts = command.split_whitespace();
    let input = match parts.next().unwrap_or("") {
        "auto" => Input::Auto,
        "manual" => Input::Manual,
        "choose" => Input::Choose(parts.next()?.parse().ok()?),
        "refresh" => Input::Refresh,
        "reload" => Input::Reload,
        "focus" => Input::Focus,
        "state" => Input::State,
        "quit" | "q" => Input::Quit,
        _ => Input::Help,
    };
    Some(input)
}

const HELP: &str = "commands: :auto :manual :choose <n> :refresh :reload :focus :state :quit";

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::MessagesReplaced(messages) => {
            println!("── {} message(s) ──", messages.len());
            for m in messages {
                println!("[{} {}] {}: {}", m.date, m.timestamp, m.username, m.content);
            }
        }
        SessionEvent::MessageReceived(m) => {
            println!("[{} {}] {}: {}", m.date, m.timestamp, m.username, m.content);
            for file in m.files.iter().flatten() {
                println!("    attachment: {}", file.name.as_deref().unwrap_or(&file.url));
            }
        }
        SessionEvent::ChoicesChanged { options, strict } if !options.is_empty() => {
            let list: Vec<String> =
                options.iter().enumerate().map(|(i, o)| format!("{}) {o}", i + 1)).collect();
            let hint = if *strict { " (pick one)" } else { "" };
            println!("choices{hint}: {}", list.join("  "));
        }
        SessionEvent::ModeChanged { auto } => {
            println!("mode: {}", if *auto { "auto" } else { "manual" });
        }
        SessionEvent::TypingChanged(Some(text)) => println!("… {text}"),
        SessionEvent::TimerExpired => println!("session expired, type :reload to start over"),
        SessionEvent::ConnectionChanged(state) => info!(?state, "Connection state changed"),
        _ => {}
    }
}

fn start(config: &ClientConfig, reload_tx: &mpsc::UnboundedSender<()>) -> anyhow::Result<SessionHandle> {
    let deps = SessionDeps::http(
        config,
        Arc::new(LogNotifier),
        Arc::new(RestartNavigator(reload_tx.clone())),
    )?;
    let (handle, _task) = SessionRunner::spawn(config.clone(), deps)?;

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event);
        }
    });
    Ok(handle)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_session_client=debug,chat_session=debug".into()),
        )
        .init();

    let config = ClientConfig::from_env()?;
    info!(origin = %config.origin, locale = config.locale.code(), "Starting chat session");

    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    let mut handle = start(&config, &reload_tx)?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(input) = parse_input(&line) else { continue };
                let result = match input {
                    Input::Text(text) => handle.send_message(text).await,
                    Input::Auto => handle.toggle_chat_mode(true).await,
                    Input::Manual => handle.toggle_chat_mode(false).await,
                    Input::Choose(n) => {
                        let snapshot = handle.snapshot().await?;
                        match n.checked_sub(1).and_then(|i| snapshot.choice_options.get(i)) {
                            Some(option) => handle.handle_choice_click(option.clone()).await,
                            None => {
                                println!("no choice #{n}");
                                Ok(())
                            }
                        }
                    }
                    Input::Refresh => handle.refresh_chat().await,
                    Input::Reload => handle.reload_page().await,
                    Input::Focus => handle.focus().await,
                    Input::State => {
                        let snapshot = handle.snapshot().await?;
                        println!("{}", serde_json::to_string_pretty(&snapshot)?);
                        Ok(())
                    }
                    Input::Help => {
                        println!("{HELP}");
                        Ok(())
                    }
                    Input::Quit => break,
                };
                if let Err(e) = result {
                    warn!("Command failed: {e}");
                }
            }
            Some(()) = reload_rx.recv() => {
                info!("Restarting session");
                handle.shutdown().await;
                handle = start(&config, &reload_tx)?;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
