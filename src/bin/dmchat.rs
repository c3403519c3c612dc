use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use dmchat::config::Config;
use dmchat::models::profile::Profile;
use dmchat::realtime::ChatEvent;
use dmchat::view::root::AUTH_HELP;
use dmchat::view::{
    AuthCommand, AuthView, ChatCommand, ChatView, Screen, ViewOutcome, select_screen,
};
use dmchat::{ChatSession, SqliteBackend};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("Loading...");
    let backend =
        Arc::new(SqliteBackend::connect(&config.database_url, config.event_buffer).await?);
    tracing::info!("Connected to {}", config.database_url);

    let auth = AuthView::new(backend.clone());
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let mut user: Option<Profile> = match &config.user {
        Some(username) => match auth.sign_in(username).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                println!("{}", e.report());
                None
            }
        },
        None => None,
    };

    loop {
        match select_screen(false, user.as_ref()) {
            Screen::Loading | Screen::Auth => match auth_screen(&auth, &mut input).await? {
                Some(profile) => user = Some(profile),
                None => break,
            },
            Screen::Chat => {
                let session = ChatSession::with_event_buffer(
                    backend.clone(),
                    user.clone(),
                    config.event_buffer,
                );
                match chat_screen(ChatView::new(session), &mut input).await? {
                    ViewOutcome::Logout => user = None,
                    ViewOutcome::Quit | ViewOutcome::Continue => break,
                }
            }
        }
    }

    Ok(())
}

async fn auth_screen(
    auth: &AuthView<SqliteBackend>,
    input: &mut Input,
) -> anyhow::Result<Option<Profile>> {
    println!("{}", AUTH_HELP);

    while let Some(line) = input.next_line().await? {
        let command = match AuthCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        let result = match command {
            AuthCommand::Quit => return Ok(None),
            AuthCommand::Help => {
                println!("{}", AUTH_HELP);
                continue;
            }
            AuthCommand::SignIn(username) => auth.sign_in(&username).await,
            AuthCommand::SignUp {
                username,
                display_name,
            } => auth.sign_up(&username, display_name).await,
        };

        match result {
            Ok(profile) => return Ok(Some(profile)),
            Err(e) => println!("{}", e.report()),
        }
    }

    Ok(None)
}

async fn chat_screen(
    mut view: ChatView<SqliteBackend>,
    input: &mut Input,
) -> anyhow::Result<ViewOutcome> {
    let mut updates = view.session().updates();
    view.mount().await;
    println!("{}", view.render_now().await);

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    view.unmount();
                    return Ok(ViewOutcome::Quit);
                };
                let command = match ChatCommand::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(message) => {
                        println!("{}", message);
                        continue;
                    }
                };
                match view.handle(command).await {
                    ViewOutcome::Continue => println!("{}", view.render_now().await),
                    outcome => {
                        view.unmount();
                        return Ok(outcome);
                    }
                }
            }
            event = updates.recv() => match event {
                Ok(ChatEvent::NewMessage { .. }) => println!("{}", view.render_now().await),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} chat updates", skipped);
                    println!("{}", view.render_now().await);
                }
                Err(RecvError::Closed) => {}
            }
        }
    }
}
