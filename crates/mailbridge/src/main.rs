//! `mailbridge` - terminal front end for the mailbridge backend.
//!
//! Logs in with Google or Microsoft through the backend's popup OAuth flow
//! (the popup being the system browser) and sends mail on the user's behalf.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod browser;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mailbridge_core::{
    ClientConfig, HandshakeController, HandshakeEvent, HandshakePhase, MailApi, MessageChannel,
    Navigation, NavigationGuard, OutgoingMail, Provider, Route, SessionMarker, SessionStore,
    WindowHost, WindowMessage,
};
use mailbridge_transport::ApiClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use browser::SystemBrowser;

#[derive(Parser)]
#[command(name = "mailbridge")]
#[command(version)]
#[command(about = "Log in with Google or Microsoft and send mail through the mailbridge backend")]
#[command(
    after_help = "The backend session cookie is kept in memory only. A login lasts for the \
                  process that made it, so `status` and `send` in a later run can only restore \
                  it if the backend still recognises this client. Use `send --login` to log in \
                  and send in one run."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend API base address (overrides config and MAILBRIDGE_API_URL)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show login state, trying to restore the previous session
    ///
    /// Restoring needs a backend session this process can reach; the cookie
    /// from an earlier run is not kept.
    Status,
    /// Log in with a provider
    Login {
        /// google or microsoft
        #[arg(value_parser = parse_provider)]
        provider: Provider,
    },
    /// Log out from a provider
    Logout {
        /// google or microsoft
        #[arg(value_parser = parse_provider)]
        provider: Provider,
    },
    /// Send a plain-text email through a provider
    Send {
        /// google or microsoft
        #[arg(value_parser = parse_provider)]
        provider: Provider,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Subject line
        #[arg(long, default_value = "")]
        subject: String,

        /// Message body
        #[arg(long, default_value = "")]
        body: String,

        /// Log in first, in this same session
        #[arg(long)]
        login: bool,
    },
}

fn parse_provider(s: &str) -> Result<Provider, String> {
    s.parse().map_err(|e: mailbridge_core::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailbridge=debug,mailbridge_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load().await.context("Failed to load config")?;
    config.apply_api_url_override(cli.api_url);
    info!(api = %config.api_base_url, "Starting mailbridge");

    let client = ApiClient::new(&config.api_base_url).context("Invalid backend address")?;
    let store = SessionStore::new(client.clone(), SessionMarker::default_location().await);

    let result = run(cli.command, &store, &config, client).await;
    store.marker().flush().await;
    result
}

async fn run(
    command: Commands,
    store: &SessionStore,
    config: &ClientConfig,
    client: ApiClient,
) -> Result<()> {
    match command {
        Commands::Status => status(store).await,
        Commands::Login { provider } => login(store, config, provider).await,
        Commands::Logout { provider } => {
            store.logout(provider).await;
            println!("Logged out from {provider}");
            Ok(())
        }
        Commands::Send {
            provider,
            to,
            subject,
            body,
            login: login_first,
        } => {
            if login_first {
                login(store, config, provider).await?;
            }

            let guard = NavigationGuard::new(store.clone());
            if guard.before_each(&Route::protected("compose")).await != Navigation::Proceed {
                bail!("Not logged in; run with --login or log in first");
            }

            let mail = OutgoingMail::new(to).subject(subject).body(body);
            let receipt = MailApi::new(client).send(provider, &mail).await?;
            println!("Sent via {provider}");
            if let Some(data) = receipt.data {
                println!("{}", serde_json::to_string_pretty(&data)?);
            }
            Ok(())
        }
    }
}

async fn status(store: &SessionStore) -> Result<()> {
    if store.marker().is_set() && !store.restore_last().await {
        println!("Previous session could not be restored");
    }

    for provider in Provider::ALL {
        match store.user_info(provider) {
            Some(user) => println!(
                "{provider}: logged in as {}",
                user.email().or_else(|| user.name()).unwrap_or("unknown user")
            ),
            None => println!("{provider}: logged out"),
        }
    }
    Ok(())
}

async fn login(store: &SessionStore, config: &ClientConfig, provider: Provider) -> Result<()> {
    let browser = Arc::new(SystemBrowser::default());
    let channel = MessageChannel::new();
    let (controller, mut events) = HandshakeController::new(
        provider,
        store.clone(),
        Arc::clone(&browser) as Arc<dyn WindowHost>,
        config.popup_size(),
    );
    let _active = controller.activate(&channel)?;

    if controller.login().await? == HandshakePhase::PopupOpen {
        let window = browser
            .last_window()
            .context("Browser window was not recorded")?;

        println!("Complete the {provider} login in your browser, then paste the result message here.");
        println!("End input (Ctrl-D) to give up.");
        let read_result = async {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while controller.phase() == HandshakePhase::PopupOpen {
                let Some(line) = lines.next_line().await? else {
                    browser.abandon_last();
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str(line) {
                    Ok(data) => channel.post(&WindowMessage::from_window(window, data)),
                    Err(e) => eprintln!("Not a JSON message: {e}"),
                }
            }
            Ok::<_, std::io::Error>(())
        };

        let (read, ()) = tokio::join!(
            read_result,
            controller.watch_popup(config.popup_poll_interval())
        );
        read?;
    }

    match events.try_recv() {
        Ok(event) => describe(event),
        Err(_) => bail!("Login abandoned"),
    }
}

fn describe(event: HandshakeEvent) -> Result<()> {
    match event {
        HandshakeEvent::LoggedIn(user) => {
            println!(
                "Logged in as {}",
                user.email().or_else(|| user.name()).unwrap_or("unknown user")
            );
            Ok(())
        }
        HandshakeEvent::LoginFailed(reason) => bail!("Login failed: {reason}"),
        HandshakeEvent::UrlUnavailable => bail!("Could not get authorization URL"),
        HandshakeEvent::PopupBlocked => bail!("Could not open the browser"),
        HandshakeEvent::PopupAbandoned => bail!("Login window closed without a result"),
        HandshakeEvent::LoggedOut => {
            println!("Logged out");
            Ok(())
        }
    }
}
