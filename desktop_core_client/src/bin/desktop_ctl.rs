use anyhow::Context;
use clap::{Parser, Subcommand};
use desktop_core_client::{
    ChannelAddress, ClientConfig, DesktopCoreClient, Snapshot, WallpaperType, ADDR_ENV,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "desktop-ctl")]
struct Args {
    /// Channel name or explicit socket path / pipe name.
    #[arg(long, global = true, env = ADDR_ENV)]
    addr: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the active wallpapers.
    List {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the active wallpapers every time they change, until interrupted.
    Watch,
    /// Activate a wallpaper on one monitor.
    Set {
        info_folder_path: String,
        monitor: String,
    },
    /// Close running wallpapers.
    Close {
        #[command(subcommand)]
        target: CloseTarget,

        /// Kill the rendering process instead of asking it to stop.
        #[arg(long, global = true, default_value_t = false)]
        terminate: bool,
    },
    /// Forward a JSON message to a running wallpaper.
    Send {
        info_folder_path: String,
        message: String,

        #[arg(long)]
        monitor: Option<String>,
    },
    /// Ask the worker to exit.
    Shutdown,
}

#[derive(Subcommand, Debug)]
enum CloseTarget {
    /// Every active wallpaper.
    All,
    /// Every wallpaper of one type, e.g. `video-stream`.
    Category { category: WallpaperType },
    /// One wallpaper by its library folder.
    Library { info_folder_path: String },
    /// Whatever runs on one monitor.
    Monitor { monitor: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(addr) = args.addr {
        config = config.with_address(ChannelAddress::new(addr));
    }

    let client = DesktopCoreClient::connect(&config)
        .await
        .with_context(|| format!("failed to reach desktop core at {}", config.address))?;

    let result = run(&client, args.command).await;
    client.close().await;
    result
}

async fn run(client: &DesktopCoreClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List { json } => {
            let snapshot = client.wallpapers();
            if json {
                println!("{}", serde_json::to_string_pretty(&*snapshot)?);
            } else {
                print_table(&snapshot);
            }
        }
        Command::Watch => {
            let mut changes = client.subscribe();
            print_table(&client.wallpapers());
            loop {
                tokio::select! {
                    biased;
                    _ = tokio::signal::ctrl_c() => break,
                    change = changes.recv() => match change {
                        Ok(_) | Err(RecvError::Lagged(_)) => {
                            println!();
                            print_table(&client.wallpapers());
                        }
                        Err(RecvError::Closed) => break,
                    },
                    reason = client.stopped() => {
                        eprintln!("subscriber stopped: {reason:?}");
                        break;
                    }
                }
            }
        }
        Command::Set {
            info_folder_path,
            monitor,
        } => client.set_wallpaper(&info_folder_path, &monitor).await?,
        Command::Close { target, terminate } => match target {
            CloseTarget::All => client.close_all(terminate).await?,
            CloseTarget::Category { category } => {
                client.close_by_category(category, terminate).await?
            }
            CloseTarget::Library { info_folder_path } => {
                client
                    .close_by_library_entry(&info_folder_path, terminate)
                    .await?
            }
            CloseTarget::Monitor { monitor } => client.close_by_monitor(&monitor, terminate).await?,
        },
        Command::Send {
            info_folder_path,
            message,
            monitor,
        } => {
            let message: serde_json::Value =
                serde_json::from_str(&message).context("message must be valid JSON")?;
            client
                .send_message(&info_folder_path, monitor.as_deref(), &message)
                .await?;
        }
        Command::Shutdown => client.shutdown().await?,
    }
    Ok(())
}

fn print_table(snapshot: &Snapshot) {
    if snapshot.is_empty() {
        println!("no active wallpapers");
        return;
    }
    for wp in snapshot.iter() {
        let d = &wp.display;
        println!(
            "{:<12} {:<4} {}x{}  {}",
            d.device_id,
            if d.is_primary { "*" } else { "" },
            d.bounds.width,
            d.bounds.height,
            wp.info_folder_path
        );
    }
}
