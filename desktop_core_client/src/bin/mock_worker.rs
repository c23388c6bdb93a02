#[cfg(unix)]
mod worker {
    use clap::Parser;
    use desktop_core_client::mock_worker::MockWorker;
    use desktop_core_client::protocol::{Rectangle, ScreenData};
    use desktop_core_client::{ChannelAddress, ADDR_ENV};
    use std::time::Duration;
    use tracing_subscriber::EnvFilter;

    #[derive(Parser, Debug)]
    #[command(name = "mock_worker")]
    struct Args {
        /// Channel name or explicit socket path.
        #[arg(long, env = ADDR_ENV)]
        addr: Option<String>,

        #[arg(long, default_value_t = 2)]
        screens: u32,

        #[arg(long)]
        run_for_ms: Option<u64>,
    }

    fn screen(i: u32) -> ScreenData {
        let x = i32::try_from(i).unwrap_or(0) * 1920;
        ScreenData {
            device_id: format!("DISPLAY{}", i + 1),
            display_name: format!("Mock Display {}", i + 1),
            device_name: format!(r"\\.\DISPLAY{}", i + 1),
            h_monitor: i64::from(i) + 1,
            is_primary: i == 0,
            index: i32::try_from(i).unwrap_or(0),
            bounds: Some(Rectangle {
                x,
                y: 0,
                width: 1920,
                height: 1080,
            }),
            working_area: Some(Rectangle {
                x,
                y: 0,
                width: 1920,
                height: 1040,
            }),
        }
    }

    pub async fn run() -> anyhow::Result<()> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
        let args = Args::parse();

        let address = args
            .addr
            .map(ChannelAddress::new)
            .unwrap_or_else(ChannelAddress::well_known);
        let worker = MockWorker::spawn(&address, (0..args.screens).map(screen).collect()).await?;

        println!("mock_worker listening on {}", worker.socket_path().display());

        let run_for = async {
            match args.run_for_ms {
                Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = worker.wait_shut_down() => tracing::info!("shutdown requested by client"),
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
            _ = run_for => {}
        }

        worker.shutdown().await;
        Ok(())
    }
}

#[cfg(unix)]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    worker::run().await
}

#[cfg(not(unix))]
fn main() {
    eprintln!("mock_worker is only supported on unix platforms");
}
