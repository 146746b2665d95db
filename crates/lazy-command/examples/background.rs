//! Starts a long-running process, streams its output, then stops it

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use futures::io::AsyncWriteExt;
use lazy_command::{Config, Flags, sh, sleep};

#[derive(Parser)]
#[command(about = "Background processes")]
struct Cli {
    #[command(flatten)]
    flags: Flags,

    /// Seconds to let the ticker run
    #[arg(long, default_value_t = 1)]
    seconds: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    lazy_command::init(Config::from_flags(&cli.flags))?;

    smol::block_on(async {
        let ticker = sh!("while true; do date +%T; sleep 0.25; done").no_throw();
        let lines = ticker.stdout();
        smol::spawn(async move {
            while let Ok(chunk) = lines.recv().await {
                print!("tick {}", String::from_utf8_lossy(&chunk));
            }
        })
        .detach();

        sleep(Duration::from_secs(cli.seconds)).await;
        ticker.kill().await?;
        let result = ticker.await?;
        println!("ticker stopped: {:?}", result.signal());

        let upper = sh!("tr a-z A-Z");
        if let Some(mut stdin) = upper.stdin() {
            stdin.write_all(b"written from rust\n").await?;
        }
        print!("{}", upper.await?.stdout());
        Ok(())
    })
}
