//! Runs a few commands the way a deployment script would
//!
//! ```text
//! cargo run --example basic -- --quiet
//! ```

use anyhow::Result;
use clap::Parser;
use lazy_command::{Config, Flags, sh};

#[derive(Parser)]
#[command(about = "Basic command execution")]
struct Cli {
    #[command(flatten)]
    flags: Flags,

    /// Directory to create
    #[arg(long, default_value = "/tmp/lazy command demo")]
    dir: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    lazy_command::init(Config::from_flags(&cli.flags))?;

    smol::block_on(async {
        sh!("mkdir -p " {&cli.dir}).await?;
        sh!("echo 'hello from' " {&cli.dir} " > " {format!("{}/greeting", cli.dir)}).await?;

        let files = sh!("ls " {&cli.dir}).await?;
        println!("created: {}", files.trimmed_stdout());

        let status = sh!("exit 3").no_throw().await?;
        println!("exit code was {:?}", status.exit_code());

        sh!("rm -rf " {&cli.dir}).await?;
        Ok(())
    })
}
