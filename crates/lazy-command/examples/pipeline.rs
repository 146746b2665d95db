//! Pipes commands together and into a writer

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use lazy_command::{Config, Flags, PipeTarget, all, retry, sh};

#[derive(Parser)]
#[command(about = "Pipelines and combinators")]
struct Cli {
    #[command(flatten)]
    flags: Flags,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    lazy_command::init(Config::from_flags(&cli.flags))?;

    smol::block_on(async {
        let sorted = sh!("printf 'pear\\napple\\nfig\\n'")
            .pipe(sh!("sort"))?
            .pipe(sh!("head -n 2"))?
            .await?;
        println!("first two: {:?}", sorted.trimmed_stdout());

        sh!("echo straight to stdout")
            .pipe(PipeTarget::writer(smol::Unblock::new(std::io::stdout())))?
            .await?;

        let results = all([sh!("sleep 0.2; echo a"), sh!("sleep 0.1; echo b")]).await?;
        for result in &results {
            print!("{}", result.stdout());
        }

        let flaky = retry(3, Duration::from_millis(100))
            .run(lazy_command::cmd!("[ $((RANDOM % 2)) -eq 0 ]"))
            .await;
        println!("flaky command succeeded: {}", flaky.is_ok());
        Ok(())
    })
}
