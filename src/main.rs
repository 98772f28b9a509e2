// src/main.rs

use shellexec::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(rc) => std::process::exit(rc),
        Err(err) => {
            eprintln!("shellexec error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
