use anyhow::Context;
use clap::{ArgAction, Parser};
use dotenvy::dotenv;
use follow_delta::app::{self, RunConfig};
use follow_delta::collector::Direction;
use follow_delta::twitter_client::TwitterClient;
use log::LevelFilter;
use std::env;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Generate the followship delta for this account
    #[arg(short, long)]
    user: String,

    /// Only go in the given direction
    #[arg(short, long, value_enum, default_value_t = Direction::Both)]
    direction: Direction,

    /// Directory holding one snapshot file per account
    #[arg(long, default_value = "./var/followship")]
    data_dir: PathBuf,

    /// Run the OAuth login flow and save the access token
    #[arg(short, long)]
    login: bool,

    /// Increase verbosity (may be repeated)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    dotenv().ok();

    // Exit quietly on ^C instead of dumping a panic trace
    ctrlc::set_handler(|| std::process::exit(1))?;

    let twitter_client_id =
        env::var("TWITTER_CLIENT_ID").context("TWITTER_CLIENT_ID is not set")?;
    let twitter_client_secret =
        env::var("TWITTER_CLIENT_SECRET").context("TWITTER_CLIENT_SECRET is not set")?;
    let mut twitter_client = TwitterClient::new(&twitter_client_id, &twitter_client_secret);

    if args.login {
        twitter_client.authorize().await?;
        twitter_client.save_access_token()?;
    } else {
        twitter_client
            .load_access_token()
            .context("no saved access token, run with --login first")?;
    }

    let config = RunConfig {
        account: args.user,
        direction: args.direction,
        data_dir: args.data_dir,
    };
    app::run(&config, &twitter_client).await
}
