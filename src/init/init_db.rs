use clap::Parser;
use tracing::info;
use bfabot_core::{Db, DEFAULT_DB_PATH};

/// Create the bfabot database and its tables.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the sqlite db.
    #[clap(long, env = "BFABOT_DB", default_value = DEFAULT_DB_PATH)]
    db: String,

    /// Also start week 1 with this name, if there is no week yet.
    #[clap(long)]
    first_week: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    // Create the database if it doesn’t exist yet; this also creates the tables.
    info!("Initialising db at {}...", args.db);
    let db = Db::open(&args.db).await.expect("Failed to open db");

    if let Some(name) = args.first_week {
        match db.latest_week().await.expect("Failed to query weeks") {
            Some(week) => info!("Week {} already exists, not starting a new one", week),
            None => {
                let (c, _) = db.start_new_week(None, &name).await.expect("Failed to start week 1");
                info!("Started week {}: {}", c.week, c.name);
            }
        }
    }

    // Merge everything into one db file.
    db.checkpoint().await.expect("Failed to merge WAL");
    db.close().await;
}
