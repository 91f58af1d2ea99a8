mod commands;
mod config;
mod core;
mod events;

use std::sync::Arc;
use clap::Parser;
use dotenv::dotenv;
use once_cell::sync::OnceCell;
use poise::serenity_prelude as ser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use bfabot_core::Db;
use crate::commands::{addname, addtwitter, close, leaderboard, newweek, profile, reopen, submit};
use crate::config::{Args, Config};
use crate::core::{log_command, terminate};
use crate::events::BfaEvents;

/// Global handles, so we can shut down gracefully on Ctrl+C.
pub static SHARD_MANAGER: OnceCell<Arc<ser::ShardManager>> = OnceCell::new();
pub static DB: OnceCell<Db> = OnceCell::new();
static RUNTIME: OnceCell<tokio::runtime::Handle> = OnceCell::new();

/// User data.
pub struct Data {
    pub db: Db,
    pub config: Config,
}

/// Basic types.
type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;
type Res = Result<(), Error>;

/// This is called from a thread that is not part of the runtime.
fn ctrlc_impl() {
    let Some(handle) = RUNTIME.get() else { std::process::exit(1); };
    let _guard = handle.enter();
    handle.block_on(terminate());
}

/// Register bot commands.
async fn register_impl(
    http: impl AsRef<ser::Http>,
    framework: &poise::Framework<Data, Error>,
    guild: ser::GuildId,
) -> Res {
    info!("Registering commands...");
    poise::builtins::register_in_guild(http, &framework.options().commands, guild).await?;
    info!("Commands registered.");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bfabot=info".parse().unwrap()))
        .init();

    // Register a panic hook to tear down the bot in case of an error;
    // this is so the bot restarts on error instead of hanging.
    let old_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        old_panic(info);
        std::process::abort();
    }));

    // Save runtime.
    let _ = RUNTIME.set(tokio::runtime::Handle::current());

    // Register the SIGINT handler.
    //
    // Do this *after* saving the runtime as the handler will
    // attempt to enter the runtime.
    ctrlc::set_handler(ctrlc_impl).expect("Failed to register SIGINT handler");

    let args = Args::parse();

    // Initialise the database.
    info!("Opening sqlite db at {}...", args.db);
    let db = Db::open(&args.db).await.expect("Failed to open sqlite db");
    let _ = DB.set(db.clone());

    let data = Data { db, config: Config::from(&args) };
    let register = args.register;
    let fw = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            pre_command: |ctx| Box::pin(async move { log_command(ctx).await; }),
            commands: vec![
                submit(),
                addtwitter(),
                addname(),
                profile(),
                leaderboard(),
                newweek(),
                close(),
                reopen(),
            ],
            ..Default::default()
        })

        .setup(move |ctx, _, framework| {
            let _ = SHARD_MANAGER.set(framework.shard_manager().clone());

            Box::pin(async move {
                if register { register_impl(ctx, framework, data.config.guild).await?; }
                info!("Setup done");
                info!("Staff roles: {}", data.config.staff_roles.join(", "));
                Ok(data)
            })
        })
        .build();

    let mut client = ser::ClientBuilder::new(&args.token, ser::GatewayIntents::non_privileged())
        .framework(fw)
        .event_handler(BfaEvents)
        .await
        .expect("Failed to create client");

    client.start().await.expect("Client error");
}
