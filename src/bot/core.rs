use std::sync::atomic::{AtomicBool, Ordering};
use poise::CreateReply;
use poise::serenity_prelude::{Colour, CreateEmbed, CreateEmbedFooter};
use tracing::{error, info, warn};
use bfabot_core::Division;
use crate::{Context, Data, Error, DB, SHARD_MANAGER};

/// Default colour to use for embeds.
pub const DEFAULT_EMBED_COLOUR: Colour = Colour::from_rgb(176, 199, 107);

/// Discord rejects messages longer than this.
const MAX_MESSAGE_LEN: usize = 2000;

/// Create an embed with some default settings applied to it.
pub fn create_embed(ctx: &Context<'_>) -> CreateEmbed {
    let mut embed = CreateEmbed::new().colour(DEFAULT_EMBED_COLOUR);

    // Don’t hold on to the cache guard for longer than necessary.
    let footer = ctx.guild().map(|g| (g.name.clone(), g.icon_url()));

    // Set the image to the guild’s icon, if we can retrieve that.
    match footer {
        Some((name, Some(icon))) => embed = embed.footer(CreateEmbedFooter::new(name).icon_url(icon)),
        Some((name, None)) => embed = embed.footer(CreateEmbedFooter::new(name)),
        None => {}
    }

    embed
}

/// Names of the roles the invoking member has.
pub async fn author_role_names(ctx: Context<'_>) -> Vec<String> {
    let Some(member) = ctx.author_member().await else { return vec![]; };
    member.roles(&ctx.serenity_context().cache)
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.name)
        .collect()
}

/// The invoking member’s division, as given by their roles.
pub async fn author_division(ctx: Context<'_>) -> Division {
    let roles = author_role_names(ctx).await;
    Division::from_role_names(roles.iter().map(String::as_str))
}

/// Check: only allow a command in the submission channel.
pub async fn in_submission_channel(ctx: Context<'_>) -> Result<bool, Error> {
    let channel = ctx.data().config.submission_channel;
    if ctx.channel_id() == channel { return Ok(true); }
    Err(format!("This command can only be used in <#{}>", channel).into())
}

/// Check: only allow a command for staff members.
pub async fn is_staff(ctx: Context<'_>) -> Result<bool, Error> {
    let roles = author_role_names(ctx).await;
    let config = &ctx.data().config;
    if config.is_staff(roles.iter().map(String::as_str)) { return Ok(true); }
    Err(format!(
        "Sorry, only members with one of these roles can use this command: {}",
        config.staff_roles.join(", ")
    ).into())
}

pub async fn handle_command_error(e: poise::FrameworkError<'_, Data, Error>) {
    // Reply with a message if possible. Otherwise, just log the error.
    let Some(ctx) = e.ctx() else {
        error!("{}", e);
        return;
    };

    // Log the entire command string so we have a record of it.
    warn!("In invocation of command: {}", ctx.invocation_string());

    // Get the nested error, if possible.
    let message = match &e {
        poise::FrameworkError::Command { error, .. } => error.to_string(),
        poise::FrameworkError::CommandCheckFailed { error: Some(error), .. } => error.to_string(),
        poise::FrameworkError::CommandCheckFailed { error: None, .. } => "You can’t use this command here".to_string(),
        poise::FrameworkError::ArgumentParse { error, .. } => format!("Incorrect command usage: {}", error),
        other => other.to_string(),
    };

    // Log it in case sending it fails.
    warn!("{}", message);

    // Send a reply to the user, informing them of the error; if that in turn
    // causes an error, there is nothing we can do, so just log and ignore it.
    if let Err(e) = ctx.send(
        CreateReply::default()
            .ephemeral(true)
            .content(safe_truncate(format!("Error: {}", message), MAX_MESSAGE_LEN)),
    ).await {
        error!("Error replying to user: {}", e);
    }
}

pub async fn log_command(ctx: Context<'_>) {
    info!(
        "{} invoked command {}",
        ctx.author().name,
        ctx.invocation_string()
    );
}

/// Truncate a string w/o panicking.
pub fn safe_truncate(mut s: String, mut len: usize) -> String {
    if s.len() <= len { return s; }
    while !s.is_char_boundary(len) { len -= 1; }
    s.truncate(len);
    s
}

/// Terminate the bot gracefully.
pub async fn terminate() {
    // Don’t terminate twice.
    static TERMINATION_LOCK: AtomicBool = AtomicBool::new(false);
    if TERMINATION_LOCK.compare_exchange(
        false,
        true,
        Ordering::SeqCst,
        Ordering::SeqCst,
    ).is_err() { return; }

    info!("Shutting down bot...");
    if let Some(shards) = SHARD_MANAGER.get() { shards.shutdown_all().await; }

    info!("Shutting down DB...");
    if let Some(db) = DB.get() {
        if let Err(e) = db.checkpoint().await { error!("Failed to merge WAL: {}", e); }
        db.close().await;
    }

    // Exit the process.
    info!("Exiting...");
    std::process::exit(0);
}
