use poise::CreateReply;
use poise::serenity_prelude::{self as ser, CreateEmbedAuthor, Mentionable, UserId};
use tracing::info;
use bfabot_core::{Error as CoreError, Standing, StudentUpdate};
use crate::{Context, Error, Res};
use crate::core::{author_division, create_embed, handle_command_error, in_submission_channel, is_staff};

/// Highest score anyone can legitimately get.
pub const MAX_SCORE: u32 = 1_000_000;

/// Number of entries shown by `/leaderboard`.
const LEADERBOARD_SIZE: usize = 10;

/// Number of submissions shown by `/profile`.
const RECENT_SUBMISSIONS: u32 = 3;

/// Field limits, matching what the games and sites allow.
const MAX_TWITTER_LEN: usize = 20;
const MAX_DANCER_NAME_LEN: usize = 8;
const MAX_WEEK_NAME_LEN: usize = 100;

/// Text appended to a submission confirmation.
fn format_upscore(upscore: i64) -> String {
    if upscore > 0 { format!("+[{}]!", upscore) } else { format!("[{}]", upscore) }
}

/// Trim a user-supplied value and check its length.
fn validate_field<'a>(value: &'a str, what: &str, max: usize) -> Result<&'a str, Error> {
    // Must not be empty, must not include only whitespace
    // and must not be too long.
    let value = value.trim();
    if value.is_empty() || value.chars().count() > max {
        return Err(format!("{} must not be empty and contain at most {} characters", what, max).into());
    }

    Ok(value)
}

/// How to refer to someone on the leaderboard.
fn standing_name(s: &Standing) -> String {
    s.nickname.clone()
        .or_else(|| s.display_name.clone())
        .unwrap_or_else(|| UserId::new(s.member_id).mention().to_string())
}

/// Update a student’s profile from a command. The Discord tag and the
/// division are refreshed every time.
async fn update_profile(ctx: Context<'_>, update: StudentUpdate) -> Res {
    let level = author_division(ctx).await;
    ctx.data().db.upsert_student(ctx.author().id.get(), StudentUpdate {
        display_name: Some(ctx.author().tag()),
        level: Some(level),
        ..update
    }).await?;
    Ok(())
}

/// Submit a score **with picture** for the weekly challenge.
#[poise::command(slash_command, guild_only, check = "in_submission_channel", on_error = "handle_command_error")]
pub async fn submit(
    ctx: Context<'_>,
    #[description = "Your ex or money score (depending on the challenge), digits only"]
    #[min = 0]
    #[max = 1_000_000]
    score: u32,
    #[description = "A picture of your score"] picture: ser::Attachment,
) -> Res {
    if score > MAX_SCORE {
        return Err(format!("score must be between 0 and {}", MAX_SCORE).into());
    }

    // Only images have dimensions.
    if picture.height.is_none() || picture.width.is_none() {
        return Err("file attachment must be an image".into());
    }

    let level = author_division(ctx).await;
    let upscore = ctx.data().db.submit_score(
        ctx.author().id.get(),
        &ctx.author().tag(),
        level,
        score,
        &picture.proxy_url,
    ).await?;

    info!("Added submission of {} from {} ({})", score, ctx.author().name, level);
    let mut message = format!("Submitted {}’s score of {}", ctx.author().mention(), score);
    if let Some(up) = upscore {
        message.push('\n');
        message.push_str(&format_upscore(up));
    }

    ctx.say(message).await?;
    Ok(())
}

/// Add your Twitter handle to your profile.
#[poise::command(slash_command, ephemeral, guild_only, check = "in_submission_channel", on_error = "handle_command_error")]
pub async fn addtwitter(
    ctx: Context<'_>,
    #[description = "Your Twitter handle"] handle: String,
) -> Res {
    let handle = validate_field(handle.trim().trim_start_matches('@'), "Twitter handle", MAX_TWITTER_LEN)?;
    update_profile(ctx, StudentUpdate {
        secondary_handle: Some(handle.to_string()),
        ..Default::default()
    }).await?;

    ctx.say(format!("Updated {}’s Twitter handle to @{}", ctx.author().mention(), handle)).await?;
    Ok(())
}

/// Add your in-game dancer name to your profile.
#[poise::command(slash_command, ephemeral, guild_only, check = "in_submission_channel", on_error = "handle_command_error")]
pub async fn addname(
    ctx: Context<'_>,
    #[description = "Your dancer name"] name: String,
) -> Res {
    let name = validate_field(&name, "Dancer name", MAX_DANCER_NAME_LEN)?;
    update_profile(ctx, StudentUpdate {
        nickname: Some(name.to_string()),
        ..Default::default()
    }).await?;

    ctx.say(format!("Updated {}’s dancer name to {}", ctx.author().mention(), name)).await?;
    Ok(())
}

/// Display your profile.
//
// Shows the student’s division, dancer name, Twitter handle, number of
// submissions, best score this week, and their most recent submissions.
#[poise::command(slash_command, ephemeral, guild_only, on_error = "handle_command_error")]
pub async fn profile(ctx: Context<'_>) -> Res {
    let db = &ctx.data().db;
    let member = ctx.author().id.get();
    let Some(student) = db.student(member).await? else {
        ctx.say("You don’t have a profile yet. Submit a score or use /addname to create one.").await?;
        return Ok(());
    };

    let name = student.nickname.as_ref()
        .or(ctx.author().global_name.as_ref())
        .unwrap_or(&ctx.author().name)
        .clone();

    let mut embed = create_embed(&ctx);
    embed = embed.author(CreateEmbedAuthor::new(format!("{}’s Profile", name))
        .icon_url(ctx.author().face())
    );

    embed = embed.field("Division", student.level.name(), true);
    embed = embed.field("Dancer Name", student.nickname.as_deref().unwrap_or("–"), true);
    embed = embed.field(
        "Twitter",
        student.secondary_handle.as_ref().map_or("–".to_string(), |h| format!("@{}", h)),
        true,
    );
    embed = embed.field("Submissions", db.submission_count(member).await?.to_string(), true);

    if let Some(week) = db.latest_week().await? {
        let best = db.personal_best(member, week).await?;
        embed = embed.field(
            format!("Best in Week {}", week),
            best.map_or("–".to_string(), |b| b.to_string()),
            true,
        );
    }

    let recent = db.recent_submissions(member, RECENT_SUBMISSIONS).await?;
    if !recent.is_empty() {
        let lines = recent.iter()
            .map(|s| format!(
                "Week {}: **{}** ({}, {})",
                s.week,
                s.score,
                s.level,
                s.submitted_at.format("%Y-%m-%d")
            ))
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("Recent Submissions", lines, false);
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the best scores of a week.
#[poise::command(slash_command, guild_only, on_error = "handle_command_error")]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "The week to show; defaults to the current week"] week: Option<i64>,
) -> Res {
    let db = &ctx.data().db;
    let challenge = match week {
        Some(w) => db.challenge(w).await?.ok_or_else(|| format!("There is no week {}", w))?,
        None => db.latest_challenge().await?.ok_or(CoreError::NoActiveChallenge)?,
    };

    let standings = db.leaderboard(challenge.week).await?;
    let description = if standings.is_empty() {
        "No submissions yet.".to_string()
    } else {
        standings.iter()
            .take(LEADERBOARD_SIZE)
            .enumerate()
            .map(|(i, s)| format!("{}. **{}** ({}) – {}", i + 1, standing_name(s), s.level, s.best))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = create_embed(&ctx)
        .title(format!("Week {}: {}", challenge.week, challenge.name))
        .description(description);

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Start a new week. The previous week is closed.
#[poise::command(slash_command, guild_only, check = "is_staff", on_error = "handle_command_error")]
pub async fn newweek(
    ctx: Context<'_>,
    #[description = "Name of the challenge"] name: String,
    #[description = "Week number; defaults to the week after the latest one"] week: Option<i64>,
) -> Res {
    let name = validate_field(&name, "Week name", MAX_WEEK_NAME_LEN)?;
    let (challenge, closed) = ctx.data().db.start_new_week(week, name).await?;

    let mut message = format!("Week {}: {} has started! Submissions are now open.", challenge.week, challenge.name);
    if let Some(p) = closed {
        message.push_str(&format!("\nWeek {}: {} is now closed.", p.week, p.name));
    }

    ctx.say(message).await?;
    Ok(())
}

/// Close submissions for the current week.
#[poise::command(slash_command, guild_only, check = "is_staff", on_error = "handle_command_error")]
pub async fn close(ctx: Context<'_>) -> Res {
    let c = ctx.data().db.close_submissions().await?.ok_or(CoreError::NoActiveChallenge)?;
    ctx.say(format!("Week {}: {} is now closed for submissions.", c.week, c.name)).await?;
    Ok(())
}

/// Reopen submissions for the current week.
#[poise::command(slash_command, guild_only, check = "is_staff", on_error = "handle_command_error")]
pub async fn reopen(ctx: Context<'_>) -> Res {
    let c = ctx.data().db.reopen_submissions().await?.ok_or(CoreError::NoActiveChallenge)?;
    ctx.say(format!("Week {}: {} is now reopened for submissions.", c.week, c.name)).await?;
    Ok(())
}
