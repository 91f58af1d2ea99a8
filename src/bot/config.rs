use clap::Parser;
use poise::serenity_prelude::{ChannelId, GuildId};
use bfabot_core::DEFAULT_DB_PATH;

/// Clopts. Everything except `--register` can also be set in the
/// environment or in a `.env` file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Whether to register the commands.
    #[clap(long, short)]
    pub register: bool,

    /// Discord bot token.
    #[clap(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Server the bot runs in.
    #[clap(long, env = "GUILD_ID")]
    pub guild_id: u64,

    /// The only channel in which students may use the bot.
    #[clap(long, env = "SUBMISSION_CHANNEL_ID")]
    pub submission_channel_id: u64,

    /// Path to the sqlite db.
    #[clap(long, env = "BFABOT_DB", default_value = DEFAULT_DB_PATH)]
    pub db: String,

    /// Roles that may start, close, and reopen weeks.
    #[clap(long, env = "STAFF_ROLES", value_delimiter = ',', default_values = ["Admin", "Faculty", "TO"])]
    pub staff_roles: Vec<String>,
}

/// Settings the commands need at runtime.
#[derive(Clone, Debug)]
pub struct Config {
    pub guild: GuildId,
    pub submission_channel: ChannelId,
    pub staff_roles: Vec<String>,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Config {
            guild: GuildId::new(args.guild_id),
            submission_channel: ChannelId::new(args.submission_channel_id),
            staff_roles: args.staff_roles.iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }
}

impl Config {
    /// Whether any of these role names is a staff role.
    pub fn is_staff<'a>(&self, roles: impl IntoIterator<Item = &'a str>) -> bool {
        roles.into_iter().any(|r| self.staff_roles.iter().any(|s| s.eq_ignore_ascii_case(r)))
    }
}
