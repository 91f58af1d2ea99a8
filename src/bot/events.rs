use poise::serenity_prelude::*;
use tracing::info;

pub struct BfaEvents;

#[async_trait]
impl EventHandler for BfaEvents {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Logged in as {} ({})", ready.user.tag(), ready.user.id);
    }

    async fn resume(&self, _ctx: Context, _: ResumedEvent) {
        info!("Gateway session resumed");
    }
}
