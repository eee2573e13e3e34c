use poise::{serenity_prelude::CreateEmbed, CreateReply};

type Error = crate::Error;
type Context<'a> = crate::Context<'a>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[poise::command(category = "Stats", prefix_command, slash_command, user_cooldown = 1)]
pub async fn stats(ctx: Context<'_>) -> Result<(), Error> {
    let uptime = {
        let duration = std::time::Duration::from_secs(
            (chrono::Utc::now().timestamp() - crate::config::CONFIG.bot_start_time) as u64,
        );

        let seconds = duration.as_secs() % 60;
        let minutes = (duration.as_secs() / 60) % 60;
        let hours = (duration.as_secs() / 60) / 60;

        format!("{}h{}m{}s", hours, minutes, seconds)
    };

    let modules = crate::modules::enabled_modules()
        .iter()
        .map(|m| format!("{} (`{}`): {}", m.name, m.id, m.description))
        .collect::<Vec<_>>()
        .join("\n");

    let msg = CreateReply::default().embed(
        CreateEmbed::default()
            .title("Bot Stats")
            .field(
                "Bot name",
                ctx.serenity_context().cache.current_user().name.to_string(),
                true,
            )
            .field("Bot version", VERSION, true)
            .field("Uptime", uptime, true)
            .field(
                "Servers",
                ctx.serenity_context().cache.guild_count().to_string(),
                true,
            )
            .field("Modules", modules, false),
    );

    ctx.send(msg).await?;
    Ok(())
}
