use log::error;
use poise::serenity_prelude::{CreateEmbed, CreateMessage};
use serenity::all::{FormattedTimestamp, FormattedTimestampStyle, GuildId, RuleId, Timestamp};

use super::core::{self, ActionMode, ActionModeChoice, BatchPacing};
use super::settings::GuildSettings;
use crate::impls::cache::CacheHttpImpl;
use crate::impls::utils::parse_bool;
use crate::{Context, Error};

fn guild_id_of(ctx: &Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| "This command can only be used in a guild".into())
}

/// Only the stored owner may drive the seeder. With silent denial on,
/// unauthorized callers get no reply at all
async fn is_owner(ctx: &Context<'_>, settings: &GuildSettings) -> Result<bool, Error> {
    if ctx.author().id == settings.owner_user_id {
        return Ok(true);
    }

    if !settings.silent_denied {
        ctx.say("You are not authorized to use this command.")
            .await?;
    }

    Ok(false)
}

/// Sends the optional summary embed to the configured log channel.
/// A failed log send never fails the command itself
async fn maybe_log(
    cache_http: &CacheHttpImpl,
    settings: &GuildSettings,
    action: &str,
    requested: usize,
    success: usize,
    failed: usize,
    note: &str,
) {
    if !settings.logging_enabled {
        return;
    }

    let Some(channel_id) = settings.log_channel_id else {
        return;
    };

    let embed = CreateEmbed::default()
        .title("AutoMod Seeder")
        .field("Action", action.to_string(), true)
        .field("Count", requested.to_string(), true)
        .field("Success", success.to_string(), true)
        .field("Fail", failed.to_string(), true)
        .field(
            "Note",
            if note.is_empty() { "-" } else { note }.to_string(),
            false,
        );

    if let Err(e) = channel_id
        .send_message(cache_http, CreateMessage::new().embed(embed))
        .await
    {
        error!("Failed to send seeder log embed to {}: {}", channel_id, e);
    }
}

async fn run_create(ctx: Context<'_>, count: usize, enabled: bool) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let cache_http = CacheHttpImpl::from_ctx(ctx.serenity_context());
    let data = ctx.data();

    let mut settings = GuildSettings::load(&data.pool, guild_id).await?;
    settings.sync_seeded_rules(&cache_http, &data.pool).await?;

    let (mode, mut note) = core::resolve_action_mode(
        settings.action_mode,
        settings.allow_alert_mode,
        settings.log_channel_id,
    );

    let planned = core::plan_rules(guild_id, count);
    let pacing = BatchPacing::default();
    let log_channel = settings.log_channel_id;

    let outcome = core::run_batch(planned, &pacing, |rule| {
        let cache_http = cache_http.clone();
        async move {
            core::create_rule(&cache_http, guild_id, &rule, enabled, mode, log_channel).await
        }
    })
    .await;

    if let Some(reason) = outcome.stopped {
        note = Some(reason.as_note());
    }

    if !outcome.done.is_empty() {
        let mut ids = settings.seeded_rule_ids.clone();
        ids.extend(outcome.done.iter().map(|rule| rule.id));
        settings.set_seeded_rule_ids(&data.pool, ids).await?;
    }

    settings.set_last_run_now(&data.pool).await?;

    let mut summary = vec![
        format!("Requested: {}", outcome.requested),
        format!("Succeeded: {}", outcome.succeeded()),
        format!("Failed: {}", outcome.failed),
    ];

    if outcome.stopped.is_some() {
        summary.push(
            "The guild's AutoMod rule limit may prevent creating the full batch.".to_string(),
        );
    }

    if !outcome.done.is_empty() {
        let mut shown: Vec<String> = outcome
            .done
            .iter()
            .take(5)
            .map(core::summarize_rule)
            .collect();

        if outcome.done.len() > 5 {
            shown.push(format!("+ {} more", outcome.done.len() - 5));
        }

        summary.push(format!("Created: {}", shown.join(" | ")));
    }

    ctx.say(summary.join("\n")).await?;

    maybe_log(
        &cache_http,
        &settings,
        "create",
        outcome.requested,
        outcome.succeeded(),
        outcome.failed,
        note.unwrap_or(""),
    )
    .await;

    Ok(())
}

/// Seed this guild with random AutoMod rules for badge testing
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    aliases("amseed"),
    required_bot_permissions = "MANAGE_GUILD",
    subcommands("create", "list", "status", "purge", "enableall", "set")
)]
pub async fn automodseed(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let data = ctx.data();

    let settings = GuildSettings::load(&data.pool, guild_id).await?;

    if !is_owner(&ctx, &settings).await? {
        return Ok(());
    }

    let count = i64::from(settings.default_count).clamp(1, core::MAX_CREATE_COUNT) as usize;

    run_create(ctx, count, settings.default_enabled).await
}

/// Create AutoMod seed rules
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_bot_permissions = "MANAGE_GUILD"
)]
pub async fn create(
    ctx: Context<'_>,
    #[description = "How many rules to create (1-10)"] count: Option<u32>,
    #[description = "Whether created rules start enabled"] enabled: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let data = ctx.data();

    let settings = GuildSettings::load(&data.pool, guild_id).await?;

    if !is_owner(&ctx, &settings).await? {
        return Ok(());
    }

    let count = match count {
        Some(count) => i64::from(count),
        None => i64::from(settings.default_count),
    }
    .clamp(1, core::MAX_CREATE_COUNT) as usize;

    let enabled = match enabled {
        Some(ref value) => parse_bool(value)?,
        None => settings.default_enabled,
    };

    run_create(ctx, count, enabled).await
}

/// List the AutoMod rules this bot has seeded
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let cache_http = CacheHttpImpl::from_ctx(ctx.serenity_context());
    let data = ctx.data();

    let mut settings = GuildSettings::load(&data.pool, guild_id).await?;

    if !is_owner(&ctx, &settings).await? {
        return Ok(());
    }

    let rule_map = settings.sync_seeded_rules(&cache_http, &data.pool).await?;

    if settings.seeded_rule_ids.is_empty() {
        ctx.say("No seed rules are currently tracked for this guild.")
            .await?;
        return Ok(());
    }

    let lines: Vec<String> = settings
        .seeded_rule_ids
        .iter()
        .filter_map(|id| rule_map.get(id))
        .map(core::summarize_rule)
        .take(20)
        .collect();

    ctx.say(lines.join("\n")).await?;

    Ok(())
}

/// Show seed rule status for this guild
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let cache_http = CacheHttpImpl::from_ctx(ctx.serenity_context());
    let data = ctx.data();

    let mut settings = GuildSettings::load(&data.pool, guild_id).await?;

    if !is_owner(&ctx, &settings).await? {
        return Ok(());
    }

    let rule_map = settings.sync_seeded_rules(&cache_http, &data.pool).await?;

    let live = settings
        .seeded_rule_ids
        .iter()
        .filter(|id| rule_map.contains_key(id))
        .count();

    let last_run = match settings.last_run_at {
        Some(at) => {
            let ts = Timestamp::from_unix_timestamp(at.timestamp())?;
            FormattedTimestamp::new(ts, Some(FormattedTimestampStyle::RelativeTime)).to_string()
        }
        None => "-".to_string(),
    };

    ctx.say(format!(
        "Tracked rules: {}\nLive rules: {}\nLast run: {}",
        settings.seeded_rule_ids.len(),
        live,
        last_run
    ))
    .await?;

    Ok(())
}

/// Delete every AutoMod rule this bot has seeded
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_bot_permissions = "MANAGE_GUILD"
)]
pub async fn purge(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let cache_http = CacheHttpImpl::from_ctx(ctx.serenity_context());
    let data = ctx.data();

    let mut settings = GuildSettings::load(&data.pool, guild_id).await?;

    if !is_owner(&ctx, &settings).await? {
        return Ok(());
    }

    settings.sync_seeded_rules(&cache_http, &data.pool).await?;

    if settings.seeded_rule_ids.is_empty() {
        ctx.say("There are no seed rules to delete.").await?;
        return Ok(());
    }

    let ids = settings.seeded_rule_ids.clone();
    let pacing = BatchPacing::default();

    let outcome = core::run_batch(ids, &pacing, |rule_id| {
        let cache_http = cache_http.clone();
        async move {
            core::delete_rule(&cache_http, guild_id, rule_id).await?;
            Ok(rule_id)
        }
    })
    .await;

    // Deleted rules leave the tracked list, failures stay for the next purge
    let remaining: Vec<RuleId> = settings
        .seeded_rule_ids
        .iter()
        .copied()
        .filter(|id| !outcome.done.contains(id))
        .collect();

    settings.set_seeded_rule_ids(&data.pool, remaining).await?;

    let mut summary = format!(
        "Deleted: {}, Failed: {}",
        outcome.succeeded(),
        outcome.failed
    );

    if let Some(reason) = outcome.stopped {
        summary.push_str(&format!(" ({})", reason.as_note()));
    }

    ctx.say(summary).await?;

    maybe_log(
        &cache_http,
        &settings,
        "purge",
        outcome.requested,
        outcome.succeeded(),
        outcome.failed,
        outcome.stopped.map(|r| r.as_note()).unwrap_or(""),
    )
    .await;

    Ok(())
}

/// Enable every AutoMod rule this bot has seeded
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_bot_permissions = "MANAGE_GUILD"
)]
pub async fn enableall(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let cache_http = CacheHttpImpl::from_ctx(ctx.serenity_context());
    let data = ctx.data();

    let mut settings = GuildSettings::load(&data.pool, guild_id).await?;

    if !is_owner(&ctx, &settings).await? {
        return Ok(());
    }

    settings.sync_seeded_rules(&cache_http, &data.pool).await?;

    if settings.seeded_rule_ids.is_empty() {
        ctx.say("There are no seed rules to enable.").await?;
        return Ok(());
    }

    let ids = settings.seeded_rule_ids.clone();
    let pacing = BatchPacing::default();

    let outcome = core::run_batch(ids, &pacing, |rule_id| {
        let cache_http = cache_http.clone();
        async move {
            core::enable_rule(&cache_http, guild_id, rule_id).await?;
            Ok(rule_id)
        }
    })
    .await;

    let mut summary = format!(
        "Enabled: {}, Failed: {}",
        outcome.succeeded(),
        outcome.failed
    );

    if let Some(reason) = outcome.stopped {
        summary.push_str(&format!(" ({})", reason.as_note()));
    }

    ctx.say(summary).await?;

    maybe_log(
        &cache_http,
        &settings,
        "enableall",
        outcome.requested,
        outcome.succeeded(),
        outcome.failed,
        outcome.stopped.map(|r| r.as_note()).unwrap_or(""),
    )
    .await;

    Ok(())
}

/// Optional settings for the seeder
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands("mode", "lockdenied")
)]
pub async fn set(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let data = ctx.data();

    let settings = GuildSettings::load(&data.pool, guild_id).await?;

    is_owner(&ctx, &settings).await?;

    Ok(())
}

/// Set the action mode used for newly seeded rules
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn mode(
    ctx: Context<'_>,
    #[description = "What seeded rules should do when they trigger"] mode: ActionModeChoice,
) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let data = ctx.data();

    let mut settings = GuildSettings::load(&data.pool, guild_id).await?;

    if !is_owner(&ctx, &settings).await? {
        return Ok(());
    }

    let mode = mode.resolve();

    if mode == ActionMode::Alert && !settings.allow_alert_mode {
        ctx.say("Alert mode is locked for this guild.").await?;
        return Ok(());
    }

    settings.set_action_mode(&data.pool, mode).await?;

    ctx.say(format!("Action mode is now `{}`.", mode)).await?;

    Ok(())
}

/// Toggle silent denial for unauthorized users
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn lockdenied(
    ctx: Context<'_>,
    #[description = "New value, omit to toggle"] value: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id_of(&ctx)?;
    let data = ctx.data();

    let mut settings = GuildSettings::load(&data.pool, guild_id).await?;

    if !is_owner(&ctx, &settings).await? {
        return Ok(());
    }

    let silent = match value {
        Some(ref value) => parse_bool(value)?,
        None => !settings.silent_denied,
    };

    settings.set_silent_denied(&data.pool, silent).await?;

    ctx.say(format!("Silent denial is now `{}`.", silent))
        .await?;

    Ok(())
}
