use chrono::{DateTime, Utc};
use serenity::all::{ChannelId, GuildId, RuleId, UserId};
use serenity::model::guild::automod::Rule;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use super::core::{self, ActionMode};
use crate::impls::cache::CacheHttpImpl;
use crate::Error;

/// The single user allowed to drive the seeder. Stored per guild so a
/// deployment can override it in the database.
pub const OWNER_USER_ID: UserId = UserId::new(1448530688558235719);

/// Per-guild seeder state, one row in `automod_seeder__guilds`
pub struct GuildSettings {
    pub guild_id: GuildId,
    pub owner_user_id: UserId,
    /// Rules this bot created, unique, in creation order
    pub seeded_rule_ids: Vec<RuleId>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub default_count: i32,
    pub default_enabled: bool,
    pub logging_enabled: bool,
    pub log_channel_id: Option<ChannelId>,
    pub allow_alert_mode: bool,
    pub action_mode: ActionMode,
    pub silent_denied: bool,
}

impl GuildSettings {
    /// Loads the guild row, creating it with defaults on first touch
    pub async fn load(pool: &PgPool, guild_id: GuildId) -> Result<Self, Error> {
        let row = sqlx::query(
            "SELECT owner_user_id, seeded_rule_ids, last_run_at, default_count,
                    default_enabled, logging_enabled, log_channel_id, allow_alert_mode,
                    action_mode, silent_denied
             FROM automod_seeder__guilds WHERE guild_id = $1",
        )
        .bind(guild_id.to_string())
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            sqlx::query(
                "INSERT INTO automod_seeder__guilds (guild_id, owner_user_id)
                 VALUES ($1, $2) ON CONFLICT (guild_id) DO NOTHING",
            )
            .bind(guild_id.to_string())
            .bind(OWNER_USER_ID.to_string())
            .execute(pool)
            .await?;

            return Ok(Self::fresh(guild_id));
        };

        let mut seeded_rule_ids = Vec::new();

        for id in row.try_get::<Vec<String>, _>("seeded_rule_ids")? {
            seeded_rule_ids.push(id.parse::<RuleId>()?);
        }

        let log_channel_id = row
            .try_get::<Option<String>, _>("log_channel_id")?
            .map(|id| id.parse::<ChannelId>())
            .transpose()?;

        Ok(Self {
            guild_id,
            owner_user_id: row.try_get::<String, _>("owner_user_id")?.parse()?,
            seeded_rule_ids,
            last_run_at: row.try_get("last_run_at")?,
            default_count: row.try_get("default_count")?,
            default_enabled: row.try_get("default_enabled")?,
            logging_enabled: row.try_get("logging_enabled")?,
            log_channel_id,
            allow_alert_mode: row.try_get("allow_alert_mode")?,
            action_mode: row.try_get::<String, _>("action_mode")?.parse()?,
            silent_denied: row.try_get("silent_denied")?,
        })
    }

    fn fresh(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            owner_user_id: OWNER_USER_ID,
            seeded_rule_ids: Vec::new(),
            last_run_at: None,
            default_count: core::DEFAULT_CREATE_COUNT,
            default_enabled: false,
            logging_enabled: false,
            log_channel_id: None,
            allow_alert_mode: false,
            action_mode: ActionMode::Block,
            silent_denied: false,
        }
    }

    pub async fn set_seeded_rule_ids(
        &mut self,
        pool: &PgPool,
        ids: Vec<RuleId>,
    ) -> Result<(), Error> {
        let as_text: Vec<String> = ids.iter().map(|id| id.to_string()).collect();

        sqlx::query("UPDATE automod_seeder__guilds SET seeded_rule_ids = $2 WHERE guild_id = $1")
            .bind(self.guild_id.to_string())
            .bind(&as_text)
            .execute(pool)
            .await?;

        self.seeded_rule_ids = ids;

        Ok(())
    }

    pub async fn set_last_run_now(&mut self, pool: &PgPool) -> Result<(), Error> {
        let now = Utc::now();

        sqlx::query("UPDATE automod_seeder__guilds SET last_run_at = $2 WHERE guild_id = $1")
            .bind(self.guild_id.to_string())
            .bind(now)
            .execute(pool)
            .await?;

        self.last_run_at = Some(now);

        Ok(())
    }

    pub async fn set_action_mode(&mut self, pool: &PgPool, mode: ActionMode) -> Result<(), Error> {
        sqlx::query("UPDATE automod_seeder__guilds SET action_mode = $2 WHERE guild_id = $1")
            .bind(self.guild_id.to_string())
            .bind(mode.to_string())
            .execute(pool)
            .await?;

        self.action_mode = mode;

        Ok(())
    }

    pub async fn set_silent_denied(&mut self, pool: &PgPool, silent: bool) -> Result<(), Error> {
        sqlx::query("UPDATE automod_seeder__guilds SET silent_denied = $2 WHERE guild_id = $1")
            .bind(self.guild_id.to_string())
            .bind(silent)
            .execute(pool)
            .await?;

        self.silent_denied = silent;

        Ok(())
    }

    /// Reconciles the stored rule id list against the live rule set.
    /// Ids that no longer exist remotely are dropped from storage.
    pub async fn sync_seeded_rules(
        &mut self,
        cache_http: &CacheHttpImpl,
        pool: &PgPool,
    ) -> Result<HashMap<RuleId, Rule>, Error> {
        let rules = core::fetch_rules(cache_http, self.guild_id).await?;
        let rule_map: HashMap<RuleId, Rule> = rules.into_iter().map(|r| (r.id, r)).collect();

        let filtered: Vec<RuleId> = self
            .seeded_rule_ids
            .iter()
            .copied()
            .filter(|id| rule_map.contains_key(id))
            .collect();

        if filtered != self.seeded_rule_ids {
            self.set_seeded_rule_ids(pool, filtered).await?;
        }

        Ok(rule_map)
    }
}
