use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;
use serenity::all::{ChannelId, GuildId, RuleId};
use serenity::builder::EditAutoModRule;
use serenity::model::guild::automod::{Action, EventType, Rule, Trigger};
use std::future::Future;
use std::time::Duration;
use strum_macros::{Display, EnumString};

use crate::impls::cache::CacheHttpImpl;
use crate::Error;

/// Name prefix used to tag every rule the seeder creates
pub const RULE_NAME_PREFIX: &str = "[AMSEED]";

pub const DEFAULT_CREATE_COUNT: i32 = 10;
pub const MAX_CREATE_COUNT: i64 = 10;

/// Shown to members whose message got blocked by a seed rule
const CUSTOM_MESSAGE: &str =
    "AutoMod seed rule (badge test). If this blocks unexpectedly, delete the rule.";

const NAME_TOKEN_LEN: usize = 8;
const KEYWORD_TOKEN_LEN: usize = 12;

/// What a seeded rule does when it triggers, persisted as text
#[derive(EnumString, Display, PartialEq, Eq, Clone, Copy, Debug)]
#[strum(serialize_all = "snake_case")]
pub enum ActionMode {
    Block,
    Alert,
}

#[derive(poise::ChoiceParameter)]
pub enum ActionModeChoice {
    #[name = "block"]
    Block,
    #[name = "alert"]
    Alert,
}

impl ActionModeChoice {
    pub fn resolve(self) -> ActionMode {
        match self {
            Self::Block => ActionMode::Block,
            Self::Alert => ActionMode::Alert,
        }
    }
}

/// Alert mode needs both an unlock and a channel to send alerts to.
/// Anything less falls back to blocking.
pub fn resolve_action_mode(
    mode: ActionMode,
    allow_alert: bool,
    log_channel: Option<ChannelId>,
) -> (ActionMode, Option<&'static str>) {
    match mode {
        ActionMode::Block => (ActionMode::Block, None),
        ActionMode::Alert if !allow_alert => (ActionMode::Block, None),
        ActionMode::Alert if log_channel.is_none() => (
            ActionMode::Block,
            Some("alert mode has no log channel, fell back to block"),
        ),
        ActionMode::Alert => (ActionMode::Alert, None),
    }
}

fn random_token(len: usize) -> String {
    Alphanumeric
        .sample_string(&mut rand::thread_rng(), len)
        .to_ascii_lowercase()
}

/// A rule the seeder intends to create: randomized name and trigger
/// keywords, fixed everything else
#[derive(Clone, Debug)]
pub struct PlannedRule {
    pub name: String,
    pub keywords: Vec<String>,
}

pub fn plan_rules(guild_id: GuildId, count: usize) -> Vec<PlannedRule> {
    (0..count)
        .map(|_| {
            let keyword_count = rand::thread_rng().gen_range(1..=3);

            PlannedRule {
                name: format!("{} seed {}", RULE_NAME_PREFIX, random_token(NAME_TOKEN_LEN)),
                keywords: (0..keyword_count)
                    .map(|_| format!("amseed_{}_{}", guild_id, random_token(KEYWORD_TOKEN_LEN)))
                    .collect(),
            }
        })
        .collect()
}

fn keyword_trigger(keywords: Vec<String>) -> Trigger {
    Trigger::Keyword {
        strings: keywords,
        regex_patterns: Vec::new(),
        allow_list: Vec::new(),
    }
}

fn rule_actions(mode: ActionMode, log_channel: Option<ChannelId>) -> Vec<Action> {
    match (mode, log_channel) {
        (ActionMode::Alert, Some(channel)) => vec![Action::Alert(channel)],
        _ => vec![Action::BlockMessage {
            custom_message: Some(CUSTOM_MESSAGE.to_string()),
        }],
    }
}

/// A failed remote rule operation, classified by what the batch loop
/// needs to know about it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOpError {
    Forbidden,
    RateLimited,
    Request(Option<u16>),
}

impl std::fmt::Display for RuleOpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden => write!(f, "missing permissions"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::Request(Some(code)) => write!(f, "request failed with status {}", code),
            Self::Request(None) => write!(f, "request failed"),
        }
    }
}

impl std::error::Error for RuleOpError {}

impl From<serenity::Error> for RuleOpError {
    fn from(err: serenity::Error) -> Self {
        match &err {
            serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(resp)) => {
                match resp.status_code.as_u16() {
                    403 => Self::Forbidden,
                    429 => Self::RateLimited,
                    code => Self::Request(Some(code)),
                }
            }
            _ => Self::Request(None),
        }
    }
}

pub async fn fetch_rules(
    cache_http: &CacheHttpImpl,
    guild_id: GuildId,
) -> Result<Vec<Rule>, Error> {
    let rules = guild_id.automod_rules(&cache_http.http).await?;

    Ok(rules)
}

pub async fn create_rule(
    cache_http: &CacheHttpImpl,
    guild_id: GuildId,
    planned: &PlannedRule,
    enabled: bool,
    mode: ActionMode,
    log_channel: Option<ChannelId>,
) -> Result<Rule, RuleOpError> {
    let builder = EditAutoModRule::new()
        .name(planned.name.clone())
        .event_type(EventType::MessageSend)
        .trigger(keyword_trigger(planned.keywords.clone()))
        .actions(rule_actions(mode, log_channel))
        .enabled(enabled);

    guild_id
        .create_automod_rule(cache_http, builder)
        .await
        .map_err(RuleOpError::from)
}

pub async fn delete_rule(
    cache_http: &CacheHttpImpl,
    guild_id: GuildId,
    rule_id: RuleId,
) -> Result<(), RuleOpError> {
    guild_id
        .delete_automod_rule(&cache_http.http, rule_id)
        .await
        .map_err(RuleOpError::from)
}

pub async fn enable_rule(
    cache_http: &CacheHttpImpl,
    guild_id: GuildId,
    rule_id: RuleId,
) -> Result<Rule, RuleOpError> {
    guild_id
        .edit_automod_rule(cache_http, rule_id, EditAutoModRule::new().enabled(true))
        .await
        .map_err(RuleOpError::from)
}

pub fn summarize_rule(rule: &Rule) -> String {
    let state = if rule.enabled { "enabled" } else { "disabled" };

    format!("{} (ID: {}, {})", rule.name, rule.id, state)
}

/// Why a batch stopped before attempting every item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Forbidden,
    RateLimited,
    BadRequest,
    TargetError,
}

impl StopReason {
    pub fn as_note(&self) -> &'static str {
        match self {
            Self::Forbidden => "stopped: missing permissions",
            Self::RateLimited => "stopped: rate limited (429)",
            Self::BadRequest => "stopped: guild AutoMod limit or invalid rule parameters",
            Self::TargetError => "stopped: permission or target error",
        }
    }
}

/// Delays between rule operations: a jittered per-item delay, a
/// longer pause every few items and the backoff before the single
/// rate limit retry
#[derive(Clone, Debug)]
pub struct BatchPacing {
    pub item_delay_min: Duration,
    pub item_delay_max: Duration,
    pub pause_every: usize,
    pub pause: Duration,
    pub retry_backoff: Duration,
}

impl Default for BatchPacing {
    fn default() -> Self {
        Self {
            item_delay_min: Duration::from_millis(350),
            item_delay_max: Duration::from_millis(900),
            pause_every: 5,
            pause: Duration::from_millis(1500),
            retry_backoff: Duration::from_millis(1500),
        }
    }
}

impl BatchPacing {
    fn item_delay(&self) -> Duration {
        let spread = self.item_delay_max.saturating_sub(self.item_delay_min);

        if spread.is_zero() {
            return self.item_delay_min;
        }

        self.item_delay_min + spread.mul_f64(rand::thread_rng().gen::<f64>())
    }

    #[cfg(test)]
    fn immediate() -> Self {
        Self {
            item_delay_min: Duration::ZERO,
            item_delay_max: Duration::ZERO,
            pause_every: 5,
            pause: Duration::ZERO,
            retry_backoff: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub requested: usize,
    pub done: Vec<T>,
    pub failed: usize,
    pub stopped: Option<StopReason>,
}

impl<T> BatchOutcome<T> {
    pub fn succeeded(&self) -> usize {
        self.done.len()
    }
}

/// Runs one rule operation per item, strictly in order, with the
/// given pacing. A rate limited attempt is retried exactly once after
/// backing off; permission and validation errors abort the batch.
/// Every item that did not succeed, attempted or not, counts as
/// failed, so `requested == succeeded + failed` holds on return.
pub async fn run_batch<I, T, F, Fut>(
    items: Vec<I>,
    pacing: &BatchPacing,
    mut attempt: F,
) -> BatchOutcome<T>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<T, RuleOpError>>,
{
    let requested = items.len();
    let mut done = Vec::new();
    let mut stopped = None;

    for (idx, item) in items.into_iter().enumerate() {
        tokio::time::sleep(pacing.item_delay()).await;

        if idx > 0 && pacing.pause_every > 0 && idx % pacing.pause_every == 0 {
            tokio::time::sleep(pacing.pause).await;
        }

        match attempt(item.clone()).await {
            Ok(v) => done.push(v),
            Err(RuleOpError::Forbidden) => {
                stopped = Some(StopReason::Forbidden);
                break;
            }
            Err(RuleOpError::RateLimited) => {
                tokio::time::sleep(pacing.retry_backoff).await;

                match attempt(item).await {
                    Ok(v) => done.push(v),
                    Err(_) => {
                        stopped = Some(StopReason::RateLimited);
                        break;
                    }
                }
            }
            Err(RuleOpError::Request(Some(400))) => {
                stopped = Some(StopReason::BadRequest);
                break;
            }
            Err(RuleOpError::Request(Some(404))) => {
                stopped = Some(StopReason::TargetError);
                break;
            }
            Err(RuleOpError::Request(_)) => {}
        }
    }

    let failed = requested - done.len();

    BatchOutcome {
        requested,
        done,
        failed,
        stopped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_mode_round_trips_as_text() {
        assert_eq!(ActionMode::Block.to_string(), "block");
        assert_eq!(ActionMode::Alert.to_string(), "alert");
        assert_eq!("block".parse::<ActionMode>().unwrap(), ActionMode::Block);
        assert_eq!("alert".parse::<ActionMode>().unwrap(), ActionMode::Alert);
        assert!("yell".parse::<ActionMode>().is_err());
    }

    #[test]
    fn test_resolve_action_mode() {
        let channel = Some(ChannelId::new(42));

        assert_eq!(
            resolve_action_mode(ActionMode::Block, true, channel),
            (ActionMode::Block, None)
        );
        assert_eq!(
            resolve_action_mode(ActionMode::Alert, true, channel),
            (ActionMode::Alert, None)
        );
        // Locked alert mode falls back without a note
        assert_eq!(
            resolve_action_mode(ActionMode::Alert, false, channel),
            (ActionMode::Block, None)
        );
        // Unlocked but channel-less alert mode falls back with a note
        let (mode, note) = resolve_action_mode(ActionMode::Alert, true, None);
        assert_eq!(mode, ActionMode::Block);
        assert!(note.is_some());
    }

    #[test]
    fn test_plan_rules_shape() {
        let planned = plan_rules(GuildId::new(123), 4);

        assert_eq!(planned.len(), 4);

        for rule in &planned {
            assert!(rule.name.starts_with(RULE_NAME_PREFIX));
            assert!((1..=3).contains(&rule.keywords.len()));

            for keyword in &rule.keywords {
                assert!(keyword.starts_with("amseed_123_"), "{}", keyword);
            }
        }
    }

    #[test]
    fn test_rule_actions_fall_back_to_block() {
        let actions = rule_actions(ActionMode::Alert, Some(ChannelId::new(42)));
        assert!(matches!(actions[0], Action::Alert(c) if c == ChannelId::new(42)));

        // No channel means no alert action, whatever the mode says
        let actions = rule_actions(ActionMode::Alert, None);
        assert!(matches!(
            &actions[0],
            Action::BlockMessage {
                custom_message: Some(_)
            }
        ));

        let actions = rule_actions(ActionMode::Block, Some(ChannelId::new(42)));
        assert!(matches!(&actions[0], Action::BlockMessage { .. }));
    }

    #[test]
    fn test_item_delay_stays_in_range() {
        let pacing = BatchPacing::default();

        for _ in 0..64 {
            let delay = pacing.item_delay();
            assert!(delay >= pacing.item_delay_min);
            assert!(delay <= pacing.item_delay_max);
        }

        assert_eq!(BatchPacing::immediate().item_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_batch_success_accounting() {
        let outcome = run_batch(vec![1, 2, 3], &BatchPacing::immediate(), |i| async move {
            Ok::<_, RuleOpError>(i * 10)
        })
        .await;

        assert_eq!(outcome.requested, 3);
        assert_eq!(outcome.done, vec![10, 20, 30]);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.stopped, None);
    }

    #[tokio::test]
    async fn test_generic_failures_do_not_stop_the_batch() {
        let outcome = run_batch(vec![1, 2, 3], &BatchPacing::immediate(), |i| async move {
            if i == 2 {
                Err(RuleOpError::Request(Some(500)))
            } else {
                Ok(i)
            }
        })
        .await;

        assert_eq!(outcome.succeeded(), 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.stopped, None);
        assert_eq!(outcome.requested, outcome.succeeded() + outcome.failed);
    }

    #[tokio::test]
    async fn test_bad_request_aborts_and_counts_the_rest_failed() {
        let outcome = run_batch(
            vec![0, 1, 2, 3, 4],
            &BatchPacing::immediate(),
            |i| async move {
                if i == 2 {
                    Err(RuleOpError::Request(Some(400)))
                } else {
                    Ok(i)
                }
            },
        )
        .await;

        assert_eq!(outcome.succeeded(), 2);
        assert_eq!(outcome.failed, 3);
        assert_eq!(outcome.stopped, Some(StopReason::BadRequest));
        assert_eq!(outcome.requested, outcome.succeeded() + outcome.failed);
    }

    #[tokio::test]
    async fn test_forbidden_aborts_without_retry() {
        let mut calls = 0u32;

        let outcome = run_batch(vec![(), (), ()], &BatchPacing::immediate(), |_| {
            calls += 1;
            async move { Err::<(), _>(RuleOpError::Forbidden) }
        })
        .await;

        assert_eq!(calls, 1);
        assert_eq!(outcome.succeeded(), 0);
        assert_eq!(outcome.failed, 3);
        assert_eq!(outcome.stopped, Some(StopReason::Forbidden));
    }

    #[tokio::test]
    async fn test_rate_limit_retries_exactly_once_then_fails() {
        let mut calls = 0u32;

        let outcome = run_batch(vec![()], &BatchPacing::immediate(), |_| {
            calls += 1;
            async move { Err::<(), _>(RuleOpError::RateLimited) }
        })
        .await;

        assert_eq!(calls, 2);
        assert_eq!(outcome.succeeded(), 0);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.stopped, Some(StopReason::RateLimited));
    }

    #[tokio::test]
    async fn test_rate_limit_retry_can_succeed() {
        let mut calls = 0u32;

        let outcome = run_batch(vec![()], &BatchPacing::immediate(), |_| {
            calls += 1;
            let attempt_no = calls;
            async move {
                if attempt_no == 1 {
                    Err(RuleOpError::RateLimited)
                } else {
                    Ok(attempt_no)
                }
            }
        })
        .await;

        assert_eq!(calls, 2);
        assert_eq!(outcome.done, vec![2]);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.stopped, None);
        assert_eq!(outcome.requested, outcome.succeeded() + outcome.failed);
    }
}
