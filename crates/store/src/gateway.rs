//! Typed, transaction-scoped access to the relational store.
//!
//! Every operation runs inside a [`WorkScope`]: a transaction that begins on
//! entry, commits on [`WorkScope::commit`], and rolls back when dropped.
//! Relations a caller needs later are loaded eagerly before the scope ends;
//! no record hands out a live session.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};
use ulid::Ulid;

use crate::crypto::{CipherUrl, UrlCipher};
use crate::entities::{
    Channel, Event, EventScope, NewSelector, NewSubscription, RoutingSelector, ScheduleRow,
    Subscriber, Subscription, SubscriptionBundle, UnsubscribeToken,
};
use crate::error::StoreError;

const UNSUBSCRIBE_TOKEN_BYTES: usize = 32;
const UNSUBSCRIBE_TOKEN_TTL_DAYS: i64 = 60;

/// Optional narrowing of `channels_for_subscriber`.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    pub by_ids: Option<Vec<String>>,
    pub by_tag: Option<String>,
}

/// Session-scoped storage gateway. Cheap to clone; holds the pool and the
/// URL cipher.
#[derive(Clone)]
pub struct StoreGateway {
    pool: SqlitePool,
    cipher: UrlCipher,
}

impl StoreGateway {
    pub fn new(pool: SqlitePool, cipher: UrlCipher) -> Self {
        Self { pool, cipher }
    }

    pub async fn connect(url: &str, cipher: UrlCipher) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(url).await?;
        Ok(Self::new(pool, cipher))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Cipher for the channel URL column. Only the channel resolver should
    /// decrypt with it, and only for channels that will be delivered to.
    pub fn cipher(&self) -> &UrlCipher {
        &self.cipher
    }

    /// Begin a work scope. Commit explicitly; dropping rolls back.
    pub async fn scope(&self) -> Result<WorkScope<'_>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(WorkScope { tx })
    }

    pub async fn event_by_id(&self, id: &str) -> Result<Option<Event>, StoreError> {
        let mut scope = self.scope().await?;
        let event = scope.event_by_id(id).await?;
        scope.commit().await?;
        Ok(event)
    }

    pub async fn event_by_workflow_id(&self, workflow_id: &str) -> Result<Option<Event>, StoreError> {
        let mut scope = self.scope().await?;
        let event = scope.event_by_workflow_id(workflow_id).await?;
        scope.commit().await?;
        Ok(event)
    }

    pub async fn subscription_by_id(
        &self,
        id: &str,
    ) -> Result<Option<SubscriptionBundle>, StoreError> {
        let mut scope = self.scope().await?;
        let bundle = scope.subscription_by_id(id).await?;
        scope.commit().await?;
        Ok(bundle)
    }

    pub async fn subscribers_for_event(
        &self,
        event_id: &str,
    ) -> Result<Vec<SubscriptionBundle>, StoreError> {
        let mut scope = self.scope().await?;
        let bundles = scope.subscribers_for_event(event_id).await?;
        scope.commit().await?;
        Ok(bundles)
    }
}

pub struct WorkScope<'a> {
    tx: Transaction<'a, Sqlite>,
}

impl WorkScope<'_> {
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    // --- events ---

    pub async fn event_by_id(&mut self, id: &str) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(map_event).transpose()
    }

    pub async fn event_by_workflow_id(
        &mut self,
        workflow_id: &str,
    ) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query("SELECT * FROM events WHERE workflow_id = ?")
            .bind(workflow_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(map_event).transpose()
    }

    pub async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO events (
                id, name, start_date, end_date, description, location,
                public, organizer_id, organization_id, workflow_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.name)
        .bind(event.start_date.timestamp())
        .bind(event.end_date.map(|dt| dt.timestamp()))
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.public)
        .bind(&event.organizer_id)
        .bind(&event.organization_id)
        .bind(&event.workflow_id)
        .bind(Utc::now().timestamp())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    /// Apply a partial update; `None` fields keep their current value.
    pub async fn update_event_fields(
        &mut self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        location: Option<&str>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE events SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                location = COALESCE(?, location),
                start_date = COALESCE(?, start_date),
                end_date = COALESCE(?, end_date)
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(location)
        .bind(start_date.map(|dt| dt.timestamp()))
        .bind(end_date.map(|dt| dt.timestamp()))
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    /// Events whose orchestrator should be live: completion deadline not yet
    /// reached. Used to resume orchestrators after a restart.
    pub async fn events_pending_completion(
        &mut self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE COALESCE(end_date, start_date + ?) > ?",
        )
        .bind(grace.num_seconds())
        .bind(now.timestamp())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(map_event).collect()
    }

    // --- subscribers and organizations ---

    pub async fn insert_subscriber(
        &mut self,
        email: &str,
        verified: bool,
    ) -> Result<Subscriber, StoreError> {
        let id = Ulid::new().to_string();
        sqlx::query(
            "INSERT INTO subscribers (id, email, verified, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(email)
        .bind(verified)
        .bind(Utc::now().timestamp())
        .execute(&mut *self.tx)
        .await?;
        Ok(Subscriber {
            id,
            email: email.to_string(),
            verified,
        })
    }

    pub async fn subscriber_by_id(&mut self, id: &str) -> Result<Option<Subscriber>, StoreError> {
        let subscriber =
            sqlx::query_as::<_, Subscriber>("SELECT id, email, verified FROM subscribers WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(subscriber)
    }

    pub async fn insert_organization(&mut self, name: &str) -> Result<String, StoreError> {
        let id = Ulid::new().to_string();
        sqlx::query("INSERT INTO organizations (id, name) VALUES (?, ?)")
            .bind(&id)
            .bind(name)
            .execute(&mut *self.tx)
            .await?;
        Ok(id)
    }

    pub async fn add_organization_member(
        &mut self,
        organization_id: &str,
        subscriber_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO organization_members (organization_id, subscriber_id) VALUES (?, ?)",
        )
        .bind(organization_id)
        .bind(subscriber_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn organization_members(
        &mut self,
        organization_id: &str,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let members = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT s.id, s.email, s.verified
            FROM subscribers s
            JOIN organization_members m ON m.subscriber_id = s.id
            WHERE m.organization_id = ?
            ORDER BY s.id
            "#,
        )
        .bind(organization_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(members)
    }

    // --- channels ---

    /// Insert a channel, encrypting the delivery URL before it touches the
    /// database. Tags are stored lower-cased.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_channel(
        &mut self,
        cipher: &UrlCipher,
        subscriber_id: Option<&str>,
        organization_id: Option<&str>,
        name: &str,
        url: &str,
        tag: Option<&str>,
        active: bool,
    ) -> Result<Channel, StoreError> {
        let id = Ulid::new().to_string();
        let url_cipher = cipher.encrypt(url)?;
        let tag = tag.map(|t| t.to_lowercase());
        sqlx::query(
            r#"
            INSERT INTO channels (id, subscriber_id, organization_id, name, url_cipher, tag, active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(subscriber_id)
        .bind(organization_id)
        .bind(name)
        .bind(url_cipher.as_stored())
        .bind(&tag)
        .bind(active)
        .execute(&mut *self.tx)
        .await?;
        Ok(Channel {
            id,
            subscriber_id: subscriber_id.map(str::to_string),
            organization_id: organization_id.map(str::to_string),
            name: name.to_string(),
            url: url_cipher,
            tag,
            active,
        })
    }

    pub async fn delete_channel(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active (by default all) channels owned by a subscriber, optionally
    /// narrowed to explicit ids or a tag (case-insensitive).
    pub async fn channels_for_subscriber(
        &mut self,
        subscriber_id: &str,
        only_active: bool,
        filter: &ChannelFilter,
    ) -> Result<Vec<Channel>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM channels WHERE subscriber_id = ? AND (? = 0 OR active = 1) ORDER BY id",
        )
        .bind(subscriber_id)
        .bind(only_active)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut channels = Vec::with_capacity(rows.len());
        for row in rows {
            channels.push(map_channel(row)?);
        }

        if let Some(ids) = &filter.by_ids {
            channels.retain(|c| ids.iter().any(|id| id == &c.id));
        }
        if let Some(tag) = &filter.by_tag {
            let wanted = tag.to_lowercase();
            channels.retain(|c| c.tag.as_deref() == Some(wanted.as_str()));
        }
        Ok(channels)
    }

    /// Active channels by id, regardless of owner. Used to honor explicit
    /// selectors that reference organization-owned channels.
    pub async fn channels_by_ids(&mut self, ids: &[String]) -> Result<Vec<Channel>, StoreError> {
        let mut channels = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query("SELECT * FROM channels WHERE id = ? AND active = 1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
            if let Some(row) = row {
                channels.push(map_channel(row)?);
            }
        }
        Ok(channels)
    }

    /// Channels whose stored tag equals `autosub:{event_tag}` within the
    /// event's audience scope. Identical tags in different organizations
    /// never cross-match because the query is restricted to the scope.
    pub async fn channels_for_event_scope(
        &mut self,
        autosub_tag: &str,
        scope: &EventScope,
    ) -> Result<Vec<Channel>, StoreError> {
        let tag = autosub_tag.to_lowercase();
        let rows = match scope {
            EventScope::PublicPersonal => {
                sqlx::query(
                    r#"
                    SELECT * FROM channels
                    WHERE active = 1 AND subscriber_id IS NOT NULL AND tag = ?
                    ORDER BY id
                    "#,
                )
                .bind(&tag)
                .fetch_all(&mut *self.tx)
                .await?
            }
            EventScope::Organization(org_id) => {
                sqlx::query(
                    r#"
                    SELECT * FROM channels
                    WHERE active = 1 AND tag = ?
                      AND (
                        organization_id = ?
                        OR subscriber_id IN (
                            SELECT subscriber_id FROM organization_members
                            WHERE organization_id = ?
                        )
                      )
                    ORDER BY id
                    "#,
                )
                .bind(&tag)
                .bind(org_id)
                .bind(org_id)
                .fetch_all(&mut *self.tx)
                .await?
            }
        };
        rows.into_iter().map(map_channel).collect()
    }

    // --- subscriptions ---

    /// Create a subscription with upsert semantics on `(event_id,
    /// subscriber_id)`. An existing row is left untouched by auto-subscribe
    /// enrollment; an explicit create replaces its selectors and reminder
    /// preferences.
    pub async fn create_subscription(
        &mut self,
        event_id: &str,
        subscriber_id: &str,
        new: NewSubscription,
    ) -> Result<String, StoreError> {
        let existing = sqlx::query(
            "SELECT id FROM subscriptions WHERE event_id = ? AND subscriber_id = ?",
        )
        .bind(event_id)
        .bind(subscriber_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let subscription_id = match existing {
            Some(row) => {
                let id: String = row.get("id");
                if new.auto_subscribed {
                    return Ok(id);
                }
                sqlx::query("UPDATE subscriptions SET auto_subscribed = 0 WHERE id = ?")
                    .bind(&id)
                    .execute(&mut *self.tx)
                    .await?;
                sqlx::query("DELETE FROM routing_selectors WHERE subscription_id = ?")
                    .bind(&id)
                    .execute(&mut *self.tx)
                    .await?;
                sqlx::query("DELETE FROM reminder_preferences WHERE subscription_id = ?")
                    .bind(&id)
                    .execute(&mut *self.tx)
                    .await?;
                id
            }
            None => {
                let id = Ulid::new().to_string();
                sqlx::query(
                    r#"
                    INSERT INTO subscriptions (id, event_id, subscriber_id, auto_subscribed, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(event_id)
                .bind(subscriber_id)
                .bind(new.auto_subscribed)
                .bind(Utc::now().timestamp())
                .execute(&mut *self.tx)
                .await?;
                id
            }
        };

        for selector in &new.selectors {
            let (channel_id, tag) = match selector {
                NewSelector::Channel(channel_id) => (Some(channel_id.as_str()), None),
                NewSelector::Tag(tag) => (None, Some(tag.to_lowercase())),
            };
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO routing_selectors (id, subscription_id, channel_id, tag)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(Ulid::new().to_string())
            .bind(&subscription_id)
            .bind(channel_id)
            .bind(tag)
            .execute(&mut *self.tx)
            .await?;
        }

        for offset in &new.reminder_offsets {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO reminder_preferences (id, subscription_id, offset_seconds)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(Ulid::new().to_string())
            .bind(&subscription_id)
            .bind(offset)
            .execute(&mut *self.tx)
            .await?;
        }

        tracing::debug!(
            event_id,
            subscriber_id,
            subscription_id,
            auto_subscribed = new.auto_subscribed,
            "subscription upserted"
        );
        Ok(subscription_id)
    }

    pub async fn delete_subscription(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// A subscription with selectors, reminder preferences, and its
    /// subscriber, eagerly loaded.
    pub async fn subscription_by_id(
        &mut self,
        id: &str,
    ) -> Result<Option<SubscriptionBundle>, StoreError> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT id, event_id, subscriber_id, auto_subscribed FROM subscriptions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match subscription {
            Some(subscription) => Ok(Some(self.load_bundle(subscription).await?)),
            None => Ok(None),
        }
    }

    /// All subscriptions of an event as eagerly-loaded bundles.
    pub async fn subscribers_for_event(
        &mut self,
        event_id: &str,
    ) -> Result<Vec<SubscriptionBundle>, StoreError> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, event_id, subscriber_id, auto_subscribed
            FROM subscriptions WHERE event_id = ? ORDER BY created_at, id
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut bundles = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            bundles.push(self.load_bundle(subscription).await?);
        }
        Ok(bundles)
    }

    async fn load_bundle(
        &mut self,
        subscription: Subscription,
    ) -> Result<SubscriptionBundle, StoreError> {
        let subscriber = self
            .subscriber_by_id(&subscription.subscriber_id)
            .await?
            .ok_or_else(|| StoreError::NotFound("subscriber".into()))?;

        let selectors = sqlx::query_as::<_, RoutingSelector>(
            r#"
            SELECT id, subscription_id, channel_id, tag
            FROM routing_selectors WHERE subscription_id = ? ORDER BY id
            "#,
        )
        .bind(&subscription.id)
        .fetch_all(&mut *self.tx)
        .await?;

        let reminder_offsets = sqlx::query(
            "SELECT offset_seconds FROM reminder_preferences WHERE subscription_id = ? ORDER BY offset_seconds",
        )
        .bind(&subscription.id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(|row| row.get::<i64, _>("offset_seconds"))
        .collect();

        Ok(SubscriptionBundle {
            subscription,
            subscriber,
            selectors,
            reminder_offsets,
        })
    }

    // --- unsubscribe tokens ---

    pub async fn create_unsubscribe_token(
        &mut self,
        subscription_id: &str,
    ) -> Result<UnsubscribeToken, StoreError> {
        let mut bytes = [0u8; UNSUBSCRIBE_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            bytes,
        );
        let now = Utc::now();
        let expires_at = now + Duration::days(UNSUBSCRIBE_TOKEN_TTL_DAYS);

        sqlx::query(
            r#"
            INSERT INTO unsubscribe_tokens (token, subscription_id, used, created_at, expires_at)
            VALUES (?, ?, 0, ?, ?)
            "#,
        )
        .bind(&token)
        .bind(subscription_id)
        .bind(now.timestamp())
        .bind(expires_at.timestamp())
        .execute(&mut *self.tx)
        .await?;

        Ok(UnsubscribeToken {
            token,
            subscription_id: subscription_id.to_string(),
            used: false,
            expires_at,
        })
    }

    pub async fn unsubscribe_token_by_value(
        &mut self,
        token: &str,
    ) -> Result<Option<UnsubscribeToken>, StoreError> {
        let row = sqlx::query(
            "SELECT token, subscription_id, used, expires_at FROM unsubscribe_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|row| UnsubscribeToken {
            token: row.get("token"),
            subscription_id: row.get("subscription_id"),
            used: row.get("used"),
            expires_at: from_ts(row.get("expires_at")),
        }))
    }

    pub async fn mark_token_used(&mut self, token: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE unsubscribe_tokens SET used = 1 WHERE token = ?")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    // --- schedules (backing rows for the schedule registry) ---

    /// Insert a one-shot schedule. Collision on the canonical id is not an
    /// error.
    pub async fn insert_schedule(&mut self, row: &ScheduleRow) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO schedules (id, event_id, subscription_id, offset_seconds, fire_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.event_id)
        .bind(&row.subscription_id)
        .bind(row.offset_seconds)
        .bind(row.fire_at.timestamp())
        .bind(Utc::now().timestamp())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn schedule_exists(&mut self, id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM schedules WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.is_some())
    }

    /// Delete every schedule whose id starts with `prefix`. "Nothing
    /// matched" is a success; returns the number removed.
    pub async fn delete_schedules_by_prefix(&mut self, prefix: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM schedules WHERE id LIKE ? || '%'")
            .bind(prefix)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_schedule(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn schedules_with_prefix(
        &mut self,
        prefix: &str,
    ) -> Result<Vec<ScheduleRow>, StoreError> {
        let rows = sqlx::query("SELECT * FROM schedules WHERE id LIKE ? || '%' ORDER BY id")
            .bind(prefix)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(map_schedule).collect())
    }

    /// Schedules due at or before `now`, oldest first.
    pub async fn due_schedules(
        &mut self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ScheduleRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM schedules WHERE fire_at <= ? ORDER BY fire_at, id LIMIT ?",
        )
        .bind(now.timestamp())
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(map_schedule).collect())
    }
}

fn from_ts(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

fn map_event(row: SqliteRow) -> Result<Event, StoreError> {
    Ok(Event {
        id: row.get("id"),
        name: row.get("name"),
        start_date: from_ts(row.get("start_date")),
        end_date: row.get::<Option<i64>, _>("end_date").map(from_ts),
        description: row.get("description"),
        location: row.get("location"),
        public: row.get("public"),
        organizer_id: row.get("organizer_id"),
        organization_id: row.get("organization_id"),
        workflow_id: row.get("workflow_id"),
    })
}

fn map_channel(row: SqliteRow) -> Result<Channel, StoreError> {
    Ok(Channel {
        id: row.get("id"),
        subscriber_id: row.get("subscriber_id"),
        organization_id: row.get("organization_id"),
        name: row.get("name"),
        url: CipherUrl::from_stored(row.get("url_cipher")),
        tag: row.get("tag"),
        active: row.get("active"),
    })
}

fn map_schedule(row: SqliteRow) -> ScheduleRow {
    ScheduleRow {
        id: row.get("id"),
        event_id: row.get("event_id"),
        subscription_id: row.get("subscription_id"),
        offset_seconds: row.get("offset_seconds"),
        fire_at: from_ts(row.get("fire_at")),
    }
}
