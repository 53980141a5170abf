//! PostgreSQL store. Sole gateway to persistent state.
//!
//! Every other component goes through `Database`; no handler holds a
//! connection beyond a single call. The one multi-statement write path
//! (review submission) runs as a single transaction.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use srs_core::{Grade, MemoryState};

use crate::error::{ApiError, Result};
use crate::models::*;

const SRS_CARD_COLUMNS: &str =
    "id, item_type, item_id, ease_factor, interval_days, reps, due_date, last_reviewed, created_at";

/// Database wrapper with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create the connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run the versioned migration chain.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Internal(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Cheap liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // === Vocabulary ===

    pub async fn get_vocab(&self, id: i64) -> Result<Option<Vocab>> {
        let row = sqlx::query_as::<_, Vocab>("SELECT * FROM vocab WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Paginated vocabulary listing with optional level filter and
    /// case-insensitive search over word, reading, and gloss.
    pub async fn list_vocab(
        &self,
        level: Option<JlptLevel>,
        search: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Vocab>, i64)> {
        let pattern = search.map(|q| format!("%{q}%"));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM vocab
            WHERE ($1::jlpt_level IS NULL OR jlpt_level = $1)
              AND ($2::text IS NULL
                   OR word ILIKE $2 OR reading ILIKE $2 OR meaning ILIKE $2)
            "#,
        )
        .bind(level)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Vocab>(
            r#"
            SELECT * FROM vocab
            WHERE ($1::jlpt_level IS NULL OR jlpt_level = $1)
              AND ($2::text IS NULL
                   OR word ILIKE $2 OR reading ILIKE $2 OR meaning ILIKE $2)
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(level)
        .bind(&pattern)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&self.pool)
        .await?;

        Ok((items, total))
    }

    // === Kanji ===

    pub async fn get_kanji(&self, character: &str) -> Result<Option<Kanji>> {
        let row = sqlx::query_as::<_, Kanji>("SELECT * FROM kanji WHERE kanji.character = $1")
            .bind(character)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_kanji(
        &self,
        level: Option<JlptLevel>,
        search: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Kanji>, i64)> {
        let pattern = search.map(|q| format!("%{q}%"));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM kanji
            WHERE ($1::jlpt_level IS NULL OR jlpt_level = $1)
              AND ($2::text IS NULL
                   OR kanji.character ILIKE $2
                   OR array_to_string(on_yomi, ' ') ILIKE $2
                   OR array_to_string(kun_yomi, ' ') ILIKE $2
                   OR array_to_string(meaning, ' ') ILIKE $2)
            "#,
        )
        .bind(level)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Kanji>(
            r#"
            SELECT * FROM kanji
            WHERE ($1::jlpt_level IS NULL OR jlpt_level = $1)
              AND ($2::text IS NULL
                   OR kanji.character ILIKE $2
                   OR array_to_string(on_yomi, ' ') ILIKE $2
                   OR array_to_string(kun_yomi, ' ') ILIKE $2
                   OR array_to_string(meaning, ' ') ILIKE $2)
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(level)
        .bind(&pattern)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&self.pool)
        .await?;

        Ok((items, total))
    }

    /// Whether an item row exists for the given kind and id.
    pub async fn item_exists(&self, item_type: ItemType, item_id: i64) -> Result<bool> {
        let sql = match item_type {
            ItemType::Vocab => "SELECT EXISTS (SELECT 1 FROM vocab WHERE id = $1)",
            ItemType::Kanji => "SELECT EXISTS (SELECT 1 FROM kanji WHERE id = $1)",
        };
        let exists: bool = sqlx::query_scalar(sql)
            .bind(item_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    // === Memory cards ===

    pub async fn get_card(&self, item_type: ItemType, item_id: i64) -> Result<Option<SrsCard>> {
        let row = sqlx::query_as::<_, SrsCard>(&format!(
            "SELECT {SRS_CARD_COLUMNS} FROM srs_cards WHERE item_type = $1 AND item_id = $2"
        ))
        .bind(item_type)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Cards due on or before `today`, joined with their items, most
    /// overdue first and tie-broken by card id. When no item kind is given
    /// both kinds are fetched and merged preserving that order.
    pub async fn due_cards(
        &self,
        level: Option<JlptLevel>,
        item_type: Option<ItemType>,
        limit: i64,
        today: NaiveDate,
    ) -> Result<Vec<DueCard>> {
        let mut cards = Vec::new();
        if item_type.is_none() || item_type == Some(ItemType::Vocab) {
            cards.extend(self.due_vocab_cards(level, limit, today).await?);
        }
        if item_type.is_none() || item_type == Some(ItemType::Kanji) {
            cards.extend(self.due_kanji_cards(level, limit, today).await?);
        }

        cards.sort_by_key(|d| (d.card.due_date, d.card.card_id));
        cards.truncate(limit as usize);
        Ok(cards)
    }

    async fn due_vocab_cards(
        &self,
        level: Option<JlptLevel>,
        limit: i64,
        today: NaiveDate,
    ) -> Result<Vec<DueCard>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id AS card_id, c.item_type, c.item_id, c.ease_factor,
                   c.interval_days, c.reps, c.due_date, c.last_reviewed, c.created_at,
                   v.id, v.word, v.reading, v.meaning, v.part_of_speech,
                   v.jlpt_level, v.example_jp, v.example_en
            FROM srs_cards c
            JOIN vocab v ON v.id = c.item_id
            WHERE c.item_type = 'vocab'
              AND c.due_date <= $1
              AND ($2::jlpt_level IS NULL OR v.jlpt_level = $2)
            ORDER BY c.due_date, c.id
            LIMIT $3
            "#,
        )
        .bind(today)
        .bind(level)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let card = card_from_joined_row(row)?;
                let item = Vocab::from_row(row)?;
                Ok(DueCard {
                    card: card.to_response(),
                    item: StudyItem::Vocab(item),
                })
            })
            .collect()
    }

    async fn due_kanji_cards(
        &self,
        level: Option<JlptLevel>,
        limit: i64,
        today: NaiveDate,
    ) -> Result<Vec<DueCard>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id AS card_id, c.item_type, c.item_id, c.ease_factor,
                   c.interval_days, c.reps, c.due_date, c.last_reviewed, c.created_at,
                   k.id, k.character, k.on_yomi, k.kun_yomi, k.meaning,
                   k.stroke_count, k.jlpt_level, k.freq_rank,
                   k.example_word, k.example_sentence
            FROM srs_cards c
            JOIN kanji k ON k.id = c.item_id
            WHERE c.item_type = 'kanji'
              AND c.due_date <= $1
              AND ($2::jlpt_level IS NULL OR k.jlpt_level = $2)
            ORDER BY c.due_date, c.id
            LIMIT $3
            "#,
        )
        .bind(today)
        .bind(level)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let card = card_from_joined_row(row)?;
                let item = Kanji::from_row(row)?;
                Ok(DueCard {
                    card: card.to_response(),
                    item: StudyItem::Kanji(item),
                })
            })
            .collect()
    }

    /// Items with no memory card yet, ordered JLPT level N5→N1, then
    /// frequency rank (kanji, ranked first), then id. Vocab sorts before
    /// kanji within a level since it carries no frequency rank.
    pub async fn new_items(
        &self,
        level: Option<JlptLevel>,
        item_type: Option<ItemType>,
        limit: i64,
    ) -> Result<Vec<StudyItem>> {
        let mut items = Vec::new();

        if item_type.is_none() || item_type == Some(ItemType::Vocab) {
            let rows = sqlx::query_as::<_, Vocab>(
                r#"
                SELECT v.* FROM vocab v
                WHERE NOT EXISTS (
                        SELECT 1 FROM srs_cards c
                        WHERE c.item_type = 'vocab' AND c.item_id = v.id)
                  AND ($1::jlpt_level IS NULL OR v.jlpt_level = $1)
                ORDER BY v.jlpt_level, v.id
                LIMIT $2
                "#,
            )
            .bind(level)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            items.extend(rows.into_iter().map(StudyItem::Vocab));
        }

        if item_type.is_none() || item_type == Some(ItemType::Kanji) {
            let rows = sqlx::query_as::<_, Kanji>(
                r#"
                SELECT k.* FROM kanji k
                WHERE NOT EXISTS (
                        SELECT 1 FROM srs_cards c
                        WHERE c.item_type = 'kanji' AND c.item_id = k.id)
                  AND ($1::jlpt_level IS NULL OR k.jlpt_level = $1)
                ORDER BY k.jlpt_level NULLS LAST, k.freq_rank NULLS LAST, k.id
                LIMIT $2
                "#,
            )
            .bind(level)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            items.extend(rows.into_iter().map(StudyItem::Kanji));
        }

        items.sort_by_key(|item| {
            (
                item.jlpt_level().map(|l| l as u8).unwrap_or(u8::MAX),
                matches!(item, StudyItem::Kanji(_)) as u8,
                item.freq_rank().map(i64::from).unwrap_or(i64::MAX),
                item.item_id(),
            )
        });
        items.truncate(limit as usize);
        Ok(items)
    }

    /// Cards created within `[from, to)`, the intake-cap counter.
    pub async fn cards_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM srs_cards WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Persist one review atomically: bump the session counters, create or
    /// update the card, and append a review_log row. Any failure rolls the
    /// whole submission back.
    ///
    /// A concurrent first review of the same item races on the
    /// (item_type, item_id) unique constraint; the loser surfaces an
    /// integrity error rather than silently merging.
    #[allow(clippy::too_many_arguments)]
    pub async fn review_transaction(
        &self,
        card_id: Option<i64>,
        item_type: ItemType,
        item_id: i64,
        after: &MemoryState,
        due: NaiveDate,
        grade: Grade,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(SrsCard, StudySession)> {
        let mut tx = self.pool.begin().await?;

        let (correct, incorrect) = if grade.is_correct() { (1, 0) } else { (0, 1) };
        let session = sqlx::query_as::<_, StudySession>(
            r#"
            UPDATE study_sessions
            SET cards_reviewed = cards_reviewed + 1,
                correct = correct + $2,
                incorrect = incorrect + $3
            WHERE id = $1
            RETURNING id, started_at, ended_at, cards_reviewed, correct, incorrect
            "#,
        )
        .bind(session_id)
        .bind(correct)
        .bind(incorrect)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id} not found")))?;

        let card = match card_id {
            Some(id) => {
                sqlx::query_as::<_, SrsCard>(&format!(
                    r#"
                    UPDATE srs_cards
                    SET ease_factor = $2, interval_days = $3, reps = $4,
                        due_date = $5, last_reviewed = $6
                    WHERE id = $1
                    RETURNING {SRS_CARD_COLUMNS}
                    "#
                ))
                .bind(id)
                .bind(after.ease_factor)
                .bind(after.interval_days)
                .bind(after.reps)
                .bind(due)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, SrsCard>(&format!(
                    r#"
                    INSERT INTO srs_cards
                        (item_type, item_id, ease_factor, interval_days, reps,
                         due_date, last_reviewed, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                    RETURNING {SRS_CARD_COLUMNS}
                    "#
                ))
                .bind(item_type)
                .bind(item_id)
                .bind(after.ease_factor)
                .bind(after.interval_days)
                .bind(after.reps)
                .bind(due)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        sqlx::query(
            "INSERT INTO review_log (session_id, card_id, grade, reviewed_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(card.id)
        .bind(i32::from(grade.score()))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((card, session))
    }

    // === Study sessions ===

    pub async fn open_session(&self, now: DateTime<Utc>) -> Result<StudySession> {
        let session = sqlx::query_as::<_, StudySession>(
            r#"
            INSERT INTO study_sessions (started_at)
            VALUES ($1)
            RETURNING id, started_at, ended_at, cards_reviewed, correct, incorrect
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    /// Close a session. Returns false when no such session exists. Closing
    /// an already-closed session keeps its original end time.
    pub async fn close_session(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let closed = sqlx::query_scalar::<_, i64>(
            "UPDATE study_sessions SET ended_at = COALESCE(ended_at, $2) \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(closed.is_some())
    }

    /// Close every open session, stamping the end at its latest review (or
    /// its start when it saw none). Safe to run repeatedly.
    pub async fn sweep_open_sessions(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE study_sessions s
            SET ended_at = GREATEST(
                    s.started_at,
                    COALESCE((SELECT MAX(r.reviewed_at)
                              FROM review_log r
                              WHERE r.session_id = s.id), s.started_at))
            WHERE s.ended_at IS NULL
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // === Meta ===

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM meta WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    pub async fn all_meta(&self) -> Result<Vec<MetaEntry>> {
        let rows = sqlx::query_as::<_, MetaEntry>("SELECT key, value FROM meta ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Write a default only when the key is absent.
    pub async fn seed_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT INTO meta (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // === Aggregates ===

    /// (total, correct) review counts across the whole log.
    pub async fn review_totals(&self) -> Result<(i64, i64)> {
        let totals: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE grade >= 3) FROM review_log",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    /// Per-level totals across vocab and kanji in one statement. Levels
    /// without any items are absent; callers zero-fill.
    pub async fn level_stats(&self, today: NaiveDate) -> Result<Vec<LevelStats>> {
        let rows = sqlx::query_as::<_, LevelStats>(
            r#"
            SELECT items.level AS level,
                   COUNT(*) AS total,
                   COUNT(c.id) AS seen,
                   COUNT(c.id) FILTER (WHERE c.interval_days >= 21) AS mastered,
                   COUNT(c.id) FILTER (WHERE c.due_date <= $1) AS due_today
            FROM (
                SELECT id, 'vocab'::item_kind AS kind, jlpt_level AS level FROM vocab
                UNION ALL
                SELECT id, 'kanji'::item_kind AS kind, jlpt_level AS level
                FROM kanji WHERE jlpt_level IS NOT NULL
            ) AS items
            LEFT JOIN srs_cards c ON c.item_type = items.kind AND c.item_id = items.id
            GROUP BY items.level
            ORDER BY items.level
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Due-count per day for `[today, today + days)`. Empty days are
    /// absent; callers zero-fill.
    pub async fn due_forecast(&self, today: NaiveDate, days: i64) -> Result<Vec<ForecastDay>> {
        let until = today + chrono::Days::new((days - 1).max(0) as u64);
        let rows = sqlx::query_as::<_, ForecastDay>(
            r#"
            SELECT due_date AS date, COUNT(*) AS count
            FROM srs_cards
            WHERE due_date >= $1 AND due_date <= $2
            GROUP BY due_date
            ORDER BY due_date
            "#,
        )
        .bind(today)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Every review timestamp, newest first. The streak buckets these into
    /// local civil days app-side, since the host timezone is not visible
    /// to the database session.
    pub async fn review_timestamps(&self) -> Result<Vec<DateTime<Utc>>> {
        let rows: Vec<DateTime<Utc>> =
            sqlx::query_scalar("SELECT reviewed_at FROM review_log ORDER BY reviewed_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    // === Tutor context ===

    /// Surface forms of the most recently reviewed items.
    pub async fn recent_review_words(&self, limit: i64) -> Result<Vec<String>> {
        let words: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(v.word, k.character) AS word
            FROM review_log r
            JOIN srs_cards c ON c.id = r.card_id
            LEFT JOIN vocab v ON c.item_type = 'vocab' AND v.id = c.item_id
            LEFT JOIN kanji k ON c.item_type = 'kanji' AND k.id = c.item_id
            WHERE COALESCE(v.word, k.character) IS NOT NULL
            ORDER BY r.reviewed_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(words)
    }

    /// Surface forms of the cards the learner struggles with most
    /// (lowest ease factor).
    pub async fn weakest_card_words(&self, limit: i64) -> Result<Vec<String>> {
        let words: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(v.word, k.character) AS word
            FROM srs_cards c
            LEFT JOIN vocab v ON c.item_type = 'vocab' AND v.id = c.item_id
            LEFT JOIN kanji k ON c.item_type = 'kanji' AND k.id = c.item_id
            WHERE COALESCE(v.word, k.character) IS NOT NULL
            ORDER BY c.ease_factor ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(words)
    }
}

/// Extract the card half of a card-joined-with-item row; the card's id is
/// aliased `card_id` to stay clear of the item's `id` column.
fn card_from_joined_row(row: &sqlx::postgres::PgRow) -> Result<SrsCard> {
    use sqlx::Row;
    Ok(SrsCard {
        id: row.try_get("card_id")?,
        item_type: row.try_get("item_type")?,
        item_id: row.try_get("item_id")?,
        ease_factor: row.try_get("ease_factor")?,
        interval_days: row.try_get("interval_days")?,
        reps: row.try_get("reps")?,
        due_date: row.try_get("due_date")?,
        last_reviewed: row.try_get("last_reviewed")?,
        created_at: row.try_get("created_at")?,
    })
}
