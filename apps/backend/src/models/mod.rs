//! Database entities and API request/response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use srs_core::{MemoryState, Phase};

// === Enums backed by PostgreSQL types ===

/// JLPT proficiency level. Declaration order matches the `jlpt_level`
/// PostgreSQL enum, so `ORDER BY` ascends from elementary to advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "jlpt_level")]
pub enum JlptLevel {
    N5,
    N4,
    N3,
    N2,
    N1,
}

impl JlptLevel {
    pub const ALL: [JlptLevel; 5] = [Self::N5, Self::N4, Self::N3, Self::N2, Self::N1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::N5 => "N5",
            Self::N4 => "N4",
            Self::N3 => "N3",
            Self::N2 => "N2",
            Self::N1 => "N1",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "N5" => Some(Self::N5),
            "N4" => Some(Self::N4),
            "N3" => Some(Self::N3),
            "N2" => Some(Self::N2),
            "N1" => Some(Self::N1),
            _ => None,
        }
    }
}

/// Which item table a memory card points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Vocab,
    Kanji,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vocab => "vocab",
            Self::Kanji => "kanji",
        }
    }
}

// === Entities ===

/// One vocabulary item seeded from JMdict. Read-only after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vocab {
    pub id: i64,
    pub word: String,
    pub reading: String,
    pub meaning: String,
    pub part_of_speech: String,
    pub jlpt_level: JlptLevel,
    pub example_jp: Option<String>,
    pub example_en: Option<String>,
}

/// One kanji entry sourced from KANJIDIC2. Read-only after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Kanji {
    pub id: i64,
    pub character: String,
    pub on_yomi: Vec<String>,
    pub kun_yomi: Vec<String>,
    pub meaning: Vec<String>,
    pub stroke_count: i32,
    pub jlpt_level: Option<JlptLevel>,
    pub freq_rank: Option<i32>,
    pub example_word: Option<String>,
    pub example_sentence: Option<String>,
}

/// Per-item memory record. One row per (item_type, item_id) pair, created
/// the first time the learner reviews an item.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SrsCard {
    pub id: i64,
    pub item_type: ItemType,
    pub item_id: i64,
    pub ease_factor: f64,
    pub interval_days: i32,
    pub reps: i32,
    pub due_date: NaiveDate,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SrsCard {
    pub fn memory_state(&self) -> MemoryState {
        MemoryState {
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
            reps: self.reps,
        }
    }

    pub fn to_response(&self) -> CardResponse {
        CardResponse {
            card_id: self.id,
            item_type: self.item_type,
            item_id: self.item_id,
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
            reps: self.reps,
            due_date: self.due_date,
            phase: self.memory_state().phase(),
        }
    }
}

/// Append-only audit record of a single graded review.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReviewLog {
    pub id: i64,
    pub session_id: i64,
    pub card_id: i64,
    pub grade: i32,
    pub reviewed_at: DateTime<Utc>,
}

/// A contiguous block of reviews opened and closed by the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudySession {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cards_reviewed: i32,
    pub correct: i32,
    pub incorrect: i32,
}

/// Flat key-value row from the meta table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

// === API response shapes ===

/// Memory-card fields as exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardResponse {
    pub card_id: i64,
    pub item_type: ItemType,
    pub item_id: i64,
    pub ease_factor: f64,
    pub interval_days: i32,
    pub reps: i32,
    pub due_date: NaiveDate,
    pub phase: Phase,
}

/// A learnable item, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "lowercase")]
pub enum StudyItem {
    Vocab(Vocab),
    Kanji(Kanji),
}

impl StudyItem {
    pub fn item_id(&self) -> i64 {
        match self {
            Self::Vocab(v) => v.id,
            Self::Kanji(k) => k.id,
        }
    }

    pub fn jlpt_level(&self) -> Option<JlptLevel> {
        match self {
            Self::Vocab(v) => Some(v.jlpt_level),
            Self::Kanji(k) => k.jlpt_level,
        }
    }

    pub fn freq_rank(&self) -> Option<i32> {
        match self {
            Self::Vocab(_) => None,
            Self::Kanji(k) => k.freq_rank,
        }
    }
}

/// A due memory card joined with its item for the flashcard view.
#[derive(Debug, Clone, Serialize)]
pub struct DueCard {
    pub card: CardResponse,
    pub item: StudyItem,
}

// === API request/query shapes ===

#[derive(Debug, Deserialize)]
pub struct CardsQuery {
    pub level: Option<JlptLevel>,
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub item_type: ItemType,
    pub item_id: i64,
    pub score: i64,
    pub session_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub card: CardResponse,
    pub next_due: NaiveDate,
    pub session_correct: i32,
    pub session_incorrect: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStartResponse {
    pub id: i64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub level: Option<JlptLevel>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One page of a browse listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

// === Progress shapes ===

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct LevelStats {
    pub level: JlptLevel,
    pub total: i64,
    pub seen: i64,
    pub mastered: i64,
    pub due_today: i64,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub streak_days: i64,
    /// Percent, 0-100.
    pub all_time_accuracy: f64,
    pub total_reviews: i64,
    pub level_stats: Vec<LevelStats>,
    pub forecast: Vec<ForecastDay>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jlpt_level_round_trips_through_strings() {
        for level in JlptLevel::ALL {
            assert_eq!(JlptLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(JlptLevel::parse("N6"), None);
        assert_eq!(JlptLevel::parse("n5"), None);
    }

    #[test]
    fn study_item_serializes_with_kind_tag() {
        let item = StudyItem::Vocab(Vocab {
            id: 1,
            word: "食べる".into(),
            reading: "たべる".into(),
            meaning: "to eat".into(),
            part_of_speech: "verb".into(),
            jlpt_level: JlptLevel::N5,
            example_jp: None,
            example_en: None,
        });

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["item_type"], "vocab");
        assert_eq!(json["word"], "食べる");
    }

    #[test]
    fn card_response_reports_phase() {
        let card = SrsCard {
            id: 7,
            item_type: ItemType::Kanji,
            item_id: 3,
            ease_factor: 2.2,
            interval_days: 30,
            reps: 6,
            due_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            last_reviewed: None,
            created_at: Utc::now(),
        };
        assert_eq!(card.to_response().phase, Phase::Mature);
    }

    #[test]
    fn new_item_ordering_keys() {
        let kanji = StudyItem::Kanji(Kanji {
            id: 9,
            character: "日".into(),
            on_yomi: vec!["ニチ".into()],
            kun_yomi: vec!["ひ".into()],
            meaning: vec!["day".into(), "sun".into()],
            stroke_count: 4,
            jlpt_level: Some(JlptLevel::N5),
            freq_rank: Some(1),
            example_word: Some("日本".into()),
            example_sentence: None,
        });
        assert_eq!(kanji.item_id(), 9);
        assert_eq!(kanji.jlpt_level(), Some(JlptLevel::N5));
        assert_eq!(kanji.freq_rank(), Some(1));
    }
}
