use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::models::routine::RoutineExercise;

pub const SHARE_CODE_LENGTH: usize = 6;
pub const SHARE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Public snapshot of a routine, addressed by a short code
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SharedRoutine {
    pub id: Uuid,
    pub code: String,
    pub routine_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub exercises: Json<Vec<RoutineExercise>>,
    pub import_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What anonymous visitors see for a code; owner identity is withheld
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedRoutinePreview {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub exercises: Vec<RoutineExercise>,
    pub import_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<SharedRoutine> for SharedRoutinePreview {
    fn from(shared: SharedRoutine) -> Self {
        Self {
            code: shared.code,
            name: shared.name,
            description: shared.description,
            exercises: shared.exercises.0,
            import_count: shared.import_count,
            created_at: shared.created_at,
        }
    }
}

/// Codes are matched case-insensitively; `None` when the input cannot be a code
pub fn normalize_share_code(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    let valid = code.len() == SHARE_CODE_LENGTH
        && code.bytes().all(|b| SHARE_CODE_ALPHABET.contains(&b));
    valid.then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_share_code() {
        assert_eq!(normalize_share_code("ab12cd"), Some("AB12CD".to_string()));
        assert_eq!(normalize_share_code(" XYZ789 "), Some("XYZ789".to_string()));
        assert_eq!(normalize_share_code("ABC"), None);
        assert_eq!(normalize_share_code("ABC-12"), None);
        assert_eq!(normalize_share_code("ABCDEFG"), None);
    }
}
