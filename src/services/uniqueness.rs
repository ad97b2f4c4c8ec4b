/// Uniqueness guard
///
/// Advisory point lookup that checks a candidate field value against
/// existing documents before a write is allowed. Name and email matching is
/// case-insensitive (collation strength 2). The guard holds no lock: a
/// conflicting write racing between the check and the insert/replace can
/// still succeed. That time-of-check-to-time-of-use window is an accepted
/// trade-off and must not be silently "fixed" with locking.
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::options::{Collation, CollationStrength, FindOneOptions};

use crate::db::Repo;
use crate::error::{AppError, Result};
use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniquenessOutcome {
    Clear,
    Conflict,
}

impl UniquenessOutcome {
    pub fn is_conflict(self) -> bool {
        matches!(self, UniquenessOutcome::Conflict)
    }
}

/// Check `field == value` against the collection, ignoring the document
/// identified by `exclude_id` (used on update so a document may keep its
/// own value).
pub async fn check_unique<T: Record>(
    repo: &Repo<T>,
    field: &str,
    value: &str,
    exclude_id: Option<ObjectId>,
) -> Result<UniquenessOutcome> {
    let collation = Collation::builder()
        .locale("en")
        .strength(CollationStrength::Secondary)
        .build();
    let options = FindOneOptions::builder().collation(collation).build();

    let found = repo.find_one_with(doc! { field: value }, options).await?;
    Ok(decide(found.map(|f| f.header().id), exclude_id))
}

/// Same check, mapped to a conflict error with a caller-supplied message.
pub async fn ensure_unique<T: Record>(
    repo: &Repo<T>,
    field: &str,
    value: &str,
    exclude_id: Option<ObjectId>,
    message: &str,
) -> Result<()> {
    match check_unique(repo, field, value, exclude_id).await? {
        UniquenessOutcome::Clear => Ok(()),
        UniquenessOutcome::Conflict => Err(AppError::Conflict(message.to_string())),
    }
}

fn decide(found: Option<Option<ObjectId>>, exclude_id: Option<ObjectId>) -> UniquenessOutcome {
    match found {
        None => UniquenessOutcome::Clear,
        Some(existing_id) => match (existing_id, exclude_id) {
            (Some(id), Some(excl)) if id == excl => UniquenessOutcome::Clear,
            _ => UniquenessOutcome::Conflict,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_is_clear() {
        assert_eq!(decide(None, None), UniquenessOutcome::Clear);
    }

    #[test]
    fn test_match_is_conflict() {
        let id = ObjectId::new();
        assert_eq!(decide(Some(Some(id)), None), UniquenessOutcome::Conflict);
    }

    #[test]
    fn test_match_on_self_is_clear_on_update() {
        let id = ObjectId::new();
        assert_eq!(decide(Some(Some(id)), Some(id)), UniquenessOutcome::Clear);
    }

    #[test]
    fn test_match_on_other_document_is_conflict_on_update() {
        let existing = ObjectId::new();
        let updating = ObjectId::new();
        assert_eq!(
            decide(Some(Some(existing)), Some(updating)),
            UniquenessOutcome::Conflict
        );
    }
}
