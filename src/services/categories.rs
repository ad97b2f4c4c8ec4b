/// Category reconciler
///
/// Posts carry denormalized category entries (identity + name copy). This
/// service resolves candidate names on post create/update, and cascades
/// renames and deletes to every referencing post. Cascades are best-effort
/// and at-least-once: the store has no multi-document transaction, so a
/// failure partway leaves some posts stale. Partial failures are logged and
/// the writes that did succeed stay committed.
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::UpdateOptions;
use mongodb::Database;

use crate::db::Repo;
use crate::error::{AppError, Result};
use crate::models::{Category, CategoryRef, Post};

/// Result of matching one candidate name against the existing categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Existing(CategoryRef),
    Missing(String),
}

/// Bind candidate names to existing categories by case-insensitive name
/// match, keeping the stored casing. Duplicated candidates collapse onto
/// the same binding.
pub fn bind_candidates(existing: &[Category], candidates: &[String]) -> Vec<Binding> {
    candidates
        .iter()
        .map(|name| {
            let matched = existing.iter().find(|c| c.name.eq_ignore_ascii_case(name));
            match matched {
                Some(category) => match category.header.id {
                    Some(id) => Binding::Existing(CategoryRef {
                        id,
                        name: category.name.clone(),
                    }),
                    None => Binding::Missing(name.clone()),
                },
                None => Binding::Missing(name.clone()),
            }
        })
        .collect()
}

/// Filter and update for the rename cascade: every post whose category list
/// contains the id gets the matching entry's name copy rewritten.
pub fn rename_cascade(id: ObjectId, new_name: &str) -> (Document, Document) {
    (
        doc! { "categories.id": id },
        doc! { "$set": { "categories.$[entry].name": new_name } },
    )
}

/// Array filter naming the entry the rename cascade rewrites.
pub fn rename_cascade_array_filter(id: ObjectId) -> Document {
    doc! { "entry.id": id }
}

/// Filter and update for the delete cascade: the entry is pulled from every
/// referencing post's list.
pub fn delete_cascade(id: ObjectId) -> (Document, Document) {
    (
        doc! { "categories.id": id },
        doc! { "$pull": { "categories": { "id": id } } },
    )
}

pub struct CategoryReconciler {
    categories: Repo<Category>,
    posts: Repo<Post>,
}

impl CategoryReconciler {
    pub fn new(db: &Database) -> Self {
        Self {
            categories: Repo::new(db),
            posts: Repo::new(db),
        }
    }

    /// Resolve candidate names for a post write: bind existing categories
    /// by identity, create the missing ones. A candidate that still has no
    /// identity afterwards is dropped, never stored unresolved.
    pub async fn resolve(&self, candidates: &[String]) -> Result<Vec<CategoryRef>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let existing = self
            .categories
            .filter_by(doc! {}, Default::default())
            .await?;

        let mut refs = Vec::with_capacity(candidates.len());
        for binding in bind_candidates(&existing, candidates) {
            match binding {
                Binding::Existing(r) => {
                    if !refs.iter().any(|e: &CategoryRef| e.id == r.id) {
                        refs.push(r);
                    }
                }
                Binding::Missing(name) => {
                    match self.categories.insert_one(Category::new(name.clone())).await {
                        Ok(created) => {
                            if let Some(id) = created.header.id {
                                refs.push(CategoryRef {
                                    id,
                                    name: created.name,
                                });
                            }
                        }
                        Err(err) => {
                            // dropped from the post's list rather than stored unresolved
                            tracing::warn!(category = %name, "category create failed during resolve: {}", err);
                        }
                    }
                }
            }
        }
        Ok(refs)
    }

    /// Rename a category and cascade the new name onto the denormalized
    /// copy in every referencing post.
    pub async fn rename(&self, mut category: Category, new_name: String) -> Result<Category> {
        let id = category
            .header
            .id
            .ok_or_else(|| AppError::Internal("category has no identity".to_string()))?;

        category.name = new_name.clone();
        category.updated_at = Utc::now();
        self.categories.replace_by_id(id, &category).await?;

        let options = UpdateOptions::builder()
            .array_filters(vec![rename_cascade_array_filter(id)])
            .build();
        let (filter, update) = rename_cascade(id, &new_name);
        match self.posts.update_many(filter, update, options).await {
            Ok(count) => {
                tracing::debug!(category_id = %id, posts = count, "rename cascade applied");
            }
            Err(err) => {
                // at-least-once, non-atomic: stale name copies remain on some posts
                tracing::error!(category_id = %id, "rename cascade failed: {}", err);
            }
        }

        Ok(category)
    }

    /// Delete a category: remove its entry from every referencing post's
    /// list, then delete the category document.
    pub async fn delete(&self, category: &Category) -> Result<()> {
        let id = category
            .header
            .id
            .ok_or_else(|| AppError::Internal("category has no identity".to_string()))?;

        let (filter, update) = delete_cascade(id);
        match self.posts.update_many(filter, update, None).await {
            Ok(count) => {
                tracing::debug!(category_id = %id, posts = count, "delete cascade applied");
            }
            Err(err) => {
                tracing::error!(category_id = %id, "delete cascade failed: {}", err);
            }
        }

        self.categories.delete_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordMeta;

    fn category(name: &str) -> Category {
        Category {
            header: RecordMeta {
                id: Some(ObjectId::new()),
                created_at: Utc::now(),
            },
            name: name.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_bind_matches_existing_by_identity() {
        let existing = vec![category("Rust"), category("Databases")];
        let bindings = bind_candidates(&existing, &["Rust".to_string()]);
        match &bindings[0] {
            Binding::Existing(r) => {
                assert_eq!(r.id, existing[0].header.id.unwrap());
                assert_eq!(r.name, "Rust");
            }
            other => panic!("expected existing binding, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_is_case_insensitive_and_keeps_stored_casing() {
        let existing = vec![category("Rust")];
        let bindings = bind_candidates(&existing, &["rUsT".to_string()]);
        match &bindings[0] {
            Binding::Existing(r) => assert_eq!(r.name, "Rust"),
            other => panic!("expected existing binding, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_marks_unknown_names_missing() {
        let existing = vec![category("Rust")];
        let bindings = bind_candidates(&existing, &["Go".to_string(), "Rust".to_string()]);
        assert_eq!(bindings[0], Binding::Missing("Go".to_string()));
        assert!(matches!(bindings[1], Binding::Existing(_)));
    }

    #[test]
    fn test_bind_without_identity_counts_as_missing() {
        let mut unsaved = category("Draft");
        unsaved.header.id = None;
        let bindings = bind_candidates(&[unsaved], &["Draft".to_string()]);
        assert_eq!(bindings[0], Binding::Missing("Draft".to_string()));
    }

    #[test]
    fn test_rename_cascade_targets_matching_entry_only() {
        let id = ObjectId::new();
        let (filter, update) = rename_cascade(id, "Databases");

        assert_eq!(filter, doc! { "categories.id": id });
        assert_eq!(
            update,
            doc! { "$set": { "categories.$[entry].name": "Databases" } }
        );
        // the array filter pins the rewrite to the renamed entry, not the
        // whole list
        assert_eq!(rename_cascade_array_filter(id), doc! { "entry.id": id });
    }

    #[test]
    fn test_delete_cascade_pulls_entry_from_referencing_posts() {
        let id = ObjectId::new();
        let (filter, update) = delete_cascade(id);

        assert_eq!(filter, doc! { "categories.id": id });
        assert_eq!(update, doc! { "$pull": { "categories": { "id": id } } });
    }

    #[test]
    fn test_cascades_never_touch_other_categories() {
        let renamed = ObjectId::new();
        let other = ObjectId::new();

        let (filter, _) = rename_cascade(renamed, "New");
        assert_ne!(filter, doc! { "categories.id": other });
        assert_ne!(
            rename_cascade_array_filter(renamed),
            rename_cascade_array_filter(other)
        );
    }
}
