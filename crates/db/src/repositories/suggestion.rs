use clubbot_core::domain::suggestion::{
    Suggestion, SuggestionCategory, SuggestionId, SuggestionStatus,
};

use super::RepositoryError;
use crate::entities::{suggestion_category_partition, SUGGESTION_PARTITION};
use crate::keys::{IndexQuery, SortCondition};
use crate::table::SingleTable;

#[derive(Clone)]
pub struct SuggestionRepository {
    table: SingleTable,
}

impl SuggestionRepository {
    pub fn new(table: SingleTable) -> Self {
        Self { table }
    }

    pub async fn find_by_id(
        &self,
        id: &SuggestionId,
    ) -> Result<Option<Suggestion>, RepositoryError> {
        self.table.get(id).await
    }

    pub async fn save(&self, suggestion: &Suggestion) -> Result<(), RepositoryError> {
        self.table.put(suggestion).await
    }

    /// Newest first, optionally restricted to one status.
    pub async fn list(
        &self,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>, RepositoryError> {
        let mut query = IndexQuery::gsi1(SUGGESTION_PARTITION);
        if let Some(status) = status {
            query = query.sort(SortCondition::BeginsWith(format!("{}#", status.as_str())));
        }

        let mut suggestions: Vec<Suggestion> = self.table.query(query).await?;
        suggestions.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
        });
        Ok(suggestions)
    }

    /// Newest first.
    pub async fn list_by_category(
        &self,
        category: SuggestionCategory,
    ) -> Result<Vec<Suggestion>, RepositoryError> {
        self.table
            .query(IndexQuery::gsi2(suggestion_category_partition(category.as_str())).descending())
            .await
    }
}
