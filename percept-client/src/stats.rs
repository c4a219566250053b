//! Aggregate statistics
//!
//! Dashboard figures are derived on demand and never cached. Per-profession
//! aggregates are recomputed from the rating rows after every submission
//! and written back to the profession record.

use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use percept_common::db::{CategoryTotal, DashboardStats, ProfessionStats};
use percept_common::Backend;

use crate::error::ClientResult;

pub struct StatsAggregator {
    backend: Arc<dyn Backend>,
}

impl StatsAggregator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Total votes, mean perception and profession count
    ///
    /// The mean is the unweighted mean of per-profession averages, so a
    /// profession with one vote weighs as much as one with a thousand.
    pub async fn compute_dashboard_stats(&self) -> ClientResult<DashboardStats> {
        let total_votes = self.backend.count_ratings().await.map_err(|e| {
            error!("Failed to count ratings: {}", e);
            e
        })?;
        let averages = self.backend.profession_averages().await.map_err(|e| {
            error!("Failed to load profession averages: {}", e);
            e
        })?;

        let profession_count = self.backend.count_professions().await.map_err(|e| {
            error!("Failed to count professions: {}", e);
            e
        })?;

        let stats = DashboardStats {
            total_votes,
            mean_perception: mean(&averages),
            profession_count,
        };
        debug!(
            total_votes = stats.total_votes,
            mean_perception = stats.mean_perception,
            profession_count = stats.profession_count,
            "Dashboard stats computed"
        );
        Ok(stats)
    }

    /// Recompute one profession's aggregates and persist them
    pub async fn recompute_profession_stats(&self, profession_id: Uuid) -> ClientResult<ProfessionStats> {
        let scores = self
            .backend
            .rating_scores(Some(profession_id))
            .await
            .map_err(|e| {
                error!(profession_id = %profession_id, "Failed to load rating scores: {}", e);
                e
            })?;
        let comments_count = self.backend.count_comments(profession_id).await.map_err(|e| {
            error!(profession_id = %profession_id, "Failed to count comments: {}", e);
            e
        })?;

        let stats = ProfessionStats {
            avg_rating: mean_score(&scores),
            total_ratings: scores.len() as i64,
            comments_count,
        };

        self.backend
            .update_profession_stats(profession_id, &stats)
            .await
            .map_err(|e| {
                error!(profession_id = %profession_id, "Failed to write profession stats: {}", e);
                e
            })?;

        debug!(
            profession_id = %profession_id,
            avg_rating = stats.avg_rating,
            total_ratings = stats.total_ratings,
            comments_count = stats.comments_count,
            "Profession stats recomputed"
        );
        Ok(stats)
    }

    /// Votes per category, in first-seen category order
    pub async fn category_distribution(&self) -> ClientResult<Vec<CategoryTotal>> {
        let rows = self.backend.category_totals().await.map_err(|e| {
            error!("Failed to load category totals: {}", e);
            e
        })?;
        Ok(sum_by_category(rows))
    }

    /// Number of ratings for each score 1 through 5
    pub async fn perception_distribution(&self) -> ClientResult<[u64; 5]> {
        let scores = self.backend.rating_scores(None).await.map_err(|e| {
            error!("Failed to load rating scores: {}", e);
            e
        })?;
        Ok(score_histogram(&scores))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn mean_score(scores: &[i64]) -> f64 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<i64>() as f64 / scores.len() as f64
    }
}

fn sum_by_category(rows: Vec<CategoryTotal>) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for row in rows {
        match totals.iter_mut().find(|t| t.category == row.category) {
            Some(existing) => existing.total_ratings += row.total_ratings,
            None => totals.push(row),
        }
    }
    totals
}

fn score_histogram(scores: &[i64]) -> [u64; 5] {
    let mut counts = [0u64; 5];
    for &score in scores {
        if (1..=5).contains(&score) {
            counts[(score - 1) as usize] += 1;
        }
    }
    counts
}
