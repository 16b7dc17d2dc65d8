//! Result Projection: a ranked, renderable view derived from a batch snapshot.
//! Pure; holds no state of its own and is recomputed on every mutation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::batch::{BatchItem, ItemStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    #[default]
    Submission,
    Score,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// 1-based position among completed rows; `None` for failed rows.
    pub rank: Option<usize>,
    pub item_id: Uuid,
    pub file_name: String,
    pub display_name: String,
    pub status: ItemStatus,
    pub failed: bool,
    pub match_score: i64,
    pub analysis: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateProgress {
    pub total: usize,
    pub ready: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
    /// Mean per-item progress; terminal items count as 100.
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub order: RankOrder,
    pub rows: Vec<ResultRow>,
    pub progress: AggregateProgress,
}

pub fn project(items: &[BatchItem], order: RankOrder) -> ResultView {
    let mut completed: Vec<ResultRow> = Vec::new();
    let mut rows: Vec<ResultRow> = Vec::new();

    for item in items.iter().filter(|i| i.status().is_terminal()) {
        let row = row_for(item);
        match (order, item.status()) {
            (RankOrder::Score, ItemStatus::Completed) => completed.push(row),
            _ => rows.push(row),
        }
    }

    if order == RankOrder::Score {
        // Stable sort keeps submission order among equal scores.
        completed.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        completed.append(&mut rows);
        rows = completed;
    }

    let mut rank = 0;
    for row in rows.iter_mut().filter(|r| !r.failed) {
        rank += 1;
        row.rank = Some(rank);
    }

    ResultView {
        order,
        rows,
        progress: aggregate(items),
    }
}

fn row_for(item: &BatchItem) -> ResultRow {
    let result = item.result();
    ResultRow {
        rank: None,
        item_id: item.id(),
        file_name: item.source().name.clone(),
        display_name: result
            .map(|r| r.candidate_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| item.source().name.clone()),
        status: item.status(),
        failed: item.status() == ItemStatus::Failed,
        match_score: result.map(|r| r.match_score).unwrap_or(0),
        analysis: result.and_then(|r| r.analysis.clone()).unwrap_or_default(),
        error: item.error().map(str::to_string),
    }
}

pub fn aggregate(items: &[BatchItem]) -> AggregateProgress {
    let mut progress = AggregateProgress {
        total: items.len(),
        ..Default::default()
    };
    let mut sum: u64 = 0;

    for item in items {
        match item.status() {
            ItemStatus::Ready => progress.ready += 1,
            ItemStatus::Reading | ItemStatus::Scoring => progress.in_flight += 1,
            ItemStatus::Completed => progress.completed += 1,
            ItemStatus::Failed => progress.failed += 1,
        }
        sum += if item.status().is_terminal() {
            100
        } else {
            u64::from(item.progress_hint())
        };
    }

    if !items.is_empty() {
        progress.percent = (sum / items.len() as u64) as u8;
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::batch::ItemResult;
    use crate::scoring::testing::missing_source;

    fn completed(name: &str, candidate: &str, score: i64) -> BatchItem {
        let mut item = BatchItem::new(missing_source(name));
        item.begin_reading().unwrap();
        item.begin_scoring().unwrap();
        item.complete(ItemResult {
            candidate_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            candidate_name: candidate.to_string(),
            role_guess: "Engineer".to_string(),
            match_score: score,
            analysis: Some(format!("{candidate} notes")),
        })
        .unwrap();
        item
    }

    fn failed(name: &str) -> BatchItem {
        let mut item = BatchItem::new(missing_source(name));
        item.begin_reading().unwrap();
        item.begin_scoring().unwrap();
        item.fail("oracle unavailable").unwrap();
        item
    }

    fn scoring(name: &str) -> BatchItem {
        let mut item = BatchItem::new(missing_source(name));
        item.begin_reading().unwrap();
        item.begin_scoring().unwrap();
        item
    }

    #[test]
    fn test_submission_order_excludes_pending_items() {
        let items = vec![
            completed("a.pdf", "Ann", 60),
            failed("b.pdf"),
            completed("c.pdf", "Cy", 90),
            scoring("d.pdf"),
            BatchItem::new(missing_source("e.pdf")),
        ];

        let view = project(&items, RankOrder::Submission);

        let names: Vec<_> = view.rows.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(view.rows[0].rank, Some(1));
        assert_eq!(view.rows[1].rank, None);
        assert!(view.rows[1].failed);
        assert_eq!(view.rows[1].error.as_deref(), Some("oracle unavailable"));
        assert_eq!(view.rows[2].rank, Some(2));
    }

    #[test]
    fn test_score_order_ranks_completed_and_trails_failed() {
        let items = vec![
            completed("a.pdf", "Ann", 60),
            failed("b.pdf"),
            completed("c.pdf", "Cy", 90),
            completed("d.pdf", "Di", 60),
        ];

        let view = project(&items, RankOrder::Score);

        let names: Vec<_> = view.rows.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["Cy", "Ann", "Di", "b.pdf"]);
        let ranks: Vec<_> = view.rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![Some(1), Some(2), Some(3), None]);
    }

    #[test]
    fn test_row_columns_come_from_result() {
        let view = project(&[completed("a.pdf", "Ann", 75)], RankOrder::default());
        let row = &view.rows[0];
        assert_eq!(row.display_name, "Ann");
        assert_eq!(row.match_score, 75);
        assert_eq!(row.analysis, "Ann notes");
        assert!(!row.failed);
        assert!(row.error.is_none());
    }

    #[test]
    fn test_failed_row_defaults() {
        let view = project(&[failed("b.pdf")], RankOrder::Submission);
        let row = &view.rows[0];
        assert_eq!(row.display_name, "b.pdf");
        assert_eq!(row.match_score, 0);
        assert_eq!(row.analysis, "");
    }

    #[test]
    fn test_aggregate_progress() {
        let items = vec![
            completed("a.pdf", "Ann", 60),
            failed("b.pdf"),
            scoring("c.pdf"),
            BatchItem::new(missing_source("d.pdf")),
        ];

        let progress = aggregate(&items);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.in_flight, 1);
        assert_eq!(progress.ready, 1);
        // (100 + 100 + 30 + 0) / 4
        assert_eq!(progress.percent, 57);
    }

    #[test]
    fn test_empty_batch() {
        let view = project(&[], RankOrder::Score);
        assert!(view.rows.is_empty());
        assert_eq!(view.progress, AggregateProgress::default());
    }
}
