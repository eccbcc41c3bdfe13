//! The processing queue — the state machine at the center of shrinkray.
//!
//! The queue owns every submitted image and is the only writer of item
//! state. Items move `Queued → Processing → Completed | Failed`; a global
//! options change invalidates completed work (back to `Queued`), and a
//! failed item stays failed until the caller explicitly retries it.
//!
//! ## Two orders
//!
//! Display order (what [`ProcessingQueue::items`] returns) prepends each
//! submitted batch as a group, newest batch first, so recent work is at the
//! top. Drive order is strictly FIFO by time-of-enqueue — submitting
//! `[A, B]` then `[C]` processes `A`, `B`, `C` regardless of size or type.
//! The two orders are kept in separate structures so neither compromises
//! the other.
//!
//! ## Driving
//!
//! [`ProcessingQueue::drive`] is an explicit serial pass: one item in
//! flight at a time, options captured at dispatch, results committed back
//! by id. A result whose item has been removed mid-pass finds nothing to
//! write to and is dropped silently. Per-item failure is recorded on the
//! item and never halts the pass. A `draining` flag makes the pass
//! non-reentrant.

use crate::codec::{CompressOptions, CompressedImage, Compressor, SourceImage};
use crate::formats;
use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Opaque per-item identifier, unique across the lifetime of the queue.
///
/// Derived from name + byte size + arrival time + a per-queue ordinal; the
/// ordinal alone guarantees uniqueness across repeated submissions of
/// identically named files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId(String);

impl ItemId {
    fn derive(name: &str, size: u64, arrival_ms: i64, ordinal: u64) -> Self {
        Self(format!("{name}-{size}-{arrival_ms}-{ordinal}"))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// One tracked image. `result` is present iff `Completed`, `error` iff
/// `Failed` — never both.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: ItemId,
    pub source: SourceImage,
    pub status: ItemStatus,
    pub result: Option<CompressedImage>,
    pub error: Option<String>,
}

/// What a call to [`ProcessingQueue::submit`] did.
///
/// `rejected_extensions` lists the distinct extensions of files outside the
/// supported MIME set, in first-seen order. An empty report means the call
/// was a no-op — distinct from "some files rejected".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub accepted: usize,
    pub rejected_extensions: Vec<String>,
}

impl SubmitReport {
    pub fn is_noop(&self) -> bool {
        self.accepted == 0 && self.rejected_extensions.is_empty()
    }
}

/// Lowercased filename extension for rejection reports; falls back to the
/// declared MIME type when the name has none.
fn rejection_label(source: &SourceImage) -> String {
    match source.name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => source.mime.clone(),
    }
}

pub struct ProcessingQueue {
    /// Display order: newest submitted batch first.
    items: Vec<QueueItem>,
    /// Drive order: FIFO by time-of-enqueue. May hold ids of items that
    /// have since been removed or re-queued; `next_queued` skips those.
    pending: VecDeque<ItemId>,
    options: CompressOptions,
    draining: bool,
    next_ordinal: u64,
}

impl ProcessingQueue {
    pub fn new(options: CompressOptions) -> Self {
        Self {
            items: Vec::new(),
            pending: VecDeque::new(),
            options,
            draining: false,
            next_ordinal: 0,
        }
    }

    /// Append newly selected files.
    ///
    /// Files whose MIME type is outside {jpeg, png, webp, avif} produce no
    /// item and are summarized in the report. Accepted files enter the
    /// queue `Queued`, prepended as a group in display order and appended
    /// to the drive FIFO.
    pub fn submit(&mut self, sources: Vec<SourceImage>) -> SubmitReport {
        let arrival_ms = Utc::now().timestamp_millis();
        let mut report = SubmitReport::default();
        let mut batch = Vec::new();

        for source in sources {
            if !formats::is_supported_mime(&source.mime) {
                let label = rejection_label(&source);
                if !report.rejected_extensions.contains(&label) {
                    report.rejected_extensions.push(label);
                }
                continue;
            }

            let id = ItemId::derive(&source.name, source.size(), arrival_ms, self.next_ordinal);
            self.next_ordinal += 1;
            self.pending.push_back(id.clone());
            batch.push(QueueItem {
                id,
                source,
                status: ItemStatus::Queued,
                result: None,
                error: None,
            });
            report.accepted += 1;
        }

        if !batch.is_empty() {
            batch.extend(self.items.drain(..));
            self.items = batch;
        }
        report
    }

    /// Run one serial drive pass: process queued items in FIFO order until
    /// none remain. Returns the number of items settled.
    ///
    /// At most one pass runs at a time and at most one item is
    /// `Processing` at any instant. Each dispatch captures the options in
    /// force at that moment, so a mid-pass options change only affects
    /// items dispatched after it.
    pub fn drive(&mut self, engine: &impl Compressor) -> usize {
        if self.draining {
            return 0;
        }
        self.draining = true;

        let mut settled = 0;
        while let Some(id) = self.next_queued() {
            let options = self.options.clone();
            let outcome = {
                let item = self
                    .items
                    .iter()
                    .find(|i| i.id == id)
                    .expect("next_queued returned a live id");
                engine.compress(&item.source, &options)
            };
            self.commit(&id, outcome.map_err(|e| e.to_string()));
            settled += 1;
        }

        self.draining = false;
        settled
    }

    /// Pop the oldest pending id that still names a `Queued` item, marking
    /// it `Processing`. Stale entries (removed or re-queued ids) are
    /// discarded along the way.
    fn next_queued(&mut self) -> Option<ItemId> {
        while let Some(id) = self.pending.pop_front() {
            if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
                if item.status == ItemStatus::Queued {
                    item.status = ItemStatus::Processing;
                    return Some(id);
                }
            }
        }
        None
    }

    /// Write a finished compression back to its item. An id no longer
    /// present means the item was cleared or removed while in flight; the
    /// result is discarded with no error.
    fn commit(&mut self, id: &ItemId, outcome: Result<CompressedImage, String>) {
        let Some(item) = self.items.iter_mut().find(|i| i.id == *id) else {
            return;
        };
        match outcome {
            Ok(result) => {
                item.status = ItemStatus::Completed;
                item.result = Some(result);
                item.error = None;
            }
            Err(message) => {
                item.status = ItemStatus::Failed;
                item.error = Some(message);
                item.result = None;
            }
        }
    }

    /// Start a new settings epoch: completed items go back to `Queued`
    /// with their results cleared so the next drive pass reprocesses them.
    /// `Processing` and `Failed` items are untouched. A no-op when the
    /// options are unchanged.
    pub fn on_options_changed(&mut self, options: CompressOptions) {
        if options == self.options {
            return;
        }
        self.options = options;
        for item in &mut self.items {
            if item.status == ItemStatus::Completed {
                item.status = ItemStatus::Queued;
                item.result = None;
                self.pending.push_back(item.id.clone());
            }
        }
    }

    /// Remove everything, including any item currently in flight. Its
    /// eventual result will find no item to commit to.
    pub fn clear(&mut self) {
        self.items.clear();
        self.pending.clear();
    }

    /// Remove a single item regardless of status. Returns whether it existed.
    pub fn remove(&mut self, id: &ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != *id);
        self.items.len() != before
    }

    /// Explicitly re-queue a failed item. Returns false for any other state.
    pub fn retry(&mut self, id: &ItemId) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == *id) else {
            return false;
        };
        if item.status != ItemStatus::Failed {
            return false;
        }
        item.status = ItemStatus::Queued;
        item.error = None;
        self.pending.push_back(item.id.clone());
        true
    }

    /// All items in display order (newest submitted batch first).
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn options(&self) -> &CompressOptions {
        &self.options
    }

    /// Percent of items settled (completed or failed), in [0, 100].
    /// Monotone over a drive pass; 0 for an empty queue.
    pub fn progress(&self) -> f64 {
        if self.items.is_empty() {
            return 0.0;
        }
        let settled = self
            .items
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Completed | ItemStatus::Failed))
            .count();
        settled as f64 / self.items.len() as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::engine::tests::MockCompressor;
    use crate::formats::ImageFormat;

    fn png(name: &str) -> SourceImage {
        SourceImage::new(name, "image/png", vec![0u8; 16])
    }

    fn queue() -> ProcessingQueue {
        ProcessingQueue::new(CompressOptions::new(ImageFormat::Webp, 0.8))
    }

    fn names(queue: &ProcessingQueue) -> Vec<&str> {
        queue.items().iter().map(|i| i.source.name.as_str()).collect()
    }

    // =========================================================================
    // Submission
    // =========================================================================

    #[test]
    fn unsupported_files_are_rejected_with_extensions() {
        let mut q = queue();
        let report = q.submit(vec![
            SourceImage::new("notes.txt", "text/plain", vec![1]),
            png("photo.png"),
        ]);

        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected_extensions, vec!["txt"]);
        assert_eq!(q.items().len(), 1);
        assert_eq!(q.items()[0].source.name, "photo.png");
    }

    #[test]
    fn rejected_extensions_are_distinct() {
        let mut q = queue();
        let report = q.submit(vec![
            SourceImage::new("a.txt", "text/plain", vec![1]),
            SourceImage::new("b.txt", "text/plain", vec![2]),
            SourceImage::new("c.gif", "image/gif", vec![3]),
        ]);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.rejected_extensions, vec!["txt", "gif"]);
    }

    #[test]
    fn empty_submit_is_a_distinct_noop() {
        let mut q = queue();
        let report = q.submit(vec![]);
        assert!(report.is_noop());

        let rejected_only = q.submit(vec![SourceImage::new("a.txt", "text/plain", vec![1])]);
        assert!(!rejected_only.is_noop());
    }

    #[test]
    fn display_order_groups_newest_batch_first() {
        let mut q = queue();
        q.submit(vec![png("a.png"), png("b.png")]);
        q.submit(vec![png("c.png")]);
        assert_eq!(names(&q), vec!["c.png", "a.png", "b.png"]);
    }

    #[test]
    fn identical_files_get_distinct_ids() {
        let mut q = queue();
        q.submit(vec![png("same.png"), png("same.png")]);
        q.submit(vec![png("same.png")]);
        let ids: Vec<_> = q.items().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    // =========================================================================
    // Driving
    // =========================================================================

    #[test]
    fn drive_order_is_fifo_across_batches() {
        let mut q = queue();
        let engine = MockCompressor::new();
        q.submit(vec![png("a.png"), png("b.png")]);
        q.submit(vec![png("c.png")]);

        assert_eq!(q.drive(&engine), 3);

        let order: Vec<_> = engine.recorded().into_iter().map(|op| op.name).collect();
        assert_eq!(order, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn drive_settles_every_item() {
        let mut q = queue();
        let engine = MockCompressor::new();
        q.submit(vec![png("a.png"), png("b.png")]);
        q.drive(&engine);

        for item in q.items() {
            assert_eq!(item.status, ItemStatus::Completed);
            assert!(item.result.is_some());
            assert!(item.error.is_none());
        }
        assert_eq!(q.progress(), 100.0);
        assert!(!q.is_draining());
    }

    #[test]
    fn failure_is_local_and_does_not_halt_the_pass() {
        let mut q = queue();
        let engine = MockCompressor::failing_on(&["b.png"]);
        q.submit(vec![png("a.png"), png("b.png"), png("c.png")]);
        q.drive(&engine);

        let by_name = |n: &str| q.items().iter().find(|i| i.source.name == n).unwrap();
        assert_eq!(by_name("a.png").status, ItemStatus::Completed);
        assert_eq!(by_name("c.png").status, ItemStatus::Completed);

        let failed = by_name("b.png");
        assert_eq!(failed.status, ItemStatus::Failed);
        assert!(failed.result.is_none());
        assert!(failed.error.as_deref().unwrap().contains("mock decode failure"));
    }

    #[test]
    fn reentrancy_guard_blocks_a_second_pass() {
        let mut q = queue();
        let engine = MockCompressor::new();
        q.submit(vec![png("a.png")]);

        q.draining = true;
        assert_eq!(q.drive(&engine), 0);
        assert!(engine.recorded().is_empty());

        q.draining = false;
        assert_eq!(q.drive(&engine), 1);
    }

    #[test]
    fn drive_on_settled_queue_is_a_noop() {
        let mut q = queue();
        let engine = MockCompressor::new();
        q.submit(vec![png("a.png")]);
        q.drive(&engine);
        assert_eq!(q.drive(&engine), 0);
        assert_eq!(engine.recorded().len(), 1);
    }

    // =========================================================================
    // Settings epochs
    // =========================================================================

    #[test]
    fn options_change_resets_only_completed_items() {
        let mut q = queue();
        let engine = MockCompressor::failing_on(&["failed.png"]);
        q.submit(vec![png("done.png"), png("failed.png"), png("inflight.png")]);
        q.drive(&engine);

        // Put one item back in flight to cover the full status matrix.
        let inflight = q.items().iter().position(|i| i.source.name == "inflight.png").unwrap();
        q.items[inflight].status = ItemStatus::Processing;
        q.items[inflight].result = None;

        q.on_options_changed(CompressOptions::new(ImageFormat::Avif, 0.5));

        let by_name = |q: &ProcessingQueue, n: &str| {
            q.items().iter().find(|i| i.source.name == n).cloned().unwrap()
        };
        let done = by_name(&q, "done.png");
        assert_eq!(done.status, ItemStatus::Queued);
        assert!(done.result.is_none());
        assert_eq!(by_name(&q, "inflight.png").status, ItemStatus::Processing);
        assert_eq!(by_name(&q, "failed.png").status, ItemStatus::Failed);
    }

    #[test]
    fn unchanged_options_do_not_requeue() {
        let mut q = queue();
        let engine = MockCompressor::new();
        q.submit(vec![png("a.png")]);
        q.drive(&engine);

        q.on_options_changed(CompressOptions::new(ImageFormat::Webp, 0.8));
        assert_eq!(q.items()[0].status, ItemStatus::Completed);
    }

    #[test]
    fn requeued_items_reprocess_under_new_options() {
        let mut q = queue();
        let engine = MockCompressor::new();
        q.submit(vec![png("a.png")]);
        q.drive(&engine);

        q.on_options_changed(CompressOptions::new(ImageFormat::Jpeg, 0.3));
        assert_eq!(q.drive(&engine), 1);

        let ops = engine.recorded();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].options.format, ImageFormat::Jpeg);
        assert_eq!(q.items()[0].result.as_ref().unwrap().format, ImageFormat::Jpeg);
    }

    // =========================================================================
    // Removal and stale results
    // =========================================================================

    #[test]
    fn stale_result_for_removed_item_is_discarded() {
        let mut q = queue();
        q.submit(vec![png("a.png"), png("b.png")]);
        let id = q.items()[0].id.clone();

        // Simulate an in-flight item whose owner disappears before commit.
        let dispatched = q.next_queued().unwrap();
        q.remove(&id);
        assert!(!q.items().iter().any(|i| i.id == id));

        q.commit(
            &dispatched,
            Err("never observed".into()),
        );
        // The other item is untouched and the queue is still consistent.
        assert_eq!(q.items().len(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let mut q = queue();
        let engine = MockCompressor::new();
        q.submit(vec![png("a.png"), png("b.png")]);
        q.clear();

        assert!(q.items().is_empty());
        assert_eq!(q.drive(&engine), 0);
        assert!(engine.recorded().is_empty());
    }

    #[test]
    fn remove_works_regardless_of_status() {
        let mut q = queue();
        let engine = MockCompressor::failing_on(&["b.png"]);
        q.submit(vec![png("a.png"), png("b.png")]);
        q.drive(&engine);

        let completed = q.items()[0].id.clone();
        let failed = q.items()[1].id.clone();
        assert!(q.remove(&completed));
        assert!(q.remove(&failed));
        assert!(!q.remove(&failed));
        assert!(q.items().is_empty());
    }

    // =========================================================================
    // Retry
    // =========================================================================

    #[test]
    fn retry_requeues_only_failed_items() {
        let mut q = queue();
        let engine = MockCompressor::failing_on(&["bad.png"]);
        q.submit(vec![png("good.png"), png("bad.png")]);
        q.drive(&engine);

        let good = q.items().iter().find(|i| i.source.name == "good.png").unwrap().id.clone();
        let bad = q.items().iter().find(|i| i.source.name == "bad.png").unwrap().id.clone();

        assert!(!q.retry(&good));
        assert!(q.retry(&bad));

        let retried = q.items().iter().find(|i| i.source.name == "bad.png").unwrap();
        assert_eq!(retried.status, ItemStatus::Queued);
        assert!(retried.error.is_none());

        // Succeeds once the input stops failing.
        let forgiving = MockCompressor::new();
        assert_eq!(q.drive(&forgiving), 1);
        let retried = q.items().iter().find(|i| i.source.name == "bad.png").unwrap();
        assert_eq!(retried.status, ItemStatus::Completed);
    }

    // =========================================================================
    // Progress
    // =========================================================================

    #[test]
    fn progress_tracks_settled_fraction() {
        let mut q = queue();
        assert_eq!(q.progress(), 0.0);

        q.submit(vec![png("a.png"), png("b.png"), png("c.png"), png("d.png")]);
        assert_eq!(q.progress(), 0.0);

        q.items[0].status = ItemStatus::Completed;
        q.items[1].status = ItemStatus::Failed;
        assert_eq!(q.progress(), 50.0);
    }
}
