//! In-memory `RecordView` implementations.
//!
//! [`ListView`] backs the portfolio list and the action center;
//! [`DetailView`] backs a single record's page. Both share [`ViewState`],
//! which owns the generation counter used to order patches against reloads.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lgdesk_interchange::{LgId, LgRecord};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::record::{PatchReceipt, RefreshMode, ReloadSummary, ReloadTicket, ViewScope, ViewStatus};
use crate::traits::RecordView;

struct Entry {
    record: LgRecord,
    /// Generation of the last patch applied to this entry (0 = never patched).
    generation: u64,
}

#[derive(Default)]
struct ViewState {
    entries: Vec<Entry>,
    generation: u64,
    loading: u32,
    refreshing: u32,
    last_error: Option<String>,
}

impl ViewState {
    fn with_records(records: Vec<LgRecord>) -> Self {
        ViewState {
            entries: records
                .into_iter()
                .map(|record| Entry {
                    record,
                    generation: 0,
                })
                .collect(),
            ..ViewState::default()
        }
    }

    fn get(&self, id: LgId) -> Option<LgRecord> {
        self.entries
            .iter()
            .find(|e| e.record.id == id)
            .map(|e| e.record.clone())
    }

    fn records(&self) -> Vec<LgRecord> {
        self.entries.iter().map(|e| e.record.clone()).collect()
    }

    fn status(&self) -> ViewStatus {
        ViewStatus {
            loading: self.loading > 0,
            refreshing: self.refreshing > 0,
            last_error: self.last_error.clone(),
        }
    }

    fn patch(&mut self, scope: &ViewScope, record: LgRecord) -> Result<PatchReceipt, StoreError> {
        let lg_id = record.id;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.record.id == lg_id)
            .ok_or_else(|| StoreError::RecordNotFound {
                lg_id,
                scope: scope.clone(),
            })?;

        self.generation += 1;
        let latest_instruction_id = record.latest_instruction().map(|i| i.id);
        entry.record = record;
        entry.generation = self.generation;

        tracing::debug!(%scope, %lg_id, generation = self.generation, "patched record");
        Ok(PatchReceipt::new(
            scope.clone(),
            lg_id,
            self.generation,
            latest_instruction_id,
        ))
    }

    fn begin_reload(&mut self, mode: RefreshMode) -> ReloadTicket {
        match mode {
            RefreshMode::Initial => self.loading += 1,
            RefreshMode::Background => self.refreshing += 1,
        }
        ReloadTicket {
            mode,
            started_at_generation: self.generation,
        }
    }

    fn end_reload(&mut self, mode: RefreshMode) {
        match mode {
            RefreshMode::Initial => self.loading = self.loading.saturating_sub(1),
            RefreshMode::Background => self.refreshing = self.refreshing.saturating_sub(1),
        }
    }

    fn finish_reload(&mut self, ticket: ReloadTicket, records: Vec<LgRecord>) -> ReloadSummary {
        self.end_reload(ticket.mode);

        let mut previous: BTreeMap<LgId, Entry> = self
            .entries
            .drain(..)
            .map(|e| (e.record.id, e))
            .collect();
        let mut preserved_patches = Vec::new();
        let mut next = Vec::with_capacity(records.len());

        for record in records {
            match previous.remove(&record.id) {
                Some(entry) if entry.generation > ticket.started_at_generation => {
                    preserved_patches.push(record.id);
                    next.push(entry);
                }
                Some(entry) => next.push(Entry {
                    record,
                    generation: entry.generation,
                }),
                None => next.push(Entry {
                    record,
                    generation: 0,
                }),
            }
        }

        // Patched mid-reload but absent from the (older) reload result.
        for (id, entry) in previous {
            if entry.generation > ticket.started_at_generation {
                preserved_patches.push(id);
                next.push(entry);
            }
        }

        self.entries = next;
        self.last_error = None;
        ReloadSummary {
            total: self.entries.len(),
            preserved_patches,
        }
    }

    fn abort_reload(&mut self, ticket: ReloadTicket, message: String) {
        self.end_reload(ticket.mode);
        self.last_error = Some(message);
    }
}

// ──────────────────────────────────────────────
// ListView
// ──────────────────────────────────────────────

/// A named, ordered collection of records.
pub struct ListView {
    name: String,
    state: RwLock<ViewState>,
}

impl ListView {
    /// An empty list; populate it with a reload.
    pub fn new(name: &str) -> Self {
        ListView {
            name: name.to_string(),
            state: RwLock::new(ViewState::default()),
        }
    }

    /// A list pre-populated with `records` (for tests and for views seeded
    /// from another view's data).
    pub fn with_records(name: &str, records: Vec<LgRecord>) -> Self {
        ListView {
            name: name.to_string(),
            state: RwLock::new(ViewState::with_records(records)),
        }
    }
}

#[async_trait]
impl RecordView for ListView {
    fn scope(&self) -> ViewScope {
        ViewScope::List(self.name.clone())
    }

    async fn get(&self, id: LgId) -> Option<LgRecord> {
        self.state.read().await.get(id)
    }

    async fn records(&self) -> Vec<LgRecord> {
        self.state.read().await.records()
    }

    async fn status(&self) -> ViewStatus {
        self.state.read().await.status()
    }

    async fn patch(&self, record: LgRecord) -> Result<PatchReceipt, StoreError> {
        let scope = self.scope();
        self.state.write().await.patch(&scope, record)
    }

    async fn begin_reload(&self, mode: RefreshMode) -> ReloadTicket {
        self.state.write().await.begin_reload(mode)
    }

    async fn finish_reload(&self, ticket: ReloadTicket, records: Vec<LgRecord>) -> ReloadSummary {
        let summary = self.state.write().await.finish_reload(ticket, records);
        tracing::info!(
            scope = %self.scope(),
            total = summary.total,
            preserved = summary.preserved_patches.len(),
            "reload finished"
        );
        summary
    }

    async fn abort_reload(&self, ticket: ReloadTicket, message: String) {
        tracing::warn!(scope = %self.scope(), %message, "reload failed");
        self.state.write().await.abort_reload(ticket, message)
    }
}

// ──────────────────────────────────────────────
// DetailView
// ──────────────────────────────────────────────

/// The detail page of one record.
pub struct DetailView {
    id: LgId,
    state: RwLock<ViewState>,
}

impl DetailView {
    /// A detail view that has not loaded its record yet.
    pub fn new(id: LgId) -> Self {
        DetailView {
            id,
            state: RwLock::new(ViewState::default()),
        }
    }

    pub fn with_record(record: LgRecord) -> Self {
        DetailView {
            id: record.id,
            state: RwLock::new(ViewState::with_records(vec![record])),
        }
    }

    pub fn lg_id(&self) -> LgId {
        self.id
    }

    /// The record shown, if loaded.
    pub async fn record(&self) -> Option<LgRecord> {
        self.state.read().await.get(self.id)
    }
}

#[async_trait]
impl RecordView for DetailView {
    fn scope(&self) -> ViewScope {
        ViewScope::Detail(self.id)
    }

    async fn get(&self, id: LgId) -> Option<LgRecord> {
        if id != self.id {
            return None;
        }
        self.state.read().await.get(id)
    }

    async fn records(&self) -> Vec<LgRecord> {
        self.state.read().await.records()
    }

    async fn status(&self) -> ViewStatus {
        self.state.read().await.status()
    }

    async fn patch(&self, record: LgRecord) -> Result<PatchReceipt, StoreError> {
        if record.id != self.id {
            return Err(StoreError::OutsideScope {
                lg_id: record.id,
                scope: self.scope(),
            });
        }
        let scope = self.scope();
        self.state.write().await.patch(&scope, record)
    }

    async fn begin_reload(&self, mode: RefreshMode) -> ReloadTicket {
        self.state.write().await.begin_reload(mode)
    }

    async fn finish_reload(&self, ticket: ReloadTicket, records: Vec<LgRecord>) -> ReloadSummary {
        let own: Vec<LgRecord> = records
            .into_iter()
            .filter(|r| r.id == self.id)
            .take(1)
            .collect();
        self.state.write().await.finish_reload(ticket, own)
    }

    async fn abort_reload(&self, ticket: ReloadTicket, message: String) {
        tracing::warn!(scope = %self.scope(), %message, "reload failed");
        self.state.write().await.abort_reload(ticket, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: u64, amount: &str, auto_renewal: bool) -> LgRecord {
        serde_json::from_value(json!({
            "id": id,
            "status": "Valid",
            "amount": amount,
            "currency": "USD",
            "expiry_date": "2025-01-31",
            "auto_renewal": auto_renewal,
            "owner_contact": {"name": "Owner", "email": "owner@example.com"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn patch_replaces_only_the_matching_record() {
        let view = ListView::with_records(
            "portfolio",
            vec![record(1, "100", false), record(2, "200", false)],
        );

        let receipt = view.patch(record(1, "90", true)).await.unwrap();
        assert_eq!(receipt.lg_id(), LgId(1));
        assert_eq!(receipt.generation(), 1);

        assert_eq!(view.get(LgId(1)).await, Some(record(1, "90", true)));
        assert_eq!(view.get(LgId(2)).await, Some(record(2, "200", false)));
    }

    #[tokio::test]
    async fn patch_of_unknown_record_is_rejected() {
        let view = ListView::with_records("portfolio", vec![record(1, "100", false)]);
        let err = view.patch(record(3, "1", false)).await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { lg_id: LgId(3), .. }));
        assert_eq!(view.records().await.len(), 1);
    }

    #[tokio::test]
    async fn reload_keeps_patches_made_after_it_started() {
        let view = ListView::with_records(
            "portfolio",
            vec![record(1, "100", false), record(2, "200", false)],
        );

        let ticket = view.begin_reload(RefreshMode::Background).await;
        view.patch(record(1, "50", false)).await.unwrap();

        let summary = view
            .finish_reload(
                ticket,
                vec![record(1, "100", false), record(2, "210", false), record(4, "1", false)],
            )
            .await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.preserved_patches, vec![LgId(1)]);
        assert_eq!(view.get(LgId(1)).await.unwrap().amount.to_string(), "50");
        assert_eq!(view.get(LgId(2)).await.unwrap().amount.to_string(), "210");
        assert!(view.get(LgId(4)).await.is_some());
    }

    #[tokio::test]
    async fn reload_replaces_patches_made_before_it_started() {
        let view = ListView::with_records("portfolio", vec![record(1, "100", false)]);
        view.patch(record(1, "50", false)).await.unwrap();

        let ticket = view.begin_reload(RefreshMode::Background).await;
        let summary = view.finish_reload(ticket, vec![record(1, "75", false)]).await;

        assert!(summary.preserved_patches.is_empty());
        assert_eq!(view.get(LgId(1)).await.unwrap().amount.to_string(), "75");
    }

    #[tokio::test]
    async fn indicators_follow_refresh_mode() {
        let view = ListView::new("portfolio");

        let initial = view.begin_reload(RefreshMode::Initial).await;
        let status = view.status().await;
        assert!(status.loading);
        assert!(!status.refreshing);
        view.finish_reload(initial, vec![record(1, "1", false)]).await;

        let background = view.begin_reload(RefreshMode::Background).await;
        let status = view.status().await;
        assert!(!status.loading);
        assert!(status.refreshing);

        view.abort_reload(background, "connection reset".to_string())
            .await;
        let status = view.status().await;
        assert!(!status.refreshing);
        assert_eq!(status.last_error.as_deref(), Some("connection reset"));
        assert_eq!(view.records().await.len(), 1);
    }

    #[tokio::test]
    async fn detail_view_refuses_foreign_records() {
        let view = DetailView::with_record(record(7, "10", false));
        let err = view.patch(record(8, "10", false)).await.unwrap_err();
        assert!(matches!(err, StoreError::OutsideScope { .. }));
        assert!(view.get(LgId(8)).await.is_none());
    }

    #[tokio::test]
    async fn detail_view_reload_picks_its_own_record() {
        let view = DetailView::new(LgId(7));
        assert!(view.record().await.is_none());

        let ticket = view.begin_reload(RefreshMode::Initial).await;
        view.finish_reload(ticket, vec![record(6, "1", false), record(7, "2", true)])
            .await;

        assert_eq!(view.record().await, Some(record(7, "2", true)));
        assert_eq!(view.records().await.len(), 1);
    }
}
