//! In-memory [`BatchStore`] used by the orchestration tests.
//!
//! Mirrors the Postgres semantics: all mutation happens under a single
//! lock, so the completion recount is serialized exactly like the
//! row-locked transaction in the real store, and the guarded
//! transitions (unit claim, notify-status write) apply the same
//! predicates.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use batchpix_core::intake::BatchRow;
use batchpix_core::report::ReportRow;
use batchpix_core::types::{DbId, JobId};
use batchpix_db::models::job::{Job, JobProgress};
use batchpix_db::models::product::Product;
use batchpix_db::models::status::{JobStatus, NotifyStatus, UnitStatus};
use batchpix_db::models::unit::{PendingUnit, Unit};
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{BatchStore, StoreError};

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    products: BTreeMap<DbId, Product>,
    units: BTreeMap<DbId, Unit>,
    next_id: DbId,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn job_of_unit(&self, unit: &Unit) -> Option<JobId> {
        self.products.get(&unit.product_id).map(|p| p.job_id)
    }
}

/// In-memory store with Postgres-equivalent transition semantics.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn create_job(
        &self,
        notify_url: Option<&str>,
        total_units: i32,
    ) -> Result<Job, StoreError> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            status_id: JobStatus::Pending.id(),
            total_units,
            completed_units: 0,
            notify_url: notify_url.map(str::to_string),
            notify_status_id: notify_url.map(|_| NotifyStatus::NotSent.id()),
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.state.lock().await.jobs.get(&id).cloned())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.jobs.remove(&id);
        let product_ids: Vec<DbId> = state
            .products
            .values()
            .filter(|p| p.job_id == id)
            .map(|p| p.id)
            .collect();
        state
            .units
            .retain(|_, u| !product_ids.contains(&u.product_id));
        state.products.retain(|_, p| p.job_id != id);
        Ok(())
    }

    async fn insert_graph(&self, job_id: JobId, rows: &[BatchRow]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.jobs.contains_key(&job_id) {
            return Err(StoreError::Internal(format!("unknown job {job_id}")));
        }

        let now = Utc::now();
        for row in rows {
            let product_id = state.next_id();
            state.products.insert(
                product_id,
                Product {
                    id: product_id,
                    job_id,
                    serial_number: row.serial_number,
                    product_name: row.product_name.clone(),
                    created_at: now,
                    updated_at: now,
                },
            );
            for url in &row.image_urls {
                let unit_id = state.next_id();
                state.units.insert(
                    unit_id,
                    Unit {
                        id: unit_id,
                        product_id,
                        input_url: url.clone(),
                        output_url: None,
                        status_id: UnitStatus::Pending.id(),
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }

        let job = state.jobs.get_mut(&job_id).expect("checked above");
        job.status_id = JobStatus::Processing.id();
        job.updated_at = now;
        Ok(())
    }

    async fn pending_units(&self, job_id: JobId) -> Result<Vec<DbId>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .units
            .values()
            .filter(|u| {
                u.status_id == UnitStatus::Pending.id()
                    && state.job_of_unit(u) == Some(job_id)
            })
            .map(|u| u.id)
            .collect())
    }

    async fn stale_pending_units(
        &self,
        older_than_secs: i64,
        limit: i64,
    ) -> Result<Vec<PendingUnit>, StoreError> {
        let cutoff = Utc::now() - Duration::seconds(older_than_secs);
        let state = self.state.lock().await;
        Ok(state
            .units
            .values()
            .filter(|u| u.status_id == UnitStatus::Pending.id() && u.updated_at <= cutoff)
            .filter_map(|u| {
                state.job_of_unit(u).map(|job_id| PendingUnit {
                    unit_id: u.id,
                    job_id,
                })
            })
            .take(limit as usize)
            .collect())
    }

    async fn claim_unit(&self, unit_id: DbId) -> Result<Option<Unit>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(unit) = state.units.get_mut(&unit_id) else {
            return Ok(None);
        };
        if unit.status_id != UnitStatus::Pending.id() {
            return Ok(None);
        }
        unit.status_id = UnitStatus::Processing.id();
        unit.updated_at = Utc::now();
        Ok(Some(unit.clone()))
    }

    async fn complete_unit(&self, unit_id: DbId, output_url: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let unit = state
            .units
            .get_mut(&unit_id)
            .ok_or_else(|| StoreError::Internal(format!("unknown unit {unit_id}")))?;
        unit.status_id = UnitStatus::Completed.id();
        unit.output_url = Some(output_url.to_string());
        unit.updated_at = Utc::now();
        Ok(())
    }

    async fn fail_unit(&self, unit_id: DbId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let unit = state
            .units
            .get_mut(&unit_id)
            .ok_or_else(|| StoreError::Internal(format!("unknown unit {unit_id}")))?;
        unit.status_id = UnitStatus::Failed.id();
        unit.updated_at = Utc::now();
        Ok(())
    }

    async fn recount_job(&self, id: JobId) -> Result<Option<JobProgress>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get(&id).cloned() else {
            return Ok(None);
        };

        let terminal = state
            .units
            .values()
            .filter(|u| {
                state.job_of_unit(u) == Some(id)
                    && matches!(
                        u.status_id,
                        s if s == UnitStatus::Completed.id() || s == UnitStatus::Failed.id()
                    )
            })
            .count() as i32;

        let newly_completed =
            terminal == job.total_units && job.status_id != JobStatus::Completed.id();

        let job = state.jobs.get_mut(&id).expect("checked above");
        job.completed_units = terminal;
        if terminal == job.total_units {
            job.status_id = JobStatus::Completed.id();
        }
        job.updated_at = Utc::now();

        Ok(Some(JobProgress {
            job: job.clone(),
            newly_completed,
        }))
    }

    async fn set_notify_status(
        &self,
        id: JobId,
        status: NotifyStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(false);
        };
        match job.notify_status_id {
            Some(current) if current != NotifyStatus::Sent.id() => {
                job.notify_status_id = Some(status.id());
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn report_rows(&self, id: JobId) -> Result<Vec<ReportRow>, StoreError> {
        let state = self.state.lock().await;

        let mut products: Vec<&Product> =
            state.products.values().filter(|p| p.job_id == id).collect();
        products.sort_by_key(|p| (p.serial_number, p.id));

        Ok(products
            .into_iter()
            .map(|product| {
                let units: Vec<&Unit> = state
                    .units
                    .values()
                    .filter(|u| u.product_id == product.id)
                    .collect();
                ReportRow {
                    serial_number: product.serial_number,
                    product_name: product.product_name.clone(),
                    input_urls: units.iter().map(|u| u.input_url.clone()).collect(),
                    output_urls: units.iter().map(|u| u.output_url.clone()).collect(),
                }
            })
            .collect())
    }
}
