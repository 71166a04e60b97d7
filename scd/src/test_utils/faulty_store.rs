use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{ErrorKind, ScdResult};
use crate::scd_error;
use crate::store::{Scd1Mutation, Scd1Store, Scd2Mutation, Scd2Store};
use crate::types::{EntityId, Scd1Record, Scd2Record};

#[derive(Debug, Default)]
struct Faults {
    fail_reads: AtomicBool,
    fail_next_apply: AtomicBool,
    apply_calls: AtomicU64,
}

/// Test wrapper for store implementations that fails on demand.
///
/// [`FaultyStore`] forwards every call to the wrapped store until a fault is armed. An armed
/// apply fault rejects the next mutation list with [`ErrorKind::StoreUnavailable`] without
/// forwarding it, which is what a store whose transaction was rolled back looks like to the
/// engines.
#[derive(Debug, Clone)]
pub struct FaultyStore<S> {
    inner: S,
    faults: Arc<Faults>,
}

impl<S> FaultyStore<S> {
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Makes the next apply call fail.
    pub fn fail_next_apply(&self) {
        self.faults.fail_next_apply.store(true, Ordering::SeqCst);
    }

    /// Makes every read fail until reset.
    pub fn fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of apply calls received, failed ones included.
    pub fn apply_calls(&self) -> u64 {
        self.faults.apply_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check_read(&self) -> ScdResult<()> {
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(scd_error!(
                ErrorKind::StoreUnavailable,
                "Injected read failure"
            ));
        }

        Ok(())
    }

    fn check_apply(&self) -> ScdResult<()> {
        self.faults.apply_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(scd_error!(
                ErrorKind::StoreUnavailable,
                "Injected apply failure"
            ));
        }

        Ok(())
    }
}

impl<S> Scd1Store for FaultyStore<S>
where
    S: Scd1Store + Sync,
{
    async fn get_scd1_records(&self, entity_ids: &[EntityId]) -> ScdResult<Vec<Scd1Record>> {
        self.check_read()?;
        self.inner.get_scd1_records(entity_ids).await
    }

    async fn get_all_scd1_records(&self) -> ScdResult<Vec<Scd1Record>> {
        self.check_read()?;
        self.inner.get_all_scd1_records().await
    }

    async fn apply_scd1_mutations(&self, mutations: Vec<Scd1Mutation>) -> ScdResult<u64> {
        self.check_apply()?;
        self.inner.apply_scd1_mutations(mutations).await
    }
}

impl<S> Scd2Store for FaultyStore<S>
where
    S: Scd2Store + Sync,
{
    async fn get_scd2_versions(&self, entity_ids: &[EntityId]) -> ScdResult<Vec<Scd2Record>> {
        self.check_read()?;
        self.inner.get_scd2_versions(entity_ids).await
    }

    async fn get_current_scd2_versions(&self) -> ScdResult<Vec<Scd2Record>> {
        self.check_read()?;
        self.inner.get_current_scd2_versions().await
    }

    async fn get_all_scd2_versions(&self) -> ScdResult<Vec<Scd2Record>> {
        self.check_read()?;
        self.inner.get_all_scd2_versions().await
    }

    async fn apply_scd2_mutations(&self, mutations: Vec<Scd2Mutation>) -> ScdResult<u64> {
        self.check_apply()?;
        self.inner.apply_scd2_mutations(mutations).await
    }
}
