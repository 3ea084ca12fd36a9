//! Fake: in-memory [`MetadataSource`] for tests.
//!
//! Serves a fixed [`MetadataSnapshot`] and a scripted version sequence.
//! Once the script is exhausted the last version keeps being returned.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::MetadataError;
use crate::metadata::{MetadataSnapshot, MetadataSource};
use crate::types::{ContainerRecord, HostRecord, ServiceRecord, StackRecord};

const FAKE_URL: &str = "fake://metadata";

#[derive(Default)]
struct Versions {
    script: VecDeque<Option<String>>,
    last: Option<String>,
}

/// A scripted metadata source.
#[derive(Default)]
pub struct FakeMetadata {
    snapshot: Mutex<MetadataSnapshot>,
    versions: Mutex<Versions>,
    fail_fetch: AtomicBool,
    version_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeMetadata {
    pub fn new(snapshot: MetadataSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Default::default()
        }
    }

    /// Queue version tokens to hand out in order.
    pub fn with_versions<I, S>(self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_versions(versions);
        self
    }

    pub fn push_versions<I, S>(&self, versions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = lock(&self.versions);
        state
            .script
            .extend(versions.into_iter().map(|v| Some(v.into())));
    }

    /// Queue one failing `get_version` call.
    pub fn push_version_error(&self) {
        lock(&self.versions).script.push_back(None);
    }

    pub fn set_snapshot(&self, snapshot: MetadataSnapshot) {
        *lock(&self.snapshot) = snapshot;
    }

    /// Make every list fetch fail until reset.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    /// Number of snapshot fetch attempts (counted on `get_services`).
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn check_fetch(&self, what: &str) -> Result<(), MetadataError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(MetadataError::Request {
                url: format!("{FAKE_URL}/{what}"),
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MetadataSource for FakeMetadata {
    fn get_version(&self) -> Result<String, MetadataError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.versions);
        match state.script.pop_front() {
            Some(Some(version)) => {
                state.last = Some(version.clone());
                Ok(version)
            }
            Some(None) => Err(MetadataError::Request {
                url: format!("{FAKE_URL}/version"),
                message: "scripted failure".to_string(),
            }),
            None => state.last.clone().ok_or_else(|| MetadataError::Request {
                url: format!("{FAKE_URL}/version"),
                message: "no version scripted".to_string(),
            }),
        }
    }

    fn get_stacks(&self) -> Result<Vec<StackRecord>, MetadataError> {
        self.check_fetch("stacks")?;
        Ok(lock(&self.snapshot).stacks.clone())
    }

    fn get_hosts(&self) -> Result<Vec<HostRecord>, MetadataError> {
        self.check_fetch("hosts")?;
        Ok(lock(&self.snapshot).hosts.clone())
    }

    fn get_services(&self) -> Result<Vec<ServiceRecord>, MetadataError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fetch("services")?;
        Ok(lock(&self.snapshot).services.clone())
    }

    fn get_containers(&self) -> Result<Vec<ContainerRecord>, MetadataError> {
        self.check_fetch("containers")?;
        Ok(lock(&self.snapshot).containers.clone())
    }

    fn get_self_container(&self) -> Result<ContainerRecord, MetadataError> {
        self.check_fetch("self/container")?;
        Ok(lock(&self.snapshot).self_container.clone())
    }
}
