//! Content cache
//!
//! One live `Content` per resource id. Consumers hold `ContentHandle`s;
//! each handle is one reference and dropping it releases that reference.
//! Unreferenced entries stay cached until the eviction policy needs the
//! space, except entries in `Error` state which stay for the session so a
//! failed resource is not refetched on every lookup.

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use fos_render::Plotter;

use crate::content::{dispatch_events, ContentEvent, ListenerId, Status};
use crate::eviction::LruPolicy;
use crate::handler::RedrawParams;
use crate::{CacheConfig, Content, ContentError, ResourceId, Result};

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entries: usize,
    /// Estimated size of all entries
    pub size_bytes: usize,
    /// Estimated size of unreferenced, evictable entries
    pub evictable_bytes: usize,
    /// Budget for evictable entries
    pub budget_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Snapshot of one entry, from `CacheStore::dump`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub id: ResourceId,
    pub mime_type: String,
    pub status: Status,
    pub ref_count: usize,
    pub size: usize,
    /// Unreferenced and eligible for eviction
    pub evictable: bool,
}

struct Slot {
    content: Rc<RefCell<Content>>,
    /// Distinguishes this slot from an earlier one under the same id
    serial: u64,
    ref_count: usize,
}

impl Slot {
    fn is_live(&self) -> bool {
        self.content
            .try_borrow()
            .map_or(true, |content| content.status() != Status::Destroyed)
    }
}

struct StoreInner {
    entries: HashMap<ResourceId, Slot>,
    policy: LruPolicy,
    next_serial: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

type Victims = Vec<Rc<RefCell<Content>>>;

impl StoreInner {
    fn retain(&mut self, id: &ResourceId, serial: u64) -> bool {
        match self.entries.get_mut(id) {
            Some(slot) if slot.serial == serial => {
                slot.ref_count += 1;
                self.policy.mark_referenced(id);
                true
            }
            _ => false,
        }
    }

    fn release(&mut self, id: &ResourceId, serial: u64) -> Victims {
        let Some(slot) = self.entries.get_mut(id) else {
            return Vec::new();
        };
        if slot.serial != serial {
            return Vec::new();
        }
        debug_assert!(slot.ref_count > 0, "reference count underflow for {}", id);
        slot.ref_count = slot.ref_count.saturating_sub(1);
        tracing::debug!("Released {}, {} references left", id, slot.ref_count);
        if slot.ref_count > 0 {
            return Vec::new();
        }

        let Ok(content) = slot.content.try_borrow() else {
            return Vec::new();
        };
        let (status, size) = (content.status(), content.size_estimate());
        drop(content);

        // Abandoned before conversion: a later get must not see the partial bytes
        if matches!(status, Status::Empty | Status::Fetching | Status::Destroyed) {
            if status != Status::Destroyed {
                tracing::debug!("Dropping {} abandoned while {}", id, status);
            }
            self.policy.remove(id);
            return self.entries.remove(id).map(|slot| slot.content).into_iter().collect();
        }
        self.policy.mark_unreferenced(id, size, status == Status::Error);
        self.evict()
    }

    fn evict(&mut self) -> Victims {
        let victims: Victims = self
            .policy
            .select_victims()
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .map(|slot| slot.content)
            .collect();
        self.evictions += victims.len() as u64;
        victims
    }

    fn handle(&self, store: &Rc<RefCell<StoreInner>>, id: &ResourceId) -> Option<ContentHandle> {
        self.entries.get(id).map(|slot| ContentHandle {
            content: Rc::clone(&slot.content),
            id: id.clone(),
            serial: slot.serial,
            store: Rc::downgrade(store),
        })
    }
}

/// Destroy contents removed from the store. Runs with no store borrow held
/// so listeners may use other handles.
fn destroy_victims(victims: Victims) {
    for content in victims {
        if let Ok(mut inner) = content.try_borrow_mut() {
            tracing::debug!("Evicting {}", inner.id());
            inner.destroy();
        }
        dispatch_events(&content);
    }
}

/// Reference-counted content cache
pub struct CacheStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        tracing::debug!("Content cache budget {} bytes", config.budget_bytes);
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                entries: HashMap::new(),
                policy: LruPolicy::new(config.budget_bytes),
                next_serial: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            })),
        }
    }

    /// Look up `id`, taking a reference on a hit.
    ///
    /// A miss creates nothing; the caller builds a `Content` and `put`s it.
    pub fn get(&self, id: &ResourceId) -> Option<ContentHandle> {
        let mut inner = self.inner.borrow_mut();
        let live = inner.entries.get(id).is_some_and(Slot::is_live);
        if !live {
            inner.misses += 1;
            tracing::debug!("Cache miss for {}", id);
            return None;
        }

        inner.hits += 1;
        let handle = inner.handle(&self.inner, id)?;
        inner.retain(id, handle.serial);
        tracing::debug!("Cache hit for {}", id);
        Some(handle)
    }

    /// Insert a new content with one reference held by the returned handle.
    ///
    /// There must be no live entry for the same id.
    pub fn put(&self, content: Content) -> Result<ContentHandle> {
        let id = content.id().clone();
        let (handle, victims) = {
            let mut inner = self.inner.borrow_mut();
            let live = inner.entries.get(&id).is_some_and(Slot::is_live);
            debug_assert!(!live, "content already cached for {}", id);
            if live {
                tracing::warn!("Refusing to cache {} twice", id);
                return Err(ContentError::DuplicateEntry(id));
            }

            let serial = inner.next_serial;
            inner.next_serial += 1;
            inner.policy.remove(&id);
            let replaced = inner.entries.insert(
                id.clone(),
                Slot {
                    content: Rc::new(RefCell::new(content)),
                    serial,
                    ref_count: 1,
                },
            );
            tracing::debug!("Cached {} ({} entries)", id, inner.entries.len());

            let handle = inner
                .handle(&self.inner, &id)
                .ok_or_else(|| ContentError::DuplicateEntry(id.clone()))?;
            let mut victims = inner.evict();
            victims.extend(replaced.map(|slot| slot.content));
            (handle, victims)
        };
        destroy_victims(victims);
        Ok(handle)
    }

    /// Return `id` if cached, otherwise insert the content built by `create`
    pub fn get_or_insert_with(
        &self,
        id: &ResourceId,
        create: impl FnOnce() -> Result<Content>,
    ) -> Result<ContentHandle> {
        match self.get(id) {
            Some(handle) => Ok(handle),
            None => self.put(create()?),
        }
    }

    /// Release one reference
    pub fn free(&self, handle: ContentHandle) {
        drop(handle);
    }

    /// Destroy every entry regardless of references.
    ///
    /// Outstanding handles stay safe to use and drop; their operations
    /// return `ContentError::Destroyed`.
    pub fn quit(&self) {
        let drained: Vec<(ResourceId, Slot)> = {
            let mut inner = self.inner.borrow_mut();
            inner.policy.clear();
            inner.entries.drain().collect()
        };
        if drained.is_empty() {
            return;
        }
        tracing::info!("Destroying {} cached contents", drained.len());
        let victims = drained
            .into_iter()
            .map(|(id, slot)| {
                if slot.ref_count > 0 {
                    tracing::debug!("{} still has {} references", id, slot.ref_count);
                }
                slot.content
            })
            .collect();
        destroy_victims(victims);
    }

    /// Snapshot of all entries sorted by id
    pub fn dump(&self) -> Vec<EntryInfo> {
        let inner = self.inner.borrow();
        let mut entries: Vec<EntryInfo> = inner
            .entries
            .iter()
            .filter_map(|(id, slot)| {
                let content = slot.content.try_borrow().ok()?;
                Some(EntryInfo {
                    id: id.clone(),
                    mime_type: content.mime_type().to_string(),
                    status: content.status(),
                    ref_count: slot.ref_count,
                    size: content.size_estimate(),
                    evictable: inner.policy.is_candidate(id),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!("Content cache: {} entries", entries.len());
        for entry in &entries {
            tracing::debug!(
                "  {} {} {} refs={} size={}{}",
                entry.id,
                entry.mime_type,
                entry.status,
                entry.ref_count,
                entry.size,
                if entry.evictable { " evictable" } else { "" }
            );
        }
        entries
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.borrow();
        let size_bytes = inner
            .entries
            .values()
            .filter_map(|slot| slot.content.try_borrow().ok().map(|c| c.size_estimate()))
            .sum();
        CacheStats {
            entries: inner.entries.len(),
            size_bytes,
            evictable_bytes: inner.policy.evictable_bytes(),
            budget_bytes: inner.policy.budget(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// Drop unreferenced `Error` entries so their resources can be
    /// fetched again. Returns how many were removed.
    pub fn purge_errors(&self) -> usize {
        let victims: Victims = {
            let mut inner = self.inner.borrow_mut();
            let failed: Vec<ResourceId> = inner
                .entries
                .iter()
                .filter(|(_, slot)| {
                    slot.ref_count == 0
                        && slot
                            .content
                            .try_borrow()
                            .is_ok_and(|content| content.status() == Status::Error)
                })
                .map(|(id, _)| id.clone())
                .collect();
            failed
                .iter()
                .filter_map(|id| inner.entries.remove(id))
                .map(|slot| slot.content)
                .collect()
        };
        let count = victims.len();
        if count > 0 {
            tracing::info!("Purged {} failed contents", count);
        }
        destroy_victims(victims);
        count
    }

    /// Change the budget, evicting immediately if it shrank
    pub fn set_budget(&self, bytes: usize) {
        let victims = {
            let mut inner = self.inner.borrow_mut();
            inner.policy.set_budget(bytes);
            inner.evict()
        };
        destroy_victims(victims);
    }

    /// Whether a live entry exists, without taking a reference
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.inner.borrow().entries.get(id).is_some_and(Slot::is_live)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        self.quit();
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore").field("stats", &self.stats()).finish()
    }
}

/// One reference to a cached content.
///
/// Dropping the handle releases the reference. Cloning takes another.
pub struct ContentHandle {
    content: Rc<RefCell<Content>>,
    id: ResourceId,
    serial: u64,
    store: Weak<RefCell<StoreInner>>,
}

impl ContentHandle {
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Read access to the content
    pub fn borrow(&self) -> Ref<'_, Content> {
        self.content.borrow()
    }

    /// Current status.
    ///
    /// The content is held mutably only while one of its handler
    /// operations runs, and listeners are called after that ends. A status
    /// read from inside a handler call therefore cannot be answered and
    /// reports `Fetching`; use `borrow` to fail loudly instead.
    pub fn status(&self) -> Status {
        self.content.try_borrow().map_or(Status::Fetching, |c| c.status())
    }

    /// References currently held on the entry; 0 once the store has
    /// dropped it
    pub fn ref_count(&self) -> usize {
        let Some(store) = self.store.upgrade() else {
            return 0;
        };
        let inner = store.borrow();
        match inner.entries.get(&self.id) {
            Some(slot) if slot.serial == self.serial => slot.ref_count,
            _ => 0,
        }
    }

    /// Whether the content has not been destroyed
    pub fn is_valid(&self) -> bool {
        self.status() != Status::Destroyed
    }

    /// Whether both handles refer to the same entry
    pub fn ptr_eq(&self, other: &ContentHandle) -> bool {
        Rc::ptr_eq(&self.content, &other.content)
    }

    pub fn create(&self) -> Result<()> {
        self.with_mut(|c| c.create())?
    }

    pub fn process_data(&self, chunk: &[u8]) -> Result<()> {
        self.with_mut(|c| c.process_data(chunk))?
    }

    pub fn convert(&self, width: u32, height: u32) -> Result<()> {
        self.with_mut(|c| c.convert(width, height))?
    }

    pub fn revive(&self, width: u32, height: u32) -> Result<()> {
        self.with_mut(|c| c.revive(width, height))?
    }

    pub fn reformat(&self, width: u32, height: u32) -> Result<()> {
        self.with_mut(|c| c.reformat(width, height))?
    }

    pub fn redraw(&self, plotter: &mut dyn Plotter, params: &RedrawParams) -> Result<()> {
        self.content
            .try_borrow()
            .map_err(|_| ContentError::Busy)?
            .redraw(plotter, params)
    }

    /// Destroy the content now. The entry leaves the cache once its last
    /// reference is released.
    pub fn destroy(&self) -> Result<()> {
        self.with_mut(|c| c.destroy())
    }

    pub fn tick(&self, elapsed_ms: u32) -> bool {
        self.with_mut(|c| c.tick(elapsed_ms)).unwrap_or(false)
    }

    pub fn add_listener(&self, listener: impl FnMut(&ContentEvent) + 'static) -> Result<ListenerId> {
        let mut content = self.content.try_borrow_mut().map_err(|_| ContentError::Busy)?;
        Ok(content.add_listener(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.content
            .try_borrow_mut()
            .is_ok_and(|mut content| content.remove_listener(id))
    }

    fn with_mut<T>(&self, op: impl FnOnce(&mut Content) -> T) -> Result<T> {
        let out = {
            let mut content = self.content.try_borrow_mut().map_err(|_| ContentError::Busy)?;
            op(&mut content)
        };
        dispatch_events(&self.content);
        Ok(out)
    }
}

impl Clone for ContentHandle {
    fn clone(&self) -> Self {
        let retained = self
            .store
            .upgrade()
            .is_some_and(|store| store.try_borrow_mut().is_ok_and(|mut inner| inner.retain(&self.id, self.serial)));
        Self {
            content: Rc::clone(&self.content),
            id: self.id.clone(),
            serial: self.serial,
            // A clone that took no reference must not release one
            store: if retained { Weak::clone(&self.store) } else { Weak::new() },
        }
    }
}

impl Drop for ContentHandle {
    fn drop(&mut self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let victims = match store.try_borrow_mut() {
            Ok(mut inner) => inner.release(&self.id, self.serial),
            Err(_) => {
                tracing::warn!("Cache busy while releasing {}", self.id);
                return;
            }
        };
        drop(store);
        destroy_victims(victims);
    }
}

impl fmt::Debug for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
