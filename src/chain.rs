//! Ordered handler chain with a shared per-invocation id counter.
//!
//! Handlers mint private `__mtc_<n>` ids while they run; `transform` finishes
//! by renumbering every private id, in order of first appearance in the final
//! string, into the public sequential form. Creation order and final textual
//! order differ whenever a handler reorders or splits spans, which is why the
//! two-phase scheme exists.

use std::cell::Cell;
use std::collections::HashMap;

use regex::Captures;

use crate::dataref::DataRefMap;
use crate::sentinels::{public_id, PRIVATE_ID_RE};

/// A named transform stage. Stateless per call; reads the shared context and
/// mints ids through it, never mutates it.
pub trait Handler {
    fn name(&self) -> &'static str;
    fn transform(&self, segment: &str, ctx: &ChainContext) -> String;
}

/// Read-only context shared by every handler of one chain. The id counter
/// lives in a `Cell`, which also makes a `Pipeline` `!Sync`: concurrent
/// `transform` calls on one instance are rejected by the type system.
pub struct ChainContext {
    next_id: Cell<usize>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub data_refs: DataRefMap,
}

impl ChainContext {
    pub fn new(
        source_lang: Option<String>,
        target_lang: Option<String>,
        data_refs: DataRefMap,
    ) -> Self {
        Self {
            next_id: Cell::new(1),
            source_lang,
            target_lang,
            data_refs,
        }
    }

    /// Mints the next private id. Chain-scoped: every handler of one run
    /// draws from this counter, so ids stay unique across handlers.
    pub fn next_id(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn reset(&self, start: usize) {
        self.next_id.set(start);
    }
}

pub struct Pipeline {
    handlers: Vec<Box<dyn Handler>>,
    ctx: ChainContext,
    id_start: usize,
}

impl Pipeline {
    pub fn new(ctx: ChainContext) -> Self {
        Self {
            handlers: Vec::new(),
            ctx,
            id_start: 1,
        }
    }

    pub fn ctx(&self) -> &ChainContext {
        &self.ctx
    }

    pub fn add_first(&mut self, handler: Box<dyn Handler>) {
        self.handlers.insert(0, handler);
    }

    pub fn add_last(&mut self, handler: Box<dyn Handler>) {
        self.handlers.push(handler);
    }

    /// Inserts before the named marker handler. An absent marker is a silent
    /// no-op; chains are often assembled incrementally and conditionally.
    pub fn add_before(&mut self, marker: &str, handler: Box<dyn Handler>) {
        if let Some(idx) = self.position(marker) {
            self.handlers.insert(idx, handler);
        }
    }

    /// Inserts after the named marker handler. Absent marker: silent no-op.
    pub fn add_after(&mut self, marker: &str, handler: Box<dyn Handler>) {
        if let Some(idx) = self.position(marker) {
            self.handlers.insert(idx + 1, handler);
        }
    }

    /// Removes the named handler. Absent handler: silent no-op.
    pub fn remove(&mut self, name: &str) {
        if let Some(idx) = self.position(name) {
            self.handlers.remove(idx);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.handlers.iter().position(|h| h.name() == name)
    }

    /// Resets the id counter, applies every handler in list order, then
    /// renumbers private ids into the public sequential form.
    pub fn transform(&self, segment: &str) -> String {
        self.ctx.reset(self.id_start);
        let mut seg = segment.to_string();
        for handler in &self.handlers {
            seg = handler.transform(&seg, &self.ctx);
        }
        renumber(&seg)
    }
}

/// Rewrites private ids to `mtc_1`, `mtc_2`, ... by first appearance in the
/// final string. A private id occurring twice keeps one public id.
fn renumber(segment: &str) -> String {
    let mut assigned: HashMap<String, String> = HashMap::new();
    let mut next = 1usize;
    PRIVATE_ID_RE
        .replace_all(segment, |caps: &Captures<'_>| {
            assigned
                .entry(caps[0].to_string())
                .or_insert_with(|| {
                    let id = public_id(next);
                    next += 1;
                    id
                })
                .clone()
        })
        .into_owned()
}
