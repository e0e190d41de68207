use crate::{
    contract::Slot,
    error::{Error, Result},
    schema::SchemaRef,
    value::{instance::InstanceRef, instance::Value, record::Record},
};
use std::{
    any::Any,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

pub type Args = Option<Arc<dyn Any + Send + Sync>>;
pub type OnReady = Box<dyn FnOnce(Result<InstanceRef>) + Send>;
pub type ContextRef = Arc<Context>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-shot completion handle for a single conversion. Consuming the handle
/// is the only way to report an outcome, so a unit completes at most once by
/// construction. The handle is `Send` and may be finished from any thread;
/// one that is dropped unconsumed keeps its session open indefinitely.
pub struct Done<T = Value> {
    sink: Box<dyn FnOnce(Result<Slot<T>>) + Send>,
}

impl<T> Done<T> {
    pub fn new(sink: impl FnOnce(Result<Slot<T>>) + Send + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// Handle that swallows its outcome.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn resolve(self, value: T) {
        self.finish(Ok(Slot::Present(value)));
    }

    pub fn omit(self) {
        self.finish(Ok(Slot::Omitted));
    }

    pub fn fail(self, error: Error) {
        self.finish(Err(error));
    }

    pub fn finish(self, result: Result<Slot<T>>) {
        (self.sink)(result);
    }
}

struct State {
    pending: usize,
    error: Option<Error>,
    target: Option<InstanceRef>,
    on_ready: Option<OnReady>,
}

struct Resolution {
    schema: SchemaRef,
    id: String,
    value: Value,
}

struct Parked {
    schema: SchemaRef,
    id: String,
    done: Done,
    owner: Weak<Shared>,
}

#[derive(Default)]
struct Refs {
    resolved: Vec<Resolution>,
    parked: Vec<Parked>,
}

struct Shared {
    is_root: bool,
    state: Mutex<State>,
    refs: Arc<Mutex<Refs>>,
}

/// One conversion session: the record being converted, the schema driving
/// it, the target instance receiving properties and the count of units still
/// pending. Nested object conversions run their own child session whose
/// terminal feeds a property unit of the parent; reference tables live once
/// per session tree and are shared by every child.
pub struct Context {
    parent: Option<ContextRef>,
    schema: SchemaRef,
    record: Record,
    args: Args,
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn root(
        schema: SchemaRef,
        record: Record,
        on_ready: Option<OnReady>,
        args: Args,
    ) -> ContextRef {
        Arc::new(Self {
            parent: None,
            schema,
            record,
            args,
            shared: Arc::new(Shared {
                is_root: true,
                state: Mutex::new(State {
                    pending: 0,
                    error: None,
                    target: None,
                    on_ready,
                }),
                refs: Arc::new(Mutex::new(Refs::default())),
            }),
        })
    }

    pub(crate) fn child(
        parent: &ContextRef,
        schema: SchemaRef,
        record: Record,
        on_ready: OnReady,
    ) -> ContextRef {
        Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            schema,
            record,
            args: parent.args.clone(),
            shared: Arc::new(Shared {
                is_root: false,
                state: Mutex::new(State {
                    pending: 0,
                    error: None,
                    target: None,
                    on_ready: Some(on_ready),
                }),
                refs: Arc::clone(&parent.shared.refs),
            }),
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn parent(&self) -> Option<&ContextRef> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn target(&self) -> Option<InstanceRef> {
        lock(&self.shared.state).target.clone()
    }

    pub(crate) fn set_target(&self, target: InstanceRef) {
        lock(&self.shared.state).target = Some(target);
    }

    pub fn args(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.args.as_deref()
    }

    pub fn args_as<T: 'static>(&self) -> Option<&T> {
        self.args.as_deref()?.downcast_ref()
    }

    /// Registers one pending conversion with this session and returns its
    /// completion handle. `effect` receives the converted value and runs
    /// only when the unit resolves while the session has no recorded error;
    /// failed and omitted units are counted without running it.
    pub fn unit(&self, effect: impl FnOnce(Value) + Send + 'static) -> Done {
        lock(&self.shared.state).pending += 1;
        let shared = Arc::clone(&self.shared);
        Done::new(move |result| Shared::complete(&shared, result, Box::new(effect)))
    }

    /// Holds one artificial pending unit until the guard drops. Taken around
    /// synchronous scheduling scans so units that complete inline cannot
    /// drain the counter and fire the terminal callback mid-scan.
    pub fn begin_batch(&self) -> BatchGuard {
        lock(&self.shared.state).pending += 1;
        BatchGuard {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Parks `done` until some identifier conversion announces `id` with a
    /// schema assignable to `expected`. Ids already announced resolve
    /// immediately. Tables are shared across the session tree, so nested
    /// sessions park and resolve through one pool.
    pub fn await_ref(&self, expected: &SchemaRef, id: impl ToString, done: Done) {
        let id = id.to_string();
        let mut refs = lock(&self.shared.refs);
        let found = refs.resolved.iter().find_map(|resolution| {
            if resolution.id == id && resolution.schema.is_assignable_to(expected) {
                Some(resolution.value.clone())
            } else {
                None
            }
        });
        match found {
            Some(value) => {
                drop(refs);
                done.resolve(value);
            }
            None => refs.parked.push(Parked {
                schema: Arc::clone(expected),
                id,
                done,
                owner: Arc::downgrade(&self.shared),
            }),
        }
    }

    /// Announces that `id` now names `value` under `schema` and releases
    /// every parked awaiter the announcement satisfies.
    pub fn resolve_ref(&self, schema: &SchemaRef, id: impl ToString, value: Value) {
        let id = id.to_string();
        let released = {
            let mut refs = lock(&self.shared.refs);
            refs.resolved.push(Resolution {
                schema: Arc::clone(schema),
                id: id.clone(),
                value: value.clone(),
            });
            let (released, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut refs.parked)
                .into_iter()
                .partition(|parked| parked.id == id && schema.is_assignable_to(&parked.schema));
            refs.parked = kept;
            released
        };
        for parked in released {
            parked.done.resolve(value.clone());
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter
            .debug_struct("Context")
            .field("schema", self.schema.id())
            .field("root", &self.is_root())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn complete(
        shared: &Arc<Self>,
        result: Result<Slot<Value>>,
        effect: Box<dyn FnOnce(Value) + Send>,
    ) {
        match result {
            Ok(Slot::Present(value)) => {
                // effects take the instance lock, so they run outside ours
                let clean = lock(&shared.state).error.is_none();
                if clean {
                    effect(value);
                }
            }
            Ok(Slot::Omitted) => {}
            Err(error) => {
                let first = {
                    let mut state = lock(&shared.state);
                    if state.error.is_none() {
                        state.error = Some(error);
                        true
                    } else {
                        false
                    }
                };
                if first {
                    Self::cancel_parked(shared);
                }
            }
        }
        Self::release_one(shared);
    }

    // parked awaiters of a failed session never resolve; cancel them so
    // the counter still drains
    fn cancel_parked(shared: &Arc<Self>) {
        let owner = Arc::downgrade(shared);
        let canceled = {
            let mut refs = lock(&shared.refs);
            let (canceled, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut refs.parked)
                .into_iter()
                .partition(|parked| parked.owner.ptr_eq(&owner));
            refs.parked = kept;
            canceled
        };
        for parked in canceled {
            parked.done.fail(Error::Canceled(parked.id));
        }
    }

    fn release_one(shared: &Arc<Self>) {
        let drained = {
            let mut state = lock(&shared.state);
            state.pending -= 1;
            state.pending == 0
        };
        if drained {
            Self::finish(shared);
        } else if shared.is_root {
            Self::finish_starved(shared);
        }
    }

    fn finish(shared: &Arc<Self>) {
        let (on_ready, result) = {
            let mut state = lock(&shared.state);
            let on_ready = match state.on_ready.take() {
                Some(on_ready) => on_ready,
                None => return,
            };
            let result = match &state.error {
                Some(error) => Err(error.clone()),
                None => match &state.target {
                    Some(target) => Ok(target.clone()),
                    None => Err(Error::NoTarget),
                },
            };
            (on_ready, result)
        };
        on_ready(result);
        if shared.is_root {
            Self::drop_refs(shared);
        }
    }

    fn finish_starved(shared: &Arc<Self>) {
        // decided under both locks; a resolve racing the drain loses cleanly
        let fired = {
            let mut refs = lock(&shared.refs);
            let mut state = lock(&shared.state);
            if refs.parked.is_empty()
                || state.pending != refs.parked.len()
                || state.on_ready.is_none()
            {
                None
            } else {
                let on_ready = state.on_ready.take();
                let parked = std::mem::take(&mut refs.parked);
                let error = state.error.clone();
                on_ready.map(|on_ready| (on_ready, parked, error))
            }
        };
        if let Some((on_ready, parked, error)) = fired {
            let mut ids = Vec::new();
            for entry in &parked {
                if !ids.contains(&entry.id) {
                    ids.push(entry.id.clone());
                }
            }
            let error = error.unwrap_or(Error::UnresolvedReferences(ids));
            on_ready(Err(error));
            for entry in parked {
                entry.done.fail(Error::Canceled(entry.id));
            }
            Self::drop_refs(shared);
        }
    }

    fn drop_refs(shared: &Arc<Self>) {
        let leftovers = {
            let mut refs = lock(&shared.refs);
            refs.resolved.clear();
            std::mem::take(&mut refs.parked)
        };
        for parked in leftovers {
            parked.done.fail(Error::Canceled(parked.id));
        }
    }
}

#[must_use]
pub struct BatchGuard {
    shared: Arc<Shared>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        Shared::release_one(&self.shared);
    }
}

/// Fan-in over a burst of sibling conversions, slots keyed by spawn index.
pub(crate) struct Gather {
    state: Mutex<GatherState>,
}

struct GatherState {
    slots: Vec<Option<Slot<Value>>>,
    remaining: usize,
    error: Option<Error>,
    finish: Option<Box<dyn FnOnce(Result<Vec<Slot<Value>>>) + Send>>,
}

impl Gather {
    pub fn new(
        len: usize,
        finish: impl FnOnce(Result<Vec<Slot<Value>>>) + Send + 'static,
    ) -> Arc<Self> {
        let gather = Arc::new(Self {
            state: Mutex::new(GatherState {
                slots: vec![None; len],
                remaining: len,
                error: None,
                finish: Some(Box::new(finish)),
            }),
        });
        if len == 0 {
            Self::flush(&gather);
        }
        gather
    }

    pub fn slot(self: &Arc<Self>, index: usize) -> Done {
        let gather = Arc::clone(self);
        Done::new(move |result| {
            {
                let mut state = lock(&gather.state);
                match result {
                    Ok(slot) => state.slots[index] = Some(slot),
                    Err(error) => {
                        if state.error.is_none() {
                            state.error = Some(error);
                        }
                        state.slots[index] = Some(Slot::Omitted);
                    }
                }
                state.remaining -= 1;
                if state.remaining > 0 {
                    return;
                }
            }
            Self::flush(&gather);
        })
    }

    fn flush(gather: &Arc<Self>) {
        let (finish, error, slots) = {
            let mut state = lock(&gather.state);
            let finish = match state.finish.take() {
                Some(finish) => finish,
                None => return,
            };
            (finish, state.error.take(), std::mem::take(&mut state.slots))
        };
        match error {
            Some(error) => finish(Err(error)),
            None => finish(Ok(slots
                .into_iter()
                .map(|slot| slot.unwrap_or(Slot::Omitted))
                .collect())),
        }
    }
}
