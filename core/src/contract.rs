use crate::{
    context::{ContextRef, Done},
    error::Result,
    value::{
        instance::{Instance, Value},
        record::Record,
    },
};
use std::sync::Arc;

/// Outcome slot of a single conversion. Omission is a first-class outcome,
/// distinct from producing `Null`: an omitted property writes nothing and an
/// omitted element leaves no hole in its sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Present(T),
    Omitted,
}

impl<T> Slot<T> {
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Omitted => None,
        }
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self, Self::Omitted)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Slot<U> {
        match self {
            Self::Present(value) => Slot::Present(f(value)),
            Self::Omitted => Slot::Omitted,
        }
    }
}

/// Where a value sits inside its enclosing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKey {
    Prop(String),
    Index(usize),
}

/// Call site handed to hooks: the enclosing record and the slot within it.
/// Borrowed for the duration of the hook call only, so a hook that suspends
/// has to clone what it wants to keep.
pub struct Site<'a> {
    pub parent: &'a Record,
    pub key: &'a SlotKey,
}

pub type SerializeFn =
    Arc<dyn Fn(Option<&Value>, &str, &Instance) -> Result<Slot<Record>> + Send + Sync>;
pub type DeserializeFn = Arc<dyn Fn(&Record, Done, &ContextRef) + Send + Sync>;
pub type BeforeFn = Arc<dyn Fn(&Record, &Site, &ContextRef, Done<Record>) + Send + Sync>;
pub type AfterFn =
    Arc<dyn Fn(Result<Slot<Value>>, &Record, &Site, &ContextRef, Done) + Send + Sync>;

/// Before/after interception around a converter's reverse direction. Both
/// sides run under the completion protocol, so a hook may suspend and finish
/// its handle from elsewhere.
#[derive(Default, Clone)]
pub struct Hooks {
    pub before: Option<BeforeFn>,
    pub after: Option<AfterFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(
        mut self,
        hook: impl Fn(&Record, &Site, &ContextRef, Done<Record>) + Send + Sync + 'static,
    ) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn after(
        mut self,
        hook: impl Fn(Result<Slot<Value>>, &Record, &Site, &ContextRef, Done) + Send + Sync + 'static,
    ) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }
}

/// Two-way conversion contract for one property or element.
///
/// The forward direction is synchronous: it maps a model-side value to a
/// record slot or fails. The reverse direction is completion-passing: it
/// receives a [`Done`] handle and finishes it exactly once, now or later,
/// from any thread. The driver never inspects what a converter does in
/// between, so slow resolutions simply keep their session open.
#[derive(Clone)]
pub struct Converter {
    pub(crate) serialize: SerializeFn,
    pub(crate) deserialize: DeserializeFn,
    pub(crate) alias: Option<String>,
    pub(crate) identifier: bool,
    pub(crate) before: Option<BeforeFn>,
    pub(crate) after: Option<AfterFn>,
}

impl Converter {
    pub fn new(
        serialize: impl Fn(Option<&Value>, &str, &Instance) -> Result<Slot<Record>>
            + Send
            + Sync
            + 'static,
        deserialize: impl Fn(&Record, Done, &ContextRef) + Send + Sync + 'static,
    ) -> Self {
        Self {
            serialize: Arc::new(serialize),
            deserialize: Arc::new(deserialize),
            alias: None,
            identifier: false,
            before: None,
            after: None,
        }
    }

    /// Record-side key of a property, honoring an alias when one is set.
    pub fn record_key<'a>(&'a self, prop: &'a str) -> &'a str {
        self.alias.as_deref().unwrap_or(prop)
    }

    pub fn is_aliased(&self) -> bool {
        self.alias.is_some()
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier
    }

    /// Replaces the hooks that are set on `hooks`, keeping the other side.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        if hooks.before.is_some() {
            self.before = hooks.before;
        }
        if hooks.after.is_some() {
            self.after = hooks.after;
        }
        self
    }

    pub fn serialize(
        &self,
        value: Option<&Value>,
        key: &str,
        instance: &Instance,
    ) -> Result<Slot<Record>> {
        (self.serialize)(value, key, instance)
    }

    /// Reverse direction without hook interception.
    pub fn deserialize(&self, raw: &Record, done: Done, ctx: &ContextRef) {
        (self.deserialize)(raw, done, ctx)
    }

    /// Reverse direction as the drivers run it: before hook, converter,
    /// after hook, chained through one-shot handles. A before hook that
    /// omits or fails short-circuits past both the converter and the after
    /// hook straight into `done`.
    pub fn deserialize_with_hooks(
        &self,
        raw: &Record,
        parent: &Record,
        key: SlotKey,
        ctx: &ContextRef,
        done: Done,
    ) {
        match &self.before {
            None => self.deserialize_into(raw, parent, key, ctx, done),
            Some(hook) => {
                let converter = self.clone();
                let ctx_next = Arc::clone(ctx);
                let parent_next = parent.clone();
                let key_next = key.clone();
                let next = Done::new(move |result: Result<Slot<Record>>| match result {
                    Ok(Slot::Present(raw)) => {
                        converter.deserialize_into(&raw, &parent_next, key_next, &ctx_next, done)
                    }
                    Ok(Slot::Omitted) => done.omit(),
                    Err(error) => done.fail(error),
                });
                hook(raw, &Site { parent, key: &key }, ctx, next);
            }
        }
    }

    fn deserialize_into(
        &self,
        raw: &Record,
        parent: &Record,
        key: SlotKey,
        ctx: &ContextRef,
        done: Done,
    ) {
        match &self.after {
            None => (self.deserialize)(raw, done, ctx),
            Some(hook) => {
                let hook = Arc::clone(hook);
                let ctx_next = Arc::clone(ctx);
                let raw_next = raw.clone();
                let parent_next = parent.clone();
                let wrapped = Done::new(move |result| {
                    let site = Site {
                        parent: &parent_next,
                        key: &key,
                    };
                    hook(result, &raw_next, &site, &ctx_next, done)
                });
                (self.deserialize)(raw, wrapped, ctx);
            }
        }
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter
            .debug_struct("Converter")
            .field("alias", &self.alias)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}
