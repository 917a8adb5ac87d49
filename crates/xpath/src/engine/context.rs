//! Per-evaluation mutable state.
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lru::LruCache;

use crate::engine::functions::{CallCtx, CustomFunction};
use crate::engine::runtime::Error;
use crate::ir::TraceKind;
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};

/// "Last emitted" nodes of one output document, written by a downstream
/// generator. The evaluator never reads them.
#[derive(Debug, Clone)]
pub struct OutputSlots<N> {
    pub last_context: Option<N>,
    pub last_unit: Option<N>,
    pub last_fact: Option<N>,
    pub first_fact: Option<N>,
}

impl<N> Default for OutputSlots<N> {
    fn default() -> Self {
        Self {
            last_context: None,
            last_unit: None,
            last_fact: None,
            first_fact: None,
        }
    }
}

type Variables<N> = HashMap<ExpandedName, XdmSequence<N>>;
type CustomFunctions<N> = HashMap<ExpandedName, Arc<dyn CustomFunction<N>>>;

/// Execution context of one top-level evaluation.
///
/// Variable bindings are a copy-on-write snapshot: [`Context::copy`] shares
/// them with the copy, and the first write on either side detaches it.
pub struct Context<N> {
    context_item: Option<XdmItem<N>>,
    variables: Arc<Variables<N>>,
    custom_functions: Arc<CustomFunctions<N>>,
    cache: Option<LruCache<String, XdmSequence<N>>>,
    cache_capacity: usize,
    cancel: Arc<AtomicBool>,
    outputs: HashMap<String, OutputSlots<N>>,
    trace: Option<TraceKind>,
}

impl<N: XdmNode> Context<N> {
    pub fn builder() -> ContextBuilder<N> {
        ContextBuilder::new()
    }

    pub fn context_item(&self) -> Option<&XdmItem<N>> {
        self.context_item.as_ref()
    }

    pub fn set_context_item(&mut self, item: Option<XdmItem<N>>) {
        self.context_item = item;
    }

    pub fn variable(&self, name: &ExpandedName) -> Option<&XdmSequence<N>> {
        self.variables.get(name)
    }

    /// Bind `name`, returning the binding it shadows.
    pub fn bind_variable(
        &mut self,
        name: ExpandedName,
        value: XdmSequence<N>,
    ) -> Option<XdmSequence<N>> {
        Arc::make_mut(&mut self.variables).insert(name, value)
    }

    /// Undo a [`bind_variable`](Self::bind_variable): reinstate the shadowed
    /// binding or remove the name.
    pub fn restore_variable(&mut self, name: &ExpandedName, previous: Option<XdmSequence<N>>) {
        let vars = Arc::make_mut(&mut self.variables);
        match previous {
            Some(v) => {
                vars.insert(name.clone(), v);
            }
            None => {
                vars.remove(name);
            }
        }
    }

    pub fn custom_function(&self, name: &ExpandedName) -> Option<&Arc<dyn CustomFunction<N>>> {
        self.custom_functions.get(name)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Flag an external deadline callback raises to stop evaluation.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn output_slots(&self, document: &str) -> Option<&OutputSlots<N>> {
        self.outputs.get(document)
    }

    pub fn output_slots_mut(&mut self, document: &str) -> &mut OutputSlots<N> {
        self.outputs.entry(document.to_string()).or_default()
    }

    pub fn trace(&self) -> Option<TraceKind> {
        self.trace
    }

    pub(crate) fn set_trace(&mut self, trace: Option<TraceKind>) {
        self.trace = trace;
    }

    pub fn cached(&mut self, key: &str) -> Option<XdmSequence<N>> {
        self.cache.as_mut()?.get(key).cloned()
    }

    pub fn store_cached(&mut self, key: &str, value: XdmSequence<N>) {
        if let Some(cache) = self.cache.as_mut() {
            cache.put(key.to_string(), value);
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, LruCache::len)
    }

    /// Context for a sibling evaluation: same context item, shared variable
    /// snapshot, custom functions and cancellation flag, an empty cache and
    /// no output slots.
    pub fn copy(&self) -> Self {
        Self {
            context_item: self.context_item.clone(),
            variables: Arc::clone(&self.variables),
            custom_functions: Arc::clone(&self.custom_functions),
            cache: new_cache(self.cache_capacity),
            cache_capacity: self.cache_capacity,
            cancel: Arc::clone(&self.cancel),
            outputs: HashMap::new(),
            trace: None,
        }
    }

    /// Release everything the context holds once its evaluation is done.
    pub fn close(&mut self) {
        self.context_item = None;
        self.variables = Arc::new(HashMap::new());
        self.custom_functions = Arc::new(HashMap::new());
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.outputs.clear();
        self.trace = None;
    }
}

fn new_cache<N>(capacity: usize) -> Option<LruCache<String, XdmSequence<N>>> {
    NonZeroUsize::new(capacity).map(LruCache::new)
}

pub struct ContextBuilder<N> {
    context_item: Option<XdmItem<N>>,
    variables: Variables<N>,
    custom_functions: CustomFunctions<N>,
    cache_capacity: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<N: XdmNode> Default for ContextBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: XdmNode> ContextBuilder<N> {
    pub fn new() -> Self {
        Self {
            context_item: None,
            variables: HashMap::new(),
            custom_functions: HashMap::new(),
            cache_capacity: super::EvaluatorConfig::default().cache_capacity,
            cancel: None,
        }
    }

    pub fn with_context_item(mut self, item: impl Into<XdmItem<N>>) -> Self {
        self.context_item = Some(item.into());
        self
    }

    pub fn with_context_node(self, node: N) -> Self {
        self.with_context_item(XdmItem::Node(node))
    }

    pub fn with_variable(mut self, name: ExpandedName, value: impl Into<XdmSequence<N>>) -> Self {
        self.variables.insert(name, value.into());
        self
    }

    pub fn with_custom_function(
        mut self,
        name: ExpandedName,
        f: impl CustomFunction<N> + 'static,
    ) -> Self {
        self.custom_functions.insert(name, Arc::new(f));
        self
    }

    /// Closure form of [`with_custom_function`](Self::with_custom_function).
    pub fn with_custom_fn<F>(self, name: ExpandedName, f: F) -> Self
    where
        F: Fn(&CallCtx<'_, N>, &[XdmSequence<N>]) -> Result<Option<XdmSequence<N>>, Error>
            + Send
            + Sync
            + 'static,
    {
        self.with_custom_function(name, f)
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Context<N> {
        Context {
            context_item: self.context_item,
            variables: Arc::new(self.variables),
            custom_functions: Arc::new(self.custom_functions),
            cache: new_cache(self.cache_capacity),
            cache_capacity: self.cache_capacity,
            cancel: self.cancel.unwrap_or_default(),
            outputs: HashMap::new(),
            trace: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::{SimpleNode, elem};
    use crate::xdm::XdmAtomicValue;

    fn int(i: i64) -> XdmSequence<SimpleNode> {
        XdmSequence::one(XdmAtomicValue::Integer(i))
    }

    #[test]
    fn copy_isolates_variable_writes() {
        let x = ExpandedName::local("x");
        let mut parent: Context<SimpleNode> =
            ContextBuilder::new().with_variable(x.clone(), int(1)).build();
        let mut child = parent.copy();
        child.bind_variable(x.clone(), int(2));
        assert_eq!(parent.variable(&x), Some(&int(1)));
        parent.bind_variable(ExpandedName::local("y"), int(3));
        assert!(child.variable(&ExpandedName::local("y")).is_none());
        assert_eq!(child.variable(&x), Some(&int(2)));
    }

    #[test]
    fn copy_starts_with_empty_cache_and_shares_cancellation() {
        let mut ctx: Context<SimpleNode> = ContextBuilder::new().build();
        ctx.store_cached("k", int(1));
        let copy = ctx.copy();
        assert_eq!(copy.cache_len(), 0);
        ctx.cancel();
        assert!(copy.is_cancelled());
    }

    #[test]
    fn restore_removes_fresh_bindings() {
        let x = ExpandedName::local("x");
        let mut ctx: Context<SimpleNode> = ContextBuilder::new().build();
        let prev = ctx.bind_variable(x.clone(), int(5));
        assert!(prev.is_none());
        ctx.restore_variable(&x, prev);
        assert!(ctx.variable(&x).is_none());
    }

    #[test]
    fn close_clears_state() {
        let n = elem("a").build();
        let mut ctx = ContextBuilder::new()
            .with_context_node(n.clone())
            .with_variable(ExpandedName::local("v"), int(1))
            .build();
        ctx.output_slots_mut("out.xml").last_fact = Some(n);
        ctx.store_cached("k", int(1));
        ctx.close();
        assert!(ctx.context_item().is_none());
        assert!(ctx.variable(&ExpandedName::local("v")).is_none());
        assert!(ctx.output_slots("out.xml").is_none());
        assert_eq!(ctx.cache_len(), 0);
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let mut ctx: Context<SimpleNode> = ContextBuilder::new().with_cache_capacity(0).build();
        ctx.store_cached("k", int(1));
        assert!(ctx.cached("k").is_none());
    }
}
