//! Function dispatch tables and the calling convention shared by builtin and
//! custom functions.
//!
//! Builtins live in one [`FunctionTable`] per namespace. Custom functions are
//! registered per [`Context`] and are consulted before any table; they may
//! decline a call by returning `Ok(None)`.
use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;

use crate::consts::FNS;
use crate::engine::context::Context;
use crate::engine::evaluator::Focus;
use crate::engine::evaluator::atomize::atomize_sequence;
use crate::engine::runtime::{Error, ErrorCode, SourceLocation};
use crate::model::{QName, XdmNode};
use crate::schema::TypeRegistry;
use crate::xdm::{XdmItem, XdmSequence};

pub mod accessors;
pub mod boolean;
pub mod constructors;
pub mod sequences;

pub type Arity = usize;

/// Everything a function implementation may look at during one call.
pub struct CallCtx<'a, N> {
    pub name: &'a QName,
    pub location: Option<SourceLocation>,
    pub focus: &'a Focus<N>,
    pub context: &'a Context<N>,
    pub types: &'a TypeRegistry,
}

impl<N: XdmNode> CallCtx<'_, N> {
    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    pub fn context_item(&self) -> Option<&XdmItem<N>> {
        self.focus.item.as_ref()
    }

    /// Context item, or `err:XPDY0002` when the focus is undefined.
    pub fn require_context_item(&self) -> Result<&XdmItem<N>, Error> {
        self.context_item().ok_or_else(|| {
            Error::from_code(
                ErrorCode::XPDY0002,
                format!("{}() requires a context item", self.name),
            )
        })
    }

    pub fn atomize(&self, seq: XdmSequence<N>) -> Result<XdmSequence<N>, Error> {
        atomize_sequence(self.types, seq)
    }
}

pub type FunctionImpl<N> =
    Arc<dyn Fn(&CallCtx<'_, N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error> + Send + Sync>;

type FunctionOverload<N> = (Arity, Option<Arity>, FunctionImpl<N>);

/// User-registered function. `Ok(None)` means "not available for this call"
/// and is reported as `FunctionUnavailable` naming the function.
pub trait CustomFunction<N>: Send + Sync {
    fn call(
        &self,
        ctx: &CallCtx<'_, N>,
        args: &[XdmSequence<N>],
    ) -> Result<Option<XdmSequence<N>>, Error>;
}

impl<N, F> CustomFunction<N> for F
where
    F: Fn(&CallCtx<'_, N>, &[XdmSequence<N>]) -> Result<Option<XdmSequence<N>>, Error>
        + Send
        + Sync,
{
    fn call(
        &self,
        ctx: &CallCtx<'_, N>,
        args: &[XdmSequence<N>],
    ) -> Result<Option<XdmSequence<N>>, Error> {
        self(ctx, args)
    }
}

pub enum Lookup<'a, N> {
    Found(&'a FunctionImpl<N>),
    /// The name exists but not with the requested arity.
    WrongArity(Vec<Arity>),
    NotFound,
}

/// Functions of a single namespace, keyed by local name.
pub struct FunctionTable<N> {
    fns: HashMap<String, Vec<FunctionOverload<N>>>,
}

impl<N> Default for FunctionTable<N> {
    fn default() -> Self {
        Self {
            fns: HashMap::new(),
        }
    }
}

impl<N> FunctionTable<N> {
    /// Overlapping ranges are allowed; the overload with the highest minimum
    /// (then the smallest maximum) wins.
    pub fn register_range(
        &mut self,
        local: &str,
        min: Arity,
        max: Option<Arity>,
        func: FunctionImpl<N>,
    ) {
        let overloads = self.fns.entry(local.to_string()).or_default();
        overloads.push((min, max, func));
        overloads.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.unwrap_or(Arity::MAX).cmp(&b.1.unwrap_or(Arity::MAX)))
        });
    }

    pub fn contains(&self, local: &str) -> bool {
        self.fns.contains_key(local)
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }

    pub fn lookup(&self, local: &str, arity: Arity) -> Lookup<'_, N> {
        let Some(cands) = self.fns.get(local) else {
            return Lookup::NotFound;
        };
        if let Some((_, _, f)) = cands
            .iter()
            .find(|(min, max, _)| arity >= *min && max.is_none_or(|m| arity <= m))
        {
            return Lookup::Found(f);
        }
        Lookup::WrongArity(
            cands
                .iter()
                .flat_map(|(min, max, _)| *min..=max.unwrap_or(*min))
                .sorted_unstable()
                .dedup()
                .collect(),
        )
    }
}

/// Namespace-keyed builtin tables, built once and shared by evaluators.
pub struct FunctionLibrary<N> {
    tables: HashMap<String, FunctionTable<N>>,
}

impl<N> Default for FunctionLibrary<N> {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }
}

impl<N: XdmNode> FunctionLibrary<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `fn` core table plus `xs` constructor functions.
    pub fn with_builtins() -> Self {
        let mut lib = Self::new();
        register_default_functions(&mut lib);
        constructors::register(&mut lib);
        lib
    }

    pub fn register_ns<F>(&mut self, ns_uri: &str, local: &str, arity: Arity, f: F)
    where
        F: 'static
            + Send
            + Sync
            + Fn(&CallCtx<'_, N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.register_ns_range(ns_uri, local, arity, Some(arity), f);
    }

    pub fn register_ns_range<F>(
        &mut self,
        ns_uri: &str,
        local: &str,
        min: Arity,
        max: Option<Arity>,
        f: F,
    ) where
        F: 'static
            + Send
            + Sync
            + Fn(&CallCtx<'_, N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.tables
            .entry(ns_uri.to_string())
            .or_default()
            .register_range(local, min, max, Arc::new(f));
    }

    pub fn table(&self, ns_uri: &str) -> Option<&FunctionTable<N>> {
        self.tables.get(ns_uri)
    }

    pub fn lookup(&self, ns_uri: &str, local: &str, arity: Arity) -> Lookup<'_, N> {
        match self.tables.get(ns_uri) {
            Some(t) => t.lookup(local, arity),
            None => Lookup::NotFound,
        }
    }
}

fn register_default_functions<N: XdmNode>(lib: &mut FunctionLibrary<N>) {
    macro_rules! reg {
        ($local:expr, $min:expr, $max:expr, $func:expr $(,)?) => {
            lib.register_ns_range(FNS, $local, $min, $max, $func)
        };
    }

    reg!("true", 0, Some(0), boolean::fn_true::<N>);
    reg!("false", 0, Some(0), boolean::fn_false::<N>);
    reg!("not", 1, Some(1), boolean::fn_not::<N>);
    reg!("boolean", 1, Some(1), boolean::fn_boolean::<N>);

    reg!("position", 0, Some(0), sequences::position_fn::<N>);
    reg!("last", 0, Some(0), sequences::last_fn::<N>);
    reg!("count", 1, Some(1), sequences::count_fn::<N>);
    reg!("empty", 1, Some(1), sequences::empty_fn::<N>);
    reg!("exists", 1, Some(1), sequences::exists_fn::<N>);
    reg!("data", 0, Some(1), sequences::data_fn::<N>);

    reg!("string", 0, Some(1), accessors::string_fn::<N>);
    reg!("local-name", 0, Some(1), accessors::local_name_fn::<N>);
    reg!("root", 0, Some(1), accessors::root_fn::<N>);
}

/// Namespace a call is looked up in: its own, or `fn` when unqualified.
pub(crate) fn effective_namespace(name: &QName) -> Option<&str> {
    match (&name.ns_uri, &name.prefix) {
        (Some(ns), _) => Some(ns.as_str()),
        (None, None) => Some(FNS),
        (None, Some(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::SimpleNode;

    #[test]
    fn wrong_arity_lists_available_arities() {
        let lib: FunctionLibrary<SimpleNode> = FunctionLibrary::with_builtins();
        match lib.lookup(FNS, "string", 3) {
            Lookup::WrongArity(a) => assert_eq!(a, vec![0, 1]),
            _ => panic!("expected arity mismatch"),
        }
        assert!(matches!(lib.lookup(FNS, "count", 1), Lookup::Found(_)));
        assert!(matches!(lib.lookup(FNS, "no-such", 0), Lookup::NotFound));
        assert!(matches!(lib.lookup("urn:other", "count", 1), Lookup::NotFound));
    }

    #[test]
    fn unprefixed_names_use_fn_namespace() {
        assert_eq!(effective_namespace(&QName::new(None, None, "count")), Some(FNS));
        assert_eq!(effective_namespace(&QName::new(Some("foo"), None, "bar")), None);
    }
}
