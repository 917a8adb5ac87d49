//! Node accessors that default to the context item.
use crate::engine::functions::CallCtx;
use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

/// The single argument item, or the context item for the zero-argument form.
fn target<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<Option<XdmItem<N>>, Error> {
    match args.first() {
        None => Ok(Some(ctx.require_context_item()?.clone())),
        Some(seq) if seq.len() > 1 => Err(Error::type_error(format!(
            "{}() expects at most one item, got {}",
            ctx.name,
            seq.len()
        ))),
        Some(seq) => Ok(seq.first()),
    }
}

fn target_node<N: XdmNode>(ctx: &CallCtx<N>, args: &[XdmSequence<N>]) -> Result<Option<N>, Error> {
    match target(ctx, args)? {
        None => Ok(None),
        Some(XdmItem::Node(n)) => Ok(Some(n)),
        Some(XdmItem::Atomic(a)) => Err(Error::type_error(format!(
            "{}() expects a node, got {}",
            ctx.name,
            a.type_name()
        ))),
    }
}

pub(super) fn string_fn<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = match target(ctx, args)? {
        None => String::new(),
        Some(XdmItem::Node(n)) => n.string_value(),
        Some(XdmItem::Atomic(a)) => a.lexical(),
    };
    Ok(XdmSequence::one(XdmAtomicValue::String(s)))
}

pub(super) fn local_name_fn<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let local = target_node(ctx, args)?
        .and_then(|n| n.name())
        .map(|q| q.local)
        .unwrap_or_default();
    Ok(XdmSequence::one(XdmAtomicValue::String(local)))
}

pub(super) fn root_fn<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(match target_node(ctx, args)? {
        Some(n) => XdmSequence::one(XdmItem::Node(n.root())),
        None => XdmSequence::empty(),
    })
}
