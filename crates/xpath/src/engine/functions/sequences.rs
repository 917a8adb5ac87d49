use crate::engine::functions::CallCtx;
use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmSequence};

fn integer<N>(n: usize) -> XdmSequence<N> {
    XdmSequence::one(XdmAtomicValue::Integer(i64::try_from(n).unwrap_or(i64::MAX)))
}

pub(super) fn empty_fn<N: XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(XdmSequence::boolean(args[0].is_empty()))
}

pub(super) fn exists_fn<N: XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(XdmSequence::boolean(!args[0].is_empty()))
}

pub(super) fn count_fn<N: XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(integer(args[0].len()))
}

pub(super) fn position_fn<N: XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    ctx.require_context_item()?;
    Ok(integer(ctx.focus.position))
}

pub(super) fn last_fn<N: XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    ctx.require_context_item()?;
    Ok(integer(ctx.focus.size))
}

pub(super) fn data_fn<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    match args.first() {
        Some(seq) => ctx.atomize(seq.clone()),
        None => {
            let item = ctx.require_context_item()?.clone();
            ctx.atomize(XdmSequence::one(item))
        }
    }
}
