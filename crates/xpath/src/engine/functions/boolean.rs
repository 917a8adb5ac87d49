use crate::engine::evaluator::atomize::effective_boolean_value;
use crate::engine::functions::CallCtx;
use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::XdmSequence;

pub(super) fn fn_true<N: XdmNode>(
    _ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(XdmSequence::boolean(true))
}

pub(super) fn fn_false<N: XdmNode>(
    _ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(XdmSequence::boolean(false))
}

pub(super) fn fn_not<N: XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let b = effective_boolean_value(&args[0])?;
    Ok(XdmSequence::boolean(!b))
}

pub(super) fn fn_boolean<N: XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let b = effective_boolean_value(&args[0])?;
    Ok(XdmSequence::boolean(b))
}
