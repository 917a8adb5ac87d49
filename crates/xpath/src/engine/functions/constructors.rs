//! `xs:*` constructor functions, e.g. `xs:decimal("1.50")`.
use crate::consts::XS;
use crate::engine::evaluator::casting::cast_atomic;
use crate::engine::functions::{CallCtx, FunctionLibrary};
use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};

const CONSTRUCTIBLE: &[&str] = &[
    "string",
    "boolean",
    "decimal",
    "float",
    "double",
    "integer",
    "long",
    "int",
    "short",
    "byte",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
    "nonPositiveInteger",
    "negativeInteger",
    "nonNegativeInteger",
    "positiveInteger",
    "duration",
    "yearMonthDuration",
    "dayTimeDuration",
    "dateTime",
    "date",
    "time",
    "anyURI",
    "QName",
    "base64Binary",
    "hexBinary",
    "untypedAtomic",
    "normalizedString",
    "token",
    "language",
    "Name",
    "NCName",
    "NMTOKEN",
    "ID",
    "IDREF",
    "ENTITY",
];

pub(super) fn register<N: XdmNode>(lib: &mut FunctionLibrary<N>) {
    for local in CONSTRUCTIBLE {
        let target = ExpandedName::xs(local);
        lib.register_ns(XS, local, 1, move |ctx: &CallCtx<'_, N>, args: &[XdmSequence<N>]| {
            construct(ctx, &target, &args[0])
        });
    }
}

fn construct<N: XdmNode>(
    ctx: &CallCtx<N>,
    target: &ExpandedName,
    arg: &XdmSequence<N>,
) -> Result<XdmSequence<N>, Error> {
    let atoms = ctx.atomize(arg.clone())?;
    if atoms.len() > 1 {
        return Err(Error::type_error(format!(
            "{target}() expects at most one item, got {}",
            atoms.len()
        )));
    }
    match atoms.into_single() {
        None => Ok(XdmSequence::empty()),
        Some(XdmItem::Atomic(a)) => Ok(XdmSequence::one(cast_atomic(ctx.types, &a, target)?)),
        Some(XdmItem::Node(_)) => Err(Error::type_error("atomization produced a node")),
    }
}
