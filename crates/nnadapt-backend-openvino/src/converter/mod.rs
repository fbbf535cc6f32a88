//! Converter table of the OpenVINO driver, one module per operation family.
//!
//! Every converter reads its input outputs from the context cache, appends
//! opset nodes and binds each output operand exactly once.

pub mod batch_normalization;
pub mod cast;
pub mod conv2d;
pub mod elementwise;
pub mod mat_mul;
pub mod pool2d;
pub mod shape;
pub mod softmax;
pub mod unary_activations;

use nnadapt::converter::{ConverterContext, RegistryBuilder};
use nnadapt::core::{AutoPad, FuseCode};
use nnadapt::error::Result;
use nnadapt::register_converters;

use crate::context::OpenVinoContext;
use crate::ov::{attrs, Attrs, Output};

/// Fills `builder` with the converter of every supported kind.
pub fn register_all(builder: &mut RegistryBuilder<OpenVinoContext>) -> Result<()> {
    use batch_normalization::convert_batch_normalization;
    use cast::convert_cast;
    use conv2d::{convert_conv2d, convert_conv2d_transpose};
    use elementwise::convert_elementwise;
    use mat_mul::convert_mat_mul;
    use pool2d::convert_pool2d;
    use shape::{
        convert_concat, convert_flatten, convert_reshape, convert_slice, convert_split,
        convert_squeeze, convert_stack, convert_transpose, convert_unsqueeze, validate_flatten,
    };
    use softmax::convert_softmax;
    use unary_activations::{convert_unary_activations, validate_softplus};

    register_converters!(*builder, {
        Abs => convert_unary_activations,
        Add => convert_elementwise,
        Assign => convert_unary_activations,
        AveragePool2d => convert_pool2d,
        BatchNormalization => convert_batch_normalization,
        Cast => convert_cast,
        Concat => convert_concat,
        Conv2d => convert_conv2d,
        Conv2dTranspose => convert_conv2d_transpose,
        Div => convert_elementwise,
        Equal => convert_elementwise,
        Exp => convert_unary_activations,
        Flatten => convert_flatten [validate = validate_flatten],
        Floor => convert_unary_activations,
        Gelu => convert_unary_activations,
        GreaterEqual => convert_elementwise,
        HardSigmoid => convert_unary_activations,
        HardSwish => convert_unary_activations,
        LeakyRelu => convert_unary_activations,
        Log => convert_unary_activations,
        MatMul => convert_mat_mul,
        Max => convert_elementwise,
        MaxPool2d => convert_pool2d,
        Min => convert_elementwise,
        Mul => convert_elementwise,
        Pow => convert_elementwise,
        Relu => convert_unary_activations,
        Relu6 => convert_unary_activations,
        Reshape => convert_reshape,
        Sigmoid => convert_unary_activations,
        Slice => convert_slice,
        Softmax => convert_softmax,
        Softplus => convert_unary_activations [validate = validate_softplus],
        Split => convert_split,
        Squeeze => convert_squeeze,
        Stack => convert_stack,
        Sub => convert_elementwise,
        Swish => convert_unary_activations,
        Tanh => convert_unary_activations,
        Transpose => convert_transpose,
        Unsqueeze => convert_unsqueeze,
    })
}

/// Appends the activation folded into an arithmetic or spatial kind.
pub(crate) fn apply_fuse_code(ctx: &mut OpenVinoContext, value: Output, fuse: FuseCode) -> Result<Output> {
    let (min, max) = match fuse {
        FuseCode::None => return Ok(value),
        FuseCode::Relu => {
            let port = ctx.port(value)?;
            return Ok(ctx.add_op("Relu", vec![value], Attrs::new(), port));
        }
        FuseCode::Relu1 => (-1.0f32, 1.0f32),
        FuseCode::Relu6 => (0.0f32, 6.0f32),
    };
    let port = ctx.port(value)?;
    Ok(ctx.add_op(
        "Clamp",
        vec![value],
        attrs([("min", min.into()), ("max", max.into())]),
        port,
    ))
}

/// Appends a `Transpose` by `perm`, where output axis `i` reads input axis `perm[i]`.
pub(crate) fn transpose(ctx: &mut OpenVinoContext, value: Output, perm: &[usize]) -> Result<Output> {
    let port = ctx.port(value)?;
    let shape = perm.iter().map(|&axis| port.shape[axis]).collect();
    let order = ctx.const_i64(&perm.iter().map(|&axis| axis as i64).collect::<Vec<_>>());
    Ok(ctx.add_op("Transpose", vec![value, order], Attrs::new(), port.with_shape(shape)))
}

/// Moves the trailing channel axis next to the batch axis.
pub(crate) fn channels_first_perm(rank: usize) -> Vec<usize> {
    let mut perm = vec![0, rank - 1];
    perm.extend(1..rank - 1);
    perm
}

/// Inverse of [`channels_first_perm`].
pub(crate) fn channels_last_perm(rank: usize) -> Vec<usize> {
    let mut perm = vec![0];
    perm.extend(2..rank);
    perm.push(1);
    perm
}

/// `(pads_begin, pads_end, auto_pad)` attributes of a 2-D window.
pub(crate) fn padding_attrs(auto_pad: AutoPad, pads: [i32; 4]) -> [(&'static str, crate::ov::AttrValue); 3] {
    let [top, bottom, left, right] = pads;
    let mode = match auto_pad {
        AutoPad::Explicit => "explicit",
        AutoPad::Same => "same_upper",
        AutoPad::Valid => "valid",
    };
    [
        ("pads_begin", vec![top as i64, left as i64].into()),
        ("pads_end", vec![bottom as i64, right as i64].into()),
        ("auto_pad", mode.into()),
    ]
}

pub(crate) fn to_i64(values: &[i32]) -> Vec<i64> {
    values.iter().map(|&v| v as i64).collect()
}

/// Binds the single output of `op` to `value`.
pub(crate) fn bind_single(
    ctx: &mut OpenVinoContext,
    op: &nnadapt::core::Operation,
    value: Output,
) -> Result<()> {
    ctx.bind(op.output(), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_permutations_are_inverse() {
        assert_eq!(channels_first_perm(4), vec![0, 3, 1, 2]);
        assert_eq!(channels_last_perm(4), vec![0, 2, 3, 1]);
        assert_eq!(channels_first_perm(2), vec![0, 1]);
        assert_eq!(channels_last_perm(3), vec![0, 2, 1]);
    }
}
