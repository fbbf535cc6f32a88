use nnadapt::core::{Attributes, FuseCode, OperationKind};
use nnadapt::executor::HostTensor;
use nnadapt::DType;

use crate::harness::{assert_close, random_tensor, random_values, rng, run_op, widen, PrecisionTarget};

/// Numpy-style broadcast of two row-major buffers, combined with `f`.
fn broadcast(
    lhs: (&[usize], &[f64]),
    rhs: (&[usize], &[f64]),
    f: impl Fn(f64, f64) -> f64,
) -> (Vec<usize>, Vec<f64>) {
    let rank = lhs.0.len().max(rhs.0.len());
    let pad = |shape: &[usize]| {
        let mut padded = vec![1; rank - shape.len()];
        padded.extend_from_slice(shape);
        padded
    };
    let (ls, rs) = (pad(lhs.0), pad(rhs.0));
    let out = ls
        .iter()
        .zip(&rs)
        .map(|(&a, &b)| a.max(b))
        .collect::<Vec<_>>();
    let total = out.iter().product::<usize>();

    let offset = |shape: &[usize], coords: &[usize]| {
        shape.iter().zip(coords).fold(0, |acc, (&extent, &coord)| {
            acc * extent + if extent == 1 { 0 } else { coord }
        })
    };
    let mut values = Vec::with_capacity(total);
    let mut coords = vec![0; rank];
    for _ in 0..total {
        values.push(f(lhs.1[offset(&ls, &coords)], rhs.1[offset(&rs, &coords)]));
        for axis in (0..rank).rev() {
            coords[axis] += 1;
            if coords[axis] < out[axis] {
                break;
            }
            coords[axis] = 0;
        }
    }
    (out, values)
}

fn check_binary<T: PrecisionTarget + ?Sized>(
    target: &T,
    kind: OperationKind,
    fuse_code: FuseCode,
    lhs: HostTensor,
    rhs: HostTensor,
    f: impl Fn(f64, f64) -> f64,
) {
    let (lv, rv) = (widen(&lhs), widen(&rhs));
    let (shape, expected) = broadcast((lhs.shape(), lv.as_slice()), (rhs.shape(), rv.as_slice()), f);
    let actual = run_op(target, kind, Attributes::Elementwise { fuse_code }, &[lhs, rhs]);
    assert_eq!(actual.shape(), shape.as_slice());
    assert_close(target, &expected, &actual);
}

pub fn add_broadcasts_trailing_vector<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(21);
    let lhs = random_tensor(&mut rng, &[2, 3, 4]);
    let rhs = random_tensor(&mut rng, &[4]);
    check_binary(target, OperationKind::Add, FuseCode::None, lhs, rhs, |a, b| a + b);
}

pub fn sub_and_mul_broadcast_both_sides<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(22);
    let lhs = random_tensor(&mut rng, &[2, 1, 5]);
    let rhs = random_tensor(&mut rng, &[3, 1]);
    check_binary(target, OperationKind::Sub, FuseCode::None, lhs.clone(), rhs.clone(), |a, b| a - b);
    check_binary(target, OperationKind::Mul, FuseCode::None, lhs, rhs, |a, b| a * b);
}

pub fn div_with_fused_relu6<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(23);
    let lhs = random_tensor(&mut rng, &[4, 6]);
    let rhs = HostTensor::from_f32(&[6], random_values(&mut rng, 6, 0.25, 2.0)).unwrap();
    check_binary(target, OperationKind::Div, FuseCode::Relu6, lhs, rhs, |a, b| {
        (a / b).clamp(0.0, 6.0)
    });
}

pub fn max_and_min_pick_elementwise<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(24);
    let lhs = random_tensor(&mut rng, &[3, 7]);
    let rhs = random_tensor(&mut rng, &[3, 7]);
    check_binary(target, OperationKind::Max, FuseCode::None, lhs.clone(), rhs.clone(), f64::max);
    check_binary(target, OperationKind::Min, FuseCode::Relu1, lhs, rhs, |a, b| {
        a.min(b).clamp(-1.0, 1.0)
    });
}

pub fn greater_equal_yields_booleans<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(25);
    let lhs = random_tensor(&mut rng, &[5, 4]);
    let rhs = random_tensor(&mut rng, &[4]);
    let (lv, rv) = (widen(&lhs), widen(&rhs));
    let (_, expected) = broadcast(
        (lhs.shape(), lv.as_slice()),
        (rhs.shape(), rv.as_slice()),
        |a, b| if a >= b { 1.0 } else { 0.0 },
    );
    let actual = run_op(
        target,
        OperationKind::GreaterEqual,
        Attributes::Comparison,
        &[lhs, rhs],
    );
    assert_eq!(actual.dtype(), DType::Bool8);
    assert_close(target, &expected, &actual);
}
