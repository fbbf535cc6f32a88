use nnadapt::core::{Attributes, OperationKind};
use nnadapt::executor::HostTensor;

use crate::harness::{assert_close, random_tensor, random_values, rng, run_op, widen, PrecisionTarget};

/// `[batch, m, k] x [batch, k, n]` (or `[batch, n, k]` when `transpose_y`) in f64.
fn naive_matmul(
    x: &[f64],
    y: &[f64],
    (batch, m, k, n): (usize, usize, usize, usize),
    transpose_y: bool,
) -> Vec<f64> {
    let mut out = vec![0.0; batch * m * n];
    for b in 0..batch {
        for i in 0..m {
            for j in 0..n {
                out[(b * m + i) * n + j] = (0..k)
                    .map(|p| {
                        let rhs = if transpose_y {
                            y[(b * n + j) * k + p]
                        } else {
                            y[(b * k + p) * n + j]
                        };
                        x[(b * m + i) * k + p] * rhs
                    })
                    .sum();
            }
        }
    }
    out
}

pub fn matmul_matches_naive<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(31);
    for &(m, k, n) in &[(1, 1, 1), (4, 5, 1), (7, 13, 9)] {
        let x = random_tensor(&mut rng, &[m, k]);
        let y = random_tensor(&mut rng, &[k, n]);
        let expected = naive_matmul(&widen(&x), &widen(&y), (1, m, k, n), false);
        let actual = run_op(
            target,
            OperationKind::MatMul,
            Attributes::MatMul {
                transpose_x: false,
                transpose_y: false,
            },
            &[x, y],
        );
        assert_eq!(actual.shape(), &[m, n]);
        assert_close(target, &expected, &actual);
    }
}

pub fn batched_matmul_with_transposed_rhs<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(32);
    let (batch, m, k, n) = (2, 3, 8, 4);
    let x = random_tensor(&mut rng, &[batch, m, k]);
    let y = random_tensor(&mut rng, &[batch, n, k]);
    let expected = naive_matmul(&widen(&x), &widen(&y), (batch, m, k, n), true);
    let actual = run_op(
        target,
        OperationKind::MatMul,
        Attributes::MatMul {
            transpose_x: false,
            transpose_y: true,
        },
        &[x, y],
    );
    assert_eq!(actual.shape(), &[batch, m, n]);
    assert_close(target, &expected, &actual);
}

pub fn softmax_last_axis_matches_baseline<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(33);
    let x = random_tensor(&mut rng, &[3, 4, 7]);
    let rows = widen(&x);
    let expected = rows
        .chunks(7)
        .flat_map(|row| {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exps = row.iter().map(|v| (v - max).exp()).collect::<Vec<_>>();
            let sum = exps.iter().sum::<f64>();
            exps.into_iter().map(move |e| e / sum)
        })
        .collect::<Vec<_>>();
    let actual = run_op(target, OperationKind::Softmax, Attributes::Softmax { axis: -1 }, &[x]);
    assert_close(target, &expected, &actual);
}

pub fn softmax_leading_axis_sums_to_one<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(34);
    let x = random_tensor(&mut rng, &[5, 6]);
    let actual = run_op(target, OperationKind::Softmax, Attributes::Softmax { axis: 0 }, &[x]);
    let values = widen(&actual);
    let sums = (0..6)
        .map(|col| (0..5).map(|row| values[row * 6 + col]).sum::<f64>())
        .collect::<Vec<_>>();
    let columns = HostTensor::from_f32(&[6], sums.iter().map(|&s| s as f32).collect()).unwrap();
    assert_close(target, &[1.0; 6], &columns);
}

pub fn batch_normalization_matches_formula<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(35);
    let (n, c, h, w) = (2, 3, 2, 2);
    let x = random_tensor(&mut rng, &[n, c, h, w]);
    let params = [
        random_values(&mut rng, c, 0.5, 1.5),
        random_values(&mut rng, c, -1.0, 1.0),
        random_values(&mut rng, c, -0.5, 0.5),
        random_values(&mut rng, c, 0.5, 2.0),
    ];
    let epsilon = 1e-5;
    let xs = widen(&x);
    let expected = xs
        .iter()
        .enumerate()
        .map(|(index, &v)| {
            let ch = (index / (h * w)) % c;
            let [scale, bias, mean, var] = [0, 1, 2, 3].map(|p| f64::from(params[p][ch]));
            scale * (v - mean) / (var + epsilon).sqrt() + bias
        })
        .collect::<Vec<_>>();

    let mut inputs = vec![x];
    inputs.extend(
        params
            .into_iter()
            .map(|values| HostTensor::from_f32(&[c], values).unwrap()),
    );
    let actual = run_op(
        target,
        OperationKind::BatchNormalization,
        Attributes::BatchNormalization {
            epsilon: epsilon as f32,
        },
        &inputs,
    );
    assert_close(target, &expected, &actual);
}
