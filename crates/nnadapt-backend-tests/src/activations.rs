use nnadapt::core::{Attributes, OperationKind};

use crate::harness::{assert_close, random_tensor, rng, run_op, widen, PrecisionTarget};

fn check_unary<T, F>(target: &T, kind: OperationKind, attrs: Attributes, seed: u64, baseline: F)
where
    T: PrecisionTarget + ?Sized,
    F: Fn(f64) -> f64,
{
    let mut rng = rng(seed);
    let x = random_tensor(&mut rng, &[2, 3, 17]);
    let expected = widen(&x).into_iter().map(baseline).collect::<Vec<_>>();
    let actual = run_op(target, kind, attrs, &[x]);
    assert_eq!(actual.shape(), &[2, 3, 17]);
    assert_close(target, &expected, &actual);
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn relu_family_matches_baseline<T: PrecisionTarget + ?Sized>(target: &T) {
    check_unary(target, OperationKind::Relu, Attributes::None, 1, |x| x.max(0.0));
    check_unary(target, OperationKind::Relu6, Attributes::None, 2, |x| x.clamp(0.0, 6.0));
    check_unary(
        target,
        OperationKind::LeakyRelu,
        Attributes::LeakyRelu { alpha: 0.1 },
        3,
        |x| if x >= 0.0 { x } else { 0.1 * x },
    );
}

pub fn sigmoid_family_matches_baseline<T: PrecisionTarget + ?Sized>(target: &T) {
    check_unary(target, OperationKind::Sigmoid, Attributes::None, 4, sigmoid);
    check_unary(target, OperationKind::Swish, Attributes::None, 5, |x| x * sigmoid(x));
    check_unary(target, OperationKind::Tanh, Attributes::None, 6, f64::tanh);
    check_unary(
        target,
        OperationKind::HardSigmoid,
        Attributes::HardSigmoid {
            alpha: 0.2,
            beta: 0.5,
        },
        7,
        |x| (0.2 * x + 0.5).clamp(0.0, 1.0),
    );
    check_unary(target, OperationKind::HardSwish, Attributes::None, 8, |x| {
        x * (x + 3.0).clamp(0.0, 6.0) / 6.0
    });
}

pub fn gelu_matches_baseline<T: PrecisionTarget + ?Sized>(target: &T) {
    check_unary(
        target,
        OperationKind::Gelu,
        Attributes::Gelu { approximate: false },
        9,
        |x| 0.5 * x * (1.0 + libm::erf(x / std::f64::consts::SQRT_2)),
    );
    check_unary(
        target,
        OperationKind::Gelu,
        Attributes::Gelu { approximate: true },
        10,
        |x| {
            let inner = (2.0 / std::f64::consts::PI).sqrt() * (x + 0.044715 * x.powi(3));
            0.5 * x * (1.0 + inner.tanh())
        },
    );
}

pub fn softplus_matches_baseline<T: PrecisionTarget + ?Sized>(target: &T) {
    check_unary(
        target,
        OperationKind::Softplus,
        Attributes::Softplus {
            beta: 2.0,
            threshold: 4.0,
        },
        11,
        |x| {
            if 2.0 * x > 4.0 {
                x
            } else {
                (1.0 + (2.0 * x).exp()).ln() / 2.0
            }
        },
    );
}
