use nnadapt::core::{Attributes, Graph, OperationKind};
use nnadapt::operation::prepare_graph;

use crate::harness::{
    assert_close, f32_input, random_tensor, rng, run_op, widen, PrecisionTarget,
};

pub fn squeeze_keeps_values<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(41);
    let x = random_tensor(&mut rng, &[1, 3, 1, 5]);
    let expected = widen(&x);

    let all = run_op(target, OperationKind::Squeeze, Attributes::Squeeze { axes: vec![] }, &[x.clone()]);
    assert_eq!(all.shape(), &[3, 5]);
    assert_close(target, &expected, &all);

    let one = run_op(target, OperationKind::Squeeze, Attributes::Squeeze { axes: vec![-2] }, &[x]);
    assert_eq!(one.shape(), &[1, 3, 5]);
    assert_close(target, &expected, &one);
}

pub fn unsqueeze_then_flatten_keeps_values<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(42);
    let x = random_tensor(&mut rng, &[2, 3, 4]);
    let expected = widen(&x);

    let unsqueezed = run_op(
        target,
        OperationKind::Unsqueeze,
        Attributes::Unsqueeze { axes: vec![0, -1] },
        &[x],
    );
    assert_eq!(unsqueezed.shape(), &[1, 2, 3, 4, 1]);
    let flattened = run_op(
        target,
        OperationKind::Flatten,
        Attributes::Flatten {
            start_axis: 1,
            end_axis: 3,
        },
        &[unsqueezed],
    );
    assert_eq!(flattened.shape(), &[1, 24, 1]);
    assert_close(target, &expected, &flattened);
}

pub fn transpose_matches_index_map<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(43);
    let (a, b, c) = (2, 3, 4);
    let x = random_tensor(&mut rng, &[a, b, c]);
    let xs = widen(&x);
    // Output [c, a, b] reads input [i, j, k] at out[k][i][j].
    let mut expected = Vec::with_capacity(xs.len());
    for k in 0..c {
        for i in 0..a {
            for j in 0..b {
                expected.push(xs[(i * b + j) * c + k]);
            }
        }
    }
    let actual = run_op(
        target,
        OperationKind::Transpose,
        Attributes::Transpose { perm: vec![2, 0, 1] },
        &[x],
    );
    assert_eq!(actual.shape(), &[c, a, b]);
    assert_close(target, &expected, &actual);
}

pub fn concat_interleaves_rows<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(44);
    let lhs = random_tensor(&mut rng, &[2, 3]);
    let rhs = random_tensor(&mut rng, &[2, 2]);
    let (l, r) = (widen(&lhs), widen(&rhs));
    let expected = (0..2)
        .flat_map(|row| {
            l[row * 3..row * 3 + 3]
                .iter()
                .chain(&r[row * 2..row * 2 + 2])
                .copied()
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let actual = run_op(target, OperationKind::Concat, Attributes::Concat { axis: -1 }, &[lhs, rhs]);
    assert_eq!(actual.shape(), &[2, 5]);
    assert_close(target, &expected, &actual);
}

pub fn split_partitions_axis<T: PrecisionTarget + ?Sized>(target: &T) {
    let mut rng = rng(45);
    let x = random_tensor(&mut rng, &[3, 6]);
    let xs = widen(&x);

    let mut graph = Graph::new();
    let input = f32_input(&mut graph, &[3, 6]);
    let parts = graph
        .add_operation(
            OperationKind::Split,
            Attributes::Split {
                axis: 1,
                split: vec![2, 4],
            },
            &[input],
            2,
        )
        .unwrap();
    for part in &parts {
        graph.mark_output(*part).unwrap();
    }
    prepare_graph(&mut graph).unwrap();
    let outputs = target.run(&graph, &[x]).unwrap();
    assert_eq!(outputs.len(), 2);

    for (output, (start, width)) in outputs.iter().zip([(0, 2), (2, 4)]) {
        assert_eq!(output.shape(), &[3, width]);
        let expected = (0..3)
            .flat_map(|row| xs[row * 6 + start..row * 6 + start + width].to_vec())
            .collect::<Vec<_>>();
        assert_close(target, &expected, output);
    }
}
