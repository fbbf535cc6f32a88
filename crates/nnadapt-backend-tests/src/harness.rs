use nnadapt::core::{Attributes, Graph, OperandId, OperandType, OperationKind};
use nnadapt::executor::{HostExecutor, HostTensor, HOST_TARGET};
use nnadapt::operation::prepare_graph;
use nnadapt::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const HOST_ABS_ERROR: f32 = 2e-5;

/// Anything that can execute a prepared graph and hand back host tensors.
pub trait PrecisionTarget {
    fn name(&self) -> &str;

    /// Largest absolute deviation from the f64 baseline the target may show.
    fn abs_error(&self) -> f32;

    fn run(&self, graph: &Graph, inputs: &[HostTensor]) -> Result<Vec<HostTensor>>;
}

impl PrecisionTarget for HostExecutor {
    fn name(&self) -> &str {
        HOST_TARGET
    }

    fn abs_error(&self) -> f32 {
        HOST_ABS_ERROR
    }

    fn run(&self, graph: &Graph, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        HostExecutor::run(self, graph, inputs)
    }
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn random_values(rng: &mut StdRng, len: usize, low: f32, high: f32) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(low..high)).collect()
}

pub fn random_tensor(rng: &mut StdRng, shape: &[usize]) -> HostTensor {
    let len = shape.iter().product();
    HostTensor::from_f32(shape, random_values(rng, len, -3.0, 3.0)).unwrap()
}

pub fn dims(shape: &[usize]) -> Vec<i32> {
    shape.iter().map(|&extent| extent as i32).collect()
}

pub fn f32_input(graph: &mut Graph, shape: &[usize]) -> OperandId {
    graph.add_input(OperandType::float32(&dims(shape)).unwrap())
}

/// Prepares `graph`, runs it on `target` and returns the single output.
pub fn run_single<T: PrecisionTarget + ?Sized>(
    target: &T,
    mut graph: Graph,
    output: OperandId,
    inputs: &[HostTensor],
) -> HostTensor {
    graph.mark_output(output).unwrap();
    prepare_graph(&mut graph).unwrap();
    let mut outputs = target
        .run(&graph, inputs)
        .unwrap_or_else(|err| panic!("{} failed: {err}", target.name()));
    assert_eq!(outputs.len(), 1);
    outputs.remove(0)
}

/// One-operation graph over f32 inputs of the given shapes.
pub fn run_op<T: PrecisionTarget + ?Sized>(
    target: &T,
    kind: OperationKind,
    attrs: Attributes,
    inputs: &[HostTensor],
) -> HostTensor {
    let mut graph = Graph::new();
    let ids = inputs
        .iter()
        .map(|tensor| f32_input(&mut graph, tensor.shape()))
        .collect::<Vec<_>>();
    let output = graph.add_unary_output(kind, attrs, &ids).unwrap();
    run_single(target, graph, output, inputs)
}

pub fn assert_close<T: PrecisionTarget + ?Sized>(target: &T, expected: &[f64], actual: &HostTensor) {
    let actual = actual.to_f32_vec();
    assert_eq!(expected.len(), actual.len());
    let atol = target.abs_error() as f64;
    for (idx, (&e, &a)) in expected.iter().zip(actual.iter()).enumerate() {
        let diff = (e - a as f64).abs();
        assert!(
            diff <= atol,
            "{}: value mismatch at index {idx}: expected {e}, actual {a}, diff {diff}, atol {atol}",
            target.name()
        );
    }
}

pub fn widen(tensor: &HostTensor) -> Vec<f64> {
    tensor.to_f32_vec().into_iter().map(f64::from).collect()
}
