//! Precision suites shared by every execution target.
//!
//! Each suite builds a small graph, runs it on a [`PrecisionTarget`] and
//! compares the result against an f64 baseline computed here, within the
//! target's absolute tolerance.

pub mod activations;
pub mod elementwise;
pub mod harness;
pub mod linalg;
pub mod movement;

pub use harness::{PrecisionTarget, HOST_ABS_ERROR};

#[macro_export]
macro_rules! define_backend_tests {
    ($module:ident, $target_ctor:expr) => {
        #[cfg(test)]
        mod $module {
            use $crate::{activations, elementwise, linalg, movement};

            macro_rules! precision_test {
                ($name:ident, $func:path) => {
                    #[test]
                    fn $name() {
                        let target = ($target_ctor)();
                        $func(&target);
                    }
                };
            }

            precision_test!(activations_relu_family, activations::relu_family_matches_baseline);
            precision_test!(activations_sigmoid_family, activations::sigmoid_family_matches_baseline);
            precision_test!(activations_gelu, activations::gelu_matches_baseline);
            precision_test!(activations_softplus, activations::softplus_matches_baseline);
            precision_test!(elementwise_add_broadcast, elementwise::add_broadcasts_trailing_vector);
            precision_test!(elementwise_sub_mul_broadcast, elementwise::sub_and_mul_broadcast_both_sides);
            precision_test!(elementwise_div_relu6, elementwise::div_with_fused_relu6);
            precision_test!(elementwise_max_min, elementwise::max_and_min_pick_elementwise);
            precision_test!(elementwise_greater_equal, elementwise::greater_equal_yields_booleans);
            precision_test!(linalg_matmul, linalg::matmul_matches_naive);
            precision_test!(linalg_batched_matmul_transposed, linalg::batched_matmul_with_transposed_rhs);
            precision_test!(linalg_softmax_last_axis, linalg::softmax_last_axis_matches_baseline);
            precision_test!(linalg_softmax_leading_axis, linalg::softmax_leading_axis_sums_to_one);
            precision_test!(linalg_batch_normalization, linalg::batch_normalization_matches_formula);
            precision_test!(movement_squeeze, movement::squeeze_keeps_values);
            precision_test!(movement_unsqueeze_flatten, movement::unsqueeze_then_flatten_keeps_values);
            precision_test!(movement_transpose, movement::transpose_matches_index_map);
            precision_test!(movement_concat, movement::concat_interleaves_rows);
            precision_test!(movement_split, movement::split_partitions_axis);
        }
    };
}
