//! Backend-agnostic test suite.
//!
//! A backend crate instantiates the whole suite with
//! `nnrt_backend_tests::define_backend_tests!(suite, BACKEND_ID, register);` in one of its
//! integration tests. Every check compiles small graphs onto the backend and compares the
//! results with hand-computed values or with the CPU reference backend.

pub mod harness;
pub mod models;
pub mod parity;
pub mod smoke;

pub use nnrt::backend::registry::BackendRegistry;

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly `fmt` subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[macro_export]
macro_rules! define_backend_tests {
    ($module:ident, $backend_id:expr, $register:path) => {
        #[cfg(test)]
        mod $module {
            use $crate::{models, parity, smoke};

            fn registry() -> $crate::BackendRegistry {
                $crate::init_test_logging();
                let mut registry = $crate::harness::reference_registry();
                $register(&mut registry);
                registry
            }

            #[test]
            fn smoke_add_matches_expected() {
                smoke::add_matches_expected(&registry(), $backend_id);
            }

            #[test]
            fn smoke_relu6_clamps_extremes() {
                smoke::relu6_clamps_extremes(&registry(), $backend_id);
            }

            #[test]
            fn smoke_conv2d_matches_expected() {
                smoke::conv2d_matches_expected(&registry(), $backend_id);
            }

            #[test]
            fn smoke_conv2d_same_stride2_matches_expected() {
                smoke::conv2d_same_stride2_matches_expected(&registry(), $backend_id);
            }

            #[test]
            fn smoke_depthwise_multiplier_matches_expected() {
                smoke::depthwise_multiplier_matches_expected(&registry(), $backend_id);
            }

            #[test]
            fn smoke_avg_pool_padding_matches_expected() {
                smoke::avg_pool_padding_matches_expected(&registry(), $backend_id);
            }

            #[test]
            fn smoke_softmax_rows_sum_to_one() {
                smoke::softmax_rows_sum_to_one(&registry(), $backend_id);
            }

            #[test]
            fn smoke_run_is_idempotent() {
                smoke::run_is_idempotent(&registry(), $backend_id);
            }

            #[test]
            fn smoke_inputs_can_change_between_runs() {
                smoke::inputs_can_change_between_runs(&registry(), $backend_id);
            }

            #[test]
            fn smoke_run_profiled_times_each_sequence() {
                smoke::run_profiled_times_each_sequence(&registry(), $backend_id);
            }

            #[test]
            fn parity_relu() {
                parity::matches_reference(&registry(), $backend_id, &models::relu());
            }

            #[test]
            fn parity_relu6() {
                parity::matches_reference(&registry(), $backend_id, &models::relu6());
            }

            #[test]
            fn parity_add_two_inputs() {
                parity::matches_reference(&registry(), $backend_id, &models::add_two_inputs());
            }

            #[test]
            fn parity_add_constant_broadcast() {
                parity::matches_reference(&registry(), $backend_id, &models::add_constant_broadcast());
            }

            #[test]
            fn parity_conv2d_same_strided() {
                parity::matches_reference(&registry(), $backend_id, &models::conv2d_same_strided());
            }

            #[test]
            fn parity_conv2d_valid_dilated() {
                parity::matches_reference(&registry(), $backend_id, &models::conv2d_valid_dilated());
            }

            #[test]
            fn parity_depthwise_conv2d() {
                parity::matches_reference(&registry(), $backend_id, &models::depthwise_conv2d());
            }

            #[test]
            fn parity_avg_pool2d() {
                parity::matches_reference(&registry(), $backend_id, &models::avg_pool2d());
            }

            #[test]
            fn parity_squeeze() {
                parity::matches_reference(&registry(), $backend_id, &models::squeeze());
            }

            #[test]
            fn parity_softmax() {
                parity::matches_reference(&registry(), $backend_id, &models::softmax());
            }

            #[test]
            fn parity_two_rhombs() {
                parity::matches_reference(&registry(), $backend_id, &models::two_rhombs());
            }

            #[test]
            fn parity_conv_dw_conv() {
                parity::matches_reference(&registry(), $backend_id, &models::conv_dw_conv());
            }

            #[test]
            fn parity_mixed_rhombs() {
                parity::mixed_rhombs_match_reference(&registry(), $backend_id);
            }

            #[test]
            fn parity_mixed_chain() {
                parity::mixed_chain_matches_reference(&registry(), $backend_id);
            }
        }
    };
}
