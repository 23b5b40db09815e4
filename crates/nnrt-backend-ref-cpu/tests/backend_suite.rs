nnrt_backend_tests::define_backend_tests!(
    cpu_suite,
    nnrt_backend_ref_cpu::BACKEND_ID,
    nnrt_backend_ref_cpu::register
);
