use nnrt::backend::spec::Config;
use nnrt::ir::{Layout, Operation};
use nnrt::util::timer::{CpuTimer, Timer};

use crate::BACKEND_ID;

#[derive(Debug, Default, Clone, Copy)]
pub struct CpuConfig;

impl Config for CpuConfig {
    fn id(&self) -> &str {
        BACKEND_ID
    }

    fn support_layout(&self, _operation: &Operation, _frontend_layout: Layout) -> Layout {
        Layout::Nhwc
    }

    fn supports_permutation(&self) -> bool {
        false
    }

    fn supports_dynamic_tensor(&self) -> bool {
        false
    }

    fn supports_fp16(&self) -> bool {
        false
    }

    fn timer(&self) -> Box<dyn Timer> {
        Box::new(CpuTimer::new())
    }
}
