use super::operand::Layout;
use super::operation::OperationIndex;

/// Run of consecutive operations assigned to the same backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSequence {
    backend_id: String,
    layout: Layout,
    operations: Vec<OperationIndex>,
}

impl OpSequence {
    pub fn new(backend_id: impl Into<String>, layout: Layout) -> Self {
        Self {
            backend_id: backend_id.into(),
            layout,
            operations: Vec::new(),
        }
    }

    pub fn append(&mut self, index: OperationIndex) {
        self.operations.push(index);
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> &[OperationIndex] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
