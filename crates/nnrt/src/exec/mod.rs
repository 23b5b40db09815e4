//! Executable units produced by kernel generators.

use crate::backend::spec::BackendResult;
use std::fmt;

/// A prepared, runnable piece of work.
pub trait Function: Send {
    fn run(&mut self) -> BackendResult<()>;

    /// Runs and waits for completion. Synchronous backends need not override it.
    fn run_sync(&mut self) -> BackendResult<()> {
        self.run()
    }
}

/// Functions executed strictly in append order.
#[derive(Default)]
pub struct FunctionSequence {
    functions: Vec<Box<dyn Function>>,
}

impl FunctionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, function: Box<dyn Function>) {
        self.functions.push(function);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Function for FunctionSequence {
    fn run(&mut self) -> BackendResult<()> {
        for function in &mut self.functions {
            function.run()?;
        }
        Ok(())
    }

    fn run_sync(&mut self) -> BackendResult<()> {
        for function in &mut self.functions {
            function.run_sync()?;
        }
        Ok(())
    }
}

impl fmt::Debug for FunctionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSequence")
            .field("len", &self.functions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::spec::BackendError;
    use std::sync::{Arc, Mutex};

    struct Record {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl Function for Record {
        fn run(&mut self) -> BackendResult<()> {
            self.log.lock().unwrap().push(self.id);
            if self.fail {
                Err(BackendError::execution(format!("function {} failed", self.id)))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn sequence_runs_in_append_order_and_stops_on_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sequence = FunctionSequence::new();
        for (id, fail) in [(0, false), (1, false), (2, true), (3, false)] {
            sequence.append(Box::new(Record {
                id,
                log: log.clone(),
                fail,
            }));
        }
        assert_eq!(sequence.len(), 4);
        let err = sequence.run_sync().unwrap_err();
        assert_eq!(err, BackendError::execution("function 2 failed"));
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }
}
