//! Graph tensors and the byte buffers behind them.
//!
//! A [`Tensor`] is created once per operand by the orchestrator and shared as `Arc<Tensor>`
//! between every backend that touches the operand. Its storage is bound at most once, either
//! to a buffer the runtime allocated ([`BufferOwnership::External`]) or to a buffer exported
//! by a backend's private engine ([`BufferOwnership::Embedded`]).

use super::spec::{BackendError, BackendResult};
use crate::ir::{DataType, Layout, OperandIndex, OperandInfo};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Reference-counted byte storage shared between tensors and engine slots.
///
/// Identity is pointer identity (`Arc::ptr_eq`).
pub type SharedBuffer = Arc<RwLock<Box<[u8]>>>;

/// Allocates a zeroed buffer, reporting allocation failure instead of aborting.
pub fn allocate_buffer(len: usize) -> BackendResult<SharedBuffer> {
    let mut bytes: Vec<u8> = Vec::new();
    bytes.try_reserve_exact(len).map_err(|err| {
        BackendError::resource_exhausted(format!("failed to allocate {len} bytes: {err}"))
    })?;
    bytes.resize(len, 0);
    Ok(Arc::new(RwLock::new(bytes.into_boxed_slice())))
}

/// Scoped access helpers for [`SharedBuffer`].
pub trait BufferAccess {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> BackendResult<R>;

    fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> BackendResult<R>;

    fn byte_len(&self) -> BackendResult<usize> {
        self.with_bytes(|bytes| bytes.len())
    }

    fn read_f32(&self) -> BackendResult<Vec<f32>> {
        self.with_bytes(bytes_to_f32)?
    }

    fn write_f32(&self, values: &[f32]) -> BackendResult<()> {
        self.with_bytes_mut(|bytes| f32_to_bytes(values, bytes))?
    }
}

impl BufferAccess for RwLock<Box<[u8]>> {
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> BackendResult<R> {
        let guard = self
            .read()
            .map_err(|_| BackendError::invariant("tensor buffer lock poisoned"))?;
        Ok(f(&guard))
    }

    fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> BackendResult<R> {
        let mut guard = self
            .write()
            .map_err(|_| BackendError::invariant("tensor buffer lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

/// Copies `src` into `dst`; a buffer copied onto itself is left untouched.
pub fn copy_buffer(dst: &SharedBuffer, src: &SharedBuffer) -> BackendResult<()> {
    if Arc::ptr_eq(dst, src) {
        return Ok(());
    }
    src.with_bytes(|from| {
        dst.with_bytes_mut(|to| {
            if to.len() != from.len() {
                return Err(BackendError::invariant(format!(
                    "buffer copy length mismatch: {} bytes into {} bytes",
                    from.len(),
                    to.len()
                )));
            }
            to.copy_from_slice(from);
            Ok(())
        })?
    })?
}

pub fn bytes_to_f32(bytes: &[u8]) -> BackendResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(BackendError::invariant(format!(
            "f32 buffer has {} bytes, not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

pub fn f32_to_bytes(values: &[f32], bytes: &mut [u8]) -> BackendResult<()> {
    if bytes.len() != values.len() * 4 {
        return Err(BackendError::invariant(format!(
            "cannot store {} f32 values in {} bytes",
            values.len(),
            bytes.len()
        )));
    }
    for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

/// Which side of a kernel boundary owns a tensor's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOwnership {
    /// Allocated by the runtime or a backend tensor builder.
    External,
    /// Exported from an embedded engine's private tensor.
    Embedded,
}

struct Binding {
    buffer: SharedBuffer,
    ownership: BufferOwnership,
}

/// Graph tensor shared between backends.
pub struct Tensor {
    index: OperandIndex,
    info: OperandInfo,
    layout: Layout,
    constant: bool,
    total_size: usize,
    binding: OnceLock<Binding>,
}

impl Tensor {
    pub fn new(
        index: OperandIndex,
        info: OperandInfo,
        layout: Layout,
        constant: bool,
    ) -> BackendResult<Self> {
        let total_size = info.byte_len().ok_or_else(|| {
            BackendError::resource_exhausted(format!(
                "tensor {index} with dims {:?} overflows the address space",
                info.shape.dims()
            ))
        })?;
        Ok(Self {
            index,
            info,
            layout,
            constant,
            total_size,
            binding: OnceLock::new(),
        })
    }

    pub fn index(&self) -> OperandIndex {
        self.index
    }

    pub fn info(&self) -> &OperandInfo {
        &self.info
    }

    pub fn dims(&self) -> &[usize] {
        self.info.shape.dims()
    }

    pub fn dtype(&self) -> DataType {
        self.info.dtype
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Storage size in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn buffer(&self) -> Option<&SharedBuffer> {
        self.binding.get().map(|binding| &binding.buffer)
    }

    pub fn ownership(&self) -> Option<BufferOwnership> {
        self.binding.get().map(|binding| binding.ownership)
    }

    /// Binds storage to the tensor. Storage can be bound only once.
    pub fn bind(&self, buffer: SharedBuffer, ownership: BufferOwnership) -> BackendResult<()> {
        let len = buffer.byte_len()?;
        if len != self.total_size {
            return Err(BackendError::invariant(format!(
                "tensor {} needs {} bytes, offered buffer has {len}",
                self.index, self.total_size
            )));
        }
        self.binding
            .set(Binding { buffer, ownership })
            .map_err(|_| {
                BackendError::invariant(format!("tensor {} already owns a buffer", self.index))
            })
    }

    /// Allocates zeroed runtime-owned storage.
    pub fn allocate(&self) -> BackendResult<()> {
        let buffer = allocate_buffer(self.total_size)?;
        self.bind(buffer, BufferOwnership::External)
    }

    pub fn read_f32(&self) -> BackendResult<Vec<f32>> {
        self.expect_f32()?;
        self.bound_buffer()?.read_f32()
    }

    pub fn write_f32(&self, values: &[f32]) -> BackendResult<()> {
        self.expect_f32()?;
        self.bound_buffer()?.write_f32(values)
    }

    pub fn write_bytes(&self, data: &[u8]) -> BackendResult<()> {
        let index = self.index;
        self.bound_buffer()?.with_bytes_mut(|bytes| {
            if bytes.len() != data.len() {
                return Err(BackendError::invariant(format!(
                    "tensor {index} holds {} bytes, got {}",
                    bytes.len(),
                    data.len()
                )));
            }
            bytes.copy_from_slice(data);
            Ok(())
        })?
    }

    pub fn bound_buffer(&self) -> BackendResult<&SharedBuffer> {
        self.buffer().ok_or_else(|| {
            BackendError::invariant(format!("tensor {} has no buffer bound", self.index))
        })
    }

    fn expect_f32(&self) -> BackendResult<()> {
        if self.info.dtype == DataType::Float32 {
            Ok(())
        } else {
            Err(BackendError::unsupported(
                format!("tensor {}", self.index),
                format!("f32 access on {} data", self.info.dtype.as_str()),
            ))
        }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("index", &self.index)
            .field("dims", &self.dims())
            .field("dtype", &self.info.dtype)
            .field("layout", &self.layout)
            .field("constant", &self.constant)
            .field("ownership", &self.ownership())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(dims: [usize; 2]) -> Tensor {
        Tensor::new(
            OperandIndex(0),
            OperandInfo::float32(dims),
            Layout::Nhwc,
            false,
        )
        .unwrap()
    }

    #[test]
    fn storage_binds_once() {
        let t = tensor([2, 3]);
        assert_eq!(t.total_size(), 24);
        assert!(t.buffer().is_none());
        t.allocate().unwrap();
        assert_eq!(t.ownership(), Some(BufferOwnership::External));
        let err = t
            .bind(allocate_buffer(24).unwrap(), BufferOwnership::Embedded)
            .unwrap_err();
        assert!(err.is_invariant());
        assert_eq!(t.ownership(), Some(BufferOwnership::External));
    }

    #[test]
    fn bind_rejects_wrong_length() {
        let t = tensor([2, 2]);
        let err = t
            .bind(allocate_buffer(8).unwrap(), BufferOwnership::Embedded)
            .unwrap_err();
        assert!(err.is_invariant());
        assert!(t.buffer().is_none());
    }

    #[test]
    fn f32_values_roundtrip_through_bytes() {
        let t = tensor([1, 3]);
        t.allocate().unwrap();
        t.write_f32(&[1.5, -2.0, 0.25]).unwrap();
        assert_eq!(t.read_f32().unwrap(), vec![1.5, -2.0, 0.25]);
    }

    #[test]
    fn copy_buffer_onto_itself_is_a_no_op() {
        let buffer = allocate_buffer(8).unwrap();
        buffer.write_f32(&[3.0, 4.0]).unwrap();
        copy_buffer(&buffer, &buffer).unwrap();
        assert_eq!(buffer.read_f32().unwrap(), vec![3.0, 4.0]);

        let other = allocate_buffer(8).unwrap();
        copy_buffer(&other, &buffer).unwrap();
        assert_eq!(other.read_f32().unwrap(), vec![3.0, 4.0]);
        assert!(copy_buffer(&allocate_buffer(4).unwrap(), &buffer).is_err());
    }
}
