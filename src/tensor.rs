//! The tensor type: a value with provenance.
//!
//! `Tensor` wraps shared, mutex-guarded state so that one node can appear
//! as an argument of many downstream tape entries; the graph is the set of
//! these shared references, rebuilt implicitly per computation and never
//! serialized. Provenance is immutable once assigned: the first
//! `register_operation` wins and later calls are ignored.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use ndarray::{arr0, ArrayD, Axis, IxDyn};

use crate::device::Device;
use crate::engine;
use crate::error::{Result, TensorError};
use crate::tape::{render_graph, Arg, Op, OperationContext};
use crate::validate::IntoOperand;

pub struct TensorData {
    /// The tensor's value; scalars are 0-dimensional arrays.
    pub value: ArrayD<f32>,
    /// Accumulated gradient: absent until the first backward pass reaches
    /// this node, summed on every later contribution.
    pub grad: Option<ArrayD<f32>>,
    /// Provenance: the operation that produced this tensor, if any.
    pub tape: Option<Op>,
    /// Gates gradient accumulation and backward recursion for this node.
    pub requires_grad: bool,
    /// Label used for graph printing, never for identity.
    pub name: String,
    /// Residency flag, inherited by every tensor derived from this one.
    pub device: Device,
}

/// A shared handle to one node of the computation graph.
#[derive(Clone)]
pub struct Tensor(Arc<Mutex<TensorData>>);

impl Tensor {
    pub fn new(value: ArrayD<f32>, requires_grad: bool) -> Self {
        Self::new_on(value, requires_grad, Device::Host)
    }

    pub fn new_on(value: ArrayD<f32>, requires_grad: bool, device: Device) -> Self {
        Tensor(Arc::new(Mutex::new(TensorData {
            value,
            grad: None,
            tape: None,
            requires_grad,
            name: String::new(),
            device,
        })))
    }

    /// 0-dimensional tensor named after its value.
    pub fn scalar(value: f32, requires_grad: bool) -> Self {
        let t = Tensor::new(arr0(value).into_dyn(), requires_grad);
        t.set_name(&value.to_string());
        t
    }

    pub fn from_vec(data: Vec<f32>, shape: &[usize], requires_grad: bool) -> Result<Self> {
        let value = ArrayD::from_shape_vec(IxDyn(shape), data)
            .map_err(|e| TensorError::InvalidInput(e.to_string()))?;
        Ok(Tensor::new(value, requires_grad))
    }

    pub fn ones(shape: &[usize], requires_grad: bool) -> Self {
        Tensor::new(engine::ones(shape), requires_grad)
    }

    pub fn zeros(shape: &[usize], requires_grad: bool) -> Self {
        Tensor::new(engine::zeros(shape), requires_grad)
    }

    pub fn lock(&self) -> MutexGuard<'_, TensorData> {
        self.0.lock().unwrap()
    }

    /// Clone of the current value.
    pub fn value(&self) -> ArrayD<f32> {
        self.lock().value.clone()
    }

    /// Replace the value in place. The gradient slot and provenance are
    /// left untouched; pair with [`Tensor::reset_gradients`] to reuse the
    /// node as a fresh leaf.
    pub fn set_value(&self, value: ArrayD<f32>) {
        self.lock().value = value;
    }

    pub fn shape(&self) -> Vec<usize> {
        self.lock().value.shape().to_vec()
    }

    pub fn num_elements(&self) -> usize {
        self.lock().value.len()
    }

    /// True for 0-dimensional and single-element values.
    pub fn is_scalar(&self) -> bool {
        let lock = self.lock();
        lock.value.ndim() == 0 || lock.value.len() == 1
    }

    /// The scalar value, or `NotScalar` for larger tensors.
    pub fn item(&self) -> Result<f32> {
        let lock = self.lock();
        if lock.value.len() != 1 {
            return Err(TensorError::NotScalar);
        }
        Ok(*lock.value.iter().next().expect("single element"))
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.lock().name = name.to_string();
    }

    /// Builder-style rename, for labelling operation outputs.
    pub fn with_name(self, name: &str) -> Self {
        self.set_name(name);
        self
    }

    pub fn requires_grad(&self) -> bool {
        self.lock().requires_grad
    }

    pub fn set_requires_grad(&self, requires_grad: bool) {
        self.lock().requires_grad = requires_grad;
    }

    pub fn device(&self) -> Device {
        self.lock().device
    }

    pub fn is_on_accelerator(&self) -> bool {
        self.device().is_accelerator()
    }

    /// Copy of the value as a fresh leaf resident on the accelerator.
    pub fn to_accelerator(&self) -> Tensor {
        let lock = self.lock();
        Tensor::new_on(lock.value.clone(), lock.requires_grad, Device::Accelerator)
    }

    /// Attach provenance. The first registration wins; a tensor's tape
    /// entry is immutable once assigned.
    pub fn register_operation(&self, op: Op) -> &Self {
        let mut lock = self.lock();
        if lock.tape.is_none() {
            lock.tape = Some(op);
        }
        self
    }

    pub fn tape(&self) -> Option<Op> {
        self.lock().tape.clone()
    }

    /// Accumulate an upstream gradient into this node and recurse through
    /// its provenance. A no-op when `requires_grad` is off, which is what
    /// prunes backward traversal below opted-out subgraphs.
    ///
    /// The incoming gradient is first reduced to this tensor's shape by
    /// summing over broadcast axes, so a node used in a broadcast position
    /// receives the correctly summed total.
    pub fn diff(&self, grad: &ArrayD<f32>) -> Result<()> {
        let (reduced, op) = {
            let mut lock = self.lock();
            if !lock.requires_grad {
                return Ok(());
            }
            let reduced = engine::reduce_to_shape(grad, lock.value.shape());
            match lock.grad.as_mut() {
                Some(acc) => *acc += &reduced,
                None => lock.grad = Some(reduced.clone()),
            }
            (reduced, lock.tape.clone())
        };
        // The lock is released before recursing; a node reachable through
        // several paths is re-entered once per path and accumulates each
        // contribution.
        if let Some(op) = op {
            op.backward(self, &reduced)?;
        }
        Ok(())
    }

    /// Backward pass seeded with ones. Only scalar-shaped tensors can be
    /// differentiated from.
    pub fn backward(&self) -> Result<()> {
        if !self.is_scalar() {
            return Err(TensorError::NotScalar);
        }
        let seed = ArrayD::ones(self.lock().value.dim());
        self.diff(&seed)
    }

    /// Backward pass with an explicit seed gradient.
    pub fn backward_with(&self, seed: &ArrayD<f32>) -> Result<()> {
        if !self.is_scalar() {
            return Err(TensorError::NotScalar);
        }
        self.diff(seed)
    }

    /// The accumulated gradient, wrapped as a fresh leaf on the same
    /// device. Fails with `NoGradient` before any backward pass has
    /// reached this node.
    pub fn grad(&self) -> Result<Tensor> {
        let lock = self.lock();
        match &lock.grad {
            Some(g) => Ok(Tensor::new_on(g.clone(), false, lock.device)),
            None => Err(TensorError::NoGradient(lock.name.clone())),
        }
    }

    /// Clear the gradient accumulator only.
    pub fn zero_grad(&self) {
        self.lock().grad = None;
    }

    /// Clear gradient and provenance, turning the node back into a fresh
    /// leaf without reallocating the value buffer.
    pub fn reset_gradients(&self) {
        let mut lock = self.lock();
        lock.grad = None;
        lock.tape = None;
    }

    /// A new tensor sharing this value but disconnected from the graph.
    pub fn detach(&self) -> Tensor {
        let lock = self.lock();
        Tensor::new_on(lock.value.clone(), false, lock.device)
    }

    /// Indexed read along the first axis, tracked on the tape.
    pub fn at(&self, index: usize) -> Result<Tensor> {
        let (view, requires_grad, device) = {
            let lock = self.lock();
            if lock.value.ndim() == 0 {
                return Err(TensorError::ShapeMismatch(
                    "cannot index a 0-dimensional tensor".into(),
                ));
            }
            let len = lock.value.shape()[0];
            if index >= len {
                return Err(TensorError::InvalidInput(format!(
                    "index {} out of bounds for axis of length {}",
                    index, len
                )));
            }
            (
                lock.value.index_axis(Axis(0), index).to_owned(),
                lock.requires_grad,
                lock.device,
            )
        };
        let output = Tensor::new_on(view, requires_grad, device);
        output.register_operation(Op::OffsetGet {
            a: self.clone(),
            index,
        });
        output.set_name(&format!("out_{}_offset", index));
        Ok(output)
    }

    /// Indexed write along the first axis. The mutation happens in place
    /// and is not recorded on the tape: gradients of expressions built
    /// before the write will not see it.
    pub fn set_at(&self, index: usize, value: impl IntoOperand) -> Result<()> {
        let rhs = value.into_operand()?.value();
        let mut lock = self.lock();
        if lock.tape.is_some() {
            log::warn!(
                "in-place write to `{}` is not tracked on the tape",
                lock.name
            );
        }
        if lock.value.ndim() == 0 {
            return Err(TensorError::ShapeMismatch(
                "cannot index a 0-dimensional tensor".into(),
            ));
        }
        let len = lock.value.shape()[0];
        if index >= len {
            return Err(TensorError::InvalidInput(format!(
                "index {} out of bounds for axis of length {}",
                index, len
            )));
        }
        let mut slot = lock.value.index_axis_mut(Axis(0), index);
        let broadcast = rhs.broadcast(slot.raw_dim()).ok_or_else(|| {
            TensorError::ShapeMismatch(format!(
                "cannot assign shape {:?} into slot of shape {:?}",
                rhs.shape(),
                slot.shape()
            ))
        })?;
        slot.assign(&broadcast);
        Ok(())
    }

    /// New shape, same elements; tracked on the tape.
    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor> {
        let value = self.value();
        let reshaped = value
            .to_shape(IxDyn(shape))
            .map_err(|e| {
                TensorError::ShapeMismatch(format!(
                    "cannot reshape tensor from {:?} to {:?}: {}",
                    value.shape(),
                    shape,
                    e
                ))
            })?
            .to_owned();
        let output = Tensor::new_on(reshaped, self.requires_grad(), self.device());
        output.register_operation(Op::Reshape {
            a: self.clone(),
            shape: shape.to_vec(),
        });
        output.set_name(&self.name());
        Ok(output)
    }

    /// Reversed-axes copy of the value as a new, untracked tensor.
    pub fn transpose(&self) -> Tensor {
        let lock = self.lock();
        Tensor::new_on(
            lock.value.clone().reversed_axes(),
            lock.requires_grad,
            lock.device,
        )
    }

    /// Run a caller-supplied forward function and record it on the tape.
    ///
    /// The forward closure receives the operation context (on which it may
    /// install a backward function and a name), this tensor's value and
    /// the extra arguments. Differentiating through the result without an
    /// installed backward function fails with `UngradableOperation`.
    pub fn operation<F>(&self, forward: F, args: Vec<Arg>) -> Result<Tensor>
    where
        F: FnOnce(&mut OperationContext, &ArrayD<f32>, &[Arg]) -> Result<ArrayD<f32>>,
    {
        let mut context = OperationContext::new("custom_operation");
        let value = forward(&mut context, &self.value(), &args)?;

        let mut recorded = Vec::with_capacity(args.len() + 1);
        recorded.push(Arg::Tensor(self.clone()));
        recorded.extend(args);
        let requires_grad = recorded
            .iter()
            .any(|arg| matches!(arg, Arg::Tensor(t) if t.requires_grad()));

        let output = Tensor::new_on(value, requires_grad, self.device());
        output.set_name(&format!("out_{}", context.name()));
        output.register_operation(Op::Custom {
            context,
            args: recorded,
        });
        Ok(output)
    }

    /// Render the provenance tree, or `NoComputableGradient` for a leaf.
    pub fn graph(&self) -> Result<String> {
        if self.lock().tape.is_none() {
            return Err(TensorError::NoComputableGradient);
        }
        let mut out = String::new();
        render_graph(self, &mut out, true);
        Ok(out)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lock = self.lock();
        write!(
            f,
            "Tensor(name={:?}, shape={:?}, requires_grad={})",
            lock.name,
            lock.value.shape(),
            lock.requires_grad
        )
    }
}

// Identity is the shared allocation, not the value.
impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Tensor {}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}
