//! Elementwise arithmetic and whole-tensor reductions.

use ndarray::{arr0, Axis};

use crate::engine;
use crate::error::{Result, TensorError};
use crate::tape::Op;
use crate::tensor::Tensor;
use crate::validate::IntoOperand;

impl Tensor {
    pub fn add(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        engine::broadcast_shape(va.shape(), vb.shape())?;
        let op = Op::Add { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, &va + &vb, op))
    }

    pub fn subtract(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        engine::broadcast_shape(va.shape(), vb.shape())?;
        let op = Op::Subtract { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, &va - &vb, op))
    }

    pub fn multiply(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        engine::broadcast_shape(va.shape(), vb.shape())?;
        let op = Op::Multiply { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, &va * &vb, op))
    }

    pub fn divide(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        engine::broadcast_shape(va.shape(), vb.shape())?;
        let op = Op::Divide { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, &va / &vb, op))
    }

    pub fn power(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        engine::broadcast_shape(va.shape(), vb.shape())?;
        let op = Op::Power { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, engine::pow(&va, &vb), op))
    }

    /// Elementwise remainder. The divisor is non-differentiable.
    pub fn rem(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        engine::broadcast_shape(va.shape(), vb.shape())?;
        let op = Op::Mod { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, &va % &vb, op))
    }

    pub fn negative(&self) -> Tensor {
        let value = self.value().mapv(|v| -v);
        self.unary_output(value, Op::Negative { a: self.clone() })
    }

    pub fn abs(&self) -> Tensor {
        let value = self.value().mapv(f32::abs);
        self.unary_output(value, Op::Abs { a: self.clone() })
    }

    /// Sum of all elements. With `keep_dim` the total is spread back over
    /// the input shape instead of collapsing to a scalar.
    pub fn sum(&self, keep_dim: bool) -> Tensor {
        let v = self.value();
        let total = v.sum();
        let value = if keep_dim {
            engine::ones(v.shape()) * total
        } else {
            arr0(total).into_dyn()
        };
        self.unary_output(value, Op::Sum { a: self.clone(), keep_dim })
    }

    /// Sum along one axis.
    pub fn sum_axis(&self, axis: usize, keep_dim: bool) -> Result<Tensor> {
        let v = self.value();
        if axis >= v.ndim() {
            return Err(TensorError::InvalidInput(format!(
                "axis {} out of bounds for {}-dimensional tensor",
                axis,
                v.ndim()
            )));
        }
        let mut value = v.sum_axis(Axis(axis));
        if keep_dim {
            value = value.insert_axis(Axis(axis));
        }
        Ok(self.unary_output(value, Op::SumAxis { a: self.clone(), axis, keep_dim }))
    }

    /// Mean over all elements.
    pub fn mean(&self) -> Tensor {
        let v = self.value();
        let value = arr0(v.sum() / v.len() as f32).into_dyn();
        self.unary_output(value, Op::Mean { a: self.clone() })
    }
}
