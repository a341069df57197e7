//! Linear-algebra operations: products and decomposition results.

use ndarray::{arr0, Array1, Array2, Ix1, Ix2};

use crate::engine;
use crate::error::{Result, TensorError};
use crate::tape::Op;
use crate::tensor::Tensor;
use crate::validate::IntoOperand;

impl Tensor {
    /// 2-D matrix product.
    pub fn matmul(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        let a2 = va.view().into_dimensionality::<Ix2>().map_err(|_| {
            TensorError::ShapeMismatch(format!(
                "matmul expects 2-D operands, got shape {:?}",
                va.shape()
            ))
        })?;
        let b2 = vb.view().into_dimensionality::<Ix2>().map_err(|_| {
            TensorError::ShapeMismatch(format!(
                "matmul expects 2-D operands, got shape {:?}",
                vb.shape()
            ))
        })?;
        if a2.ncols() != b2.nrows() {
            return Err(TensorError::ShapeMismatch(format!(
                "matmul inner dimensions disagree: {:?} x {:?}",
                va.shape(),
                vb.shape()
            )));
        }
        let op = Op::Matmul { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, a2.dot(&b2).into_dyn(), op))
    }

    /// Dot product of two 1-D tensors.
    pub fn dot(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        let (a1, b1) = match (
            va.view().into_dimensionality::<Ix1>(),
            vb.view().into_dimensionality::<Ix1>(),
        ) {
            (Ok(a1), Ok(b1)) => (a1, b1),
            _ => {
                return Err(TensorError::ShapeMismatch(
                    "dot can only compute the dot product of two 1-D tensors".into(),
                ))
            }
        };
        if a1.len() != b1.len() {
            return Err(TensorError::ShapeMismatch(format!(
                "dot operands have different lengths: {} and {}",
                a1.len(),
                b1.len()
            )));
        }
        let op = Op::Dot { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, arr0(a1.dot(&b1)).into_dyn(), op))
    }

    /// Outer product of the flattened operands.
    pub fn outer(&self, value: impl IntoOperand) -> Result<Tensor> {
        let input = value.into_operand()?;
        let (va, vb) = (self.value(), input.value());
        let fa: Vec<f32> = va.iter().copied().collect();
        let fb: Vec<f32> = vb.iter().copied().collect();
        let product = Array2::from_shape_fn((fa.len(), fb.len()), |(i, j)| fa[i] * fb[j]);
        let op = Op::Outer { a: self.clone(), b: input.clone() };
        Ok(self.binary_output(&input, product.into_dyn(), op))
    }

    /// Determinant of a square 2-D tensor.
    pub fn det(&self) -> Result<Tensor> {
        let d = engine::det(&self.value())?;
        Ok(self.unary_output(arr0(d).into_dyn(), Op::Det { a: self.clone() }))
    }

    /// Frobenius norm.
    pub fn norm(&self) -> Tensor {
        let n = engine::norm(&self.value());
        self.unary_output(arr0(n).into_dyn(), Op::Norm { a: self.clone() })
    }

    /// Numerical rank. Non-differentiable: backward pushes zeros.
    pub fn matrix_rank(&self) -> Result<Tensor> {
        let r = engine::matrix_rank(&self.value())?;
        Ok(self.unary_output(arr0(r as f32).into_dyn(), Op::MatrixRank { a: self.clone() }))
    }

    /// 2-norm condition number. Non-differentiable: backward pushes zeros.
    pub fn cond(&self) -> Result<Tensor> {
        let c = engine::cond(&self.value())?;
        Ok(self.unary_output(arr0(c).into_dyn(), Op::Cond { a: self.clone() }))
    }

    /// Singular values, in decreasing order. Forward-only: differentiating
    /// through the result fails with `UngradableOperation`.
    pub fn svd(&self) -> Result<Tensor> {
        let s = engine::singular_values(&self.value())?;
        Ok(self.unary_output(
            Array1::from_vec(s).into_dyn(),
            Op::Svd { a: self.clone() },
        ))
    }
}
