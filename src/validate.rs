//! Coercion of heterogeneous call-site inputs into tensors.
//!
//! Every operand entering an operation is normalized through
//! [`IntoOperand`] before it touches the graph: scalars and raw arrays
//! become fresh leaf tensors, existing tensors pass through with their
//! identity intact so gradient accumulation lands on the caller's object.

use ndarray::{arr0, Array1, Array2, ArrayD, IxDyn};

use crate::error::{Result, TensorError};
use crate::tensor::Tensor;

pub trait IntoOperand {
    fn into_operand(self) -> Result<Tensor>;
}

impl IntoOperand for Tensor {
    fn into_operand(self) -> Result<Tensor> {
        Ok(self)
    }
}

impl IntoOperand for &Tensor {
    // Same Arc, same identity: gradients accumulate on the caller's tensor.
    fn into_operand(self) -> Result<Tensor> {
        Ok(self.clone())
    }
}

impl IntoOperand for f32 {
    fn into_operand(self) -> Result<Tensor> {
        let t = Tensor::new(arr0(self).into_dyn(), false);
        t.set_name(&self.to_string());
        Ok(t)
    }
}

impl IntoOperand for f64 {
    fn into_operand(self) -> Result<Tensor> {
        (self as f32).into_operand()
    }
}

impl IntoOperand for i32 {
    fn into_operand(self) -> Result<Tensor> {
        (self as f32).into_operand()
    }
}

impl IntoOperand for ArrayD<f32> {
    fn into_operand(self) -> Result<Tensor> {
        Ok(Tensor::new(self, false))
    }
}

impl IntoOperand for &ArrayD<f32> {
    fn into_operand(self) -> Result<Tensor> {
        Ok(Tensor::new(self.clone(), false))
    }
}

impl IntoOperand for Array1<f32> {
    fn into_operand(self) -> Result<Tensor> {
        Ok(Tensor::new(self.into_dyn(), false))
    }
}

impl IntoOperand for Array2<f32> {
    fn into_operand(self) -> Result<Tensor> {
        Ok(Tensor::new(self.into_dyn(), false))
    }
}

impl IntoOperand for Vec<f32> {
    fn into_operand(self) -> Result<Tensor> {
        Ok(Tensor::new(Array1::from_vec(self).into_dyn(), false))
    }
}

impl IntoOperand for &[f32] {
    fn into_operand(self) -> Result<Tensor> {
        self.to_vec().into_operand()
    }
}

impl IntoOperand for Vec<Vec<f32>> {
    fn into_operand(self) -> Result<Tensor> {
        let rows = self.len();
        let cols = self.first().map_or(0, Vec::len);
        if self.iter().any(|row| row.len() != cols) {
            return Err(TensorError::InvalidInput(
                "nested rows must all have the same length".into(),
            ));
        }
        let flat: Vec<f32> = self.into_iter().flatten().collect();
        let arr = ArrayD::from_shape_vec(IxDyn(&[rows, cols]), flat)
            .map_err(|e| TensorError::InvalidInput(e.to_string()))?;
        Ok(Tensor::new(arr, false))
    }
}
