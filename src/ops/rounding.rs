//! Rounding and clamping. All of these are flat almost everywhere, so
//! their backward rules push zero gradients (clip excepted, which gates
//! the upstream gradient to the unclipped region).

use crate::error::{Result, TensorError};
use crate::tape::Op;
use crate::tensor::Tensor;
use crate::validate::IntoOperand;

impl Tensor {
    pub fn trunc(&self) -> Tensor {
        let value = self.value().mapv(f32::trunc);
        self.unary_output(value, Op::Trunc { a: self.clone() })
    }

    pub fn floor(&self) -> Tensor {
        let value = self.value().mapv(f32::floor);
        self.unary_output(value, Op::Floor { a: self.clone() })
    }

    pub fn ceil(&self) -> Tensor {
        let value = self.value().mapv(f32::ceil);
        self.unary_output(value, Op::Ceil { a: self.clone() })
    }

    /// Clamp into `[min, max]`. The bounds are coerced onto the tape but
    /// never receive a gradient.
    pub fn clip(&self, min: f32, max: f32) -> Result<Tensor> {
        if min > max {
            return Err(TensorError::InvalidInput(format!(
                "clip lower bound {} exceeds upper bound {}",
                min, max
            )));
        }
        let input_min = min.into_operand()?;
        let input_max = max.into_operand()?;
        let value = self.value().mapv(|v| v.clamp(min, max));
        let op = Op::Clip {
            a: self.clone(),
            min: input_min,
            max: input_max,
        };
        Ok(self.unary_output(value, op))
    }
}
