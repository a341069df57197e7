use ndarray::{arr1, arr2};
use numgrad::{Arg, Device, IntoOperand, Op, Tensor, TensorError};

#[test]
fn test_tensor_creation() {
    let a = Tensor::new(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn(), false);
    assert_eq!(a.shape(), vec![2, 3]);
    assert_eq!(a.num_elements(), 6);
    assert!(!a.is_scalar());
    assert!(!a.requires_grad());
}

#[test]
fn test_from_vec_shape_mismatch_is_invalid_input() {
    let result = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[2, 2], false);
    assert!(matches!(result, Err(TensorError::InvalidInput(_))));
}

#[test]
fn test_tensor_name() {
    let a = Tensor::new(arr1(&[1.0]).into_dyn(), false);
    a.set_name("test");
    assert_eq!(a.name(), "test");
}

#[test]
fn test_scalar_named_after_value() {
    let s = Tensor::scalar(2.5, false);
    assert_eq!(s.name(), "2.5");
    assert!(s.is_scalar());
    assert_eq!(s.item().unwrap(), 2.5);
}

#[test]
fn test_output_name_falls_back_to_origin() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), false);
    a.set_name("a");
    let out = a.exp();
    assert_eq!(out.name(), "a");
    let renamed = a.exp().with_name("e");
    assert_eq!(renamed.name(), "e");
}

#[test]
fn test_coercion_preserves_tensor_identity() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), true);
    let coerced = (&a).into_operand().unwrap();
    assert_eq!(a, coerced); // pointer identity, not value equality
}

#[test]
fn test_coercion_of_nested_vec() {
    let t = vec![vec![1.0f32, 2.0], vec![3.0, 4.0]].into_operand().unwrap();
    assert_eq!(t.value(), arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());

    let ragged = vec![vec![1.0f32, 2.0], vec![3.0]].into_operand();
    assert!(matches!(ragged, Err(TensorError::InvalidInput(_))));
}

#[test]
fn test_backward_on_non_scalar_fails() {
    let a = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), true);
    assert!(matches!(a.backward(), Err(TensorError::NotScalar)));
}

#[test]
fn test_single_element_tensor_counts_as_scalar() {
    let a = Tensor::new(arr1(&[5.0]).into_dyn(), true);
    assert!(a.is_scalar());
    a.backward().unwrap();
    assert_eq!(a.grad().unwrap().value(), arr1(&[1.0]).into_dyn());
}

#[test]
fn test_grad_before_backward_fails() {
    let a = Tensor::new(arr1(&[1.0]).into_dyn(), true);
    a.set_name("leaf");
    match a.grad() {
        Err(TensorError::NoGradient(name)) => assert_eq!(name, "leaf"),
        other => panic!("expected NoGradient, got {:?}", other.map(|t| t.value())),
    }
}

#[test]
fn test_dot_requires_one_dimensional_operands() {
    let a = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), false);
    let b = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), false);
    assert!(matches!(a.dot(&b), Err(TensorError::ShapeMismatch(_))));
}

#[test]
fn test_matmul_shape_mismatch_detected_before_tape() {
    let a = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), true);
    let b = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn(), true);
    assert!(matches!(a.matmul(&b), Err(TensorError::ShapeMismatch(_))));
}

#[test]
fn test_broadcast_mismatch_is_shape_error() {
    let a = Tensor::new(arr1(&[1.0, 2.0, 3.0]).into_dyn(), false);
    let b = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), false);
    assert!(matches!(a.add(&b), Err(TensorError::ShapeMismatch(_))));
}

#[test]
fn test_register_operation_is_idempotent() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), true);
    let b = Tensor::new(arr1(&[3.0, 4.0]).into_dyn(), true);
    let c = a.add(&b).unwrap();

    // A second registration must not replace the recorded provenance.
    c.register_operation(Op::Negative { a: b.clone() });
    assert_eq!(c.tape().unwrap().name(), "add");

    c.sum(false).backward().unwrap();
    assert_eq!(a.grad().unwrap().value(), arr1(&[1.0, 1.0]).into_dyn());
}

#[test]
fn test_set_value_keeps_buffer_shape() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), true);
    a.set_value(arr1(&[5.0, 6.0]).into_dyn());
    assert_eq!(a.value(), arr1(&[5.0, 6.0]).into_dyn());
}

#[test]
fn test_set_at_is_untracked() {
    let a = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), true);
    let y = a.sum(false);
    a.set_at(0, vec![9.0f32, 9.0]).unwrap();
    assert_eq!(a.value(), arr2(&[[9.0, 9.0], [3.0, 4.0]]).into_dyn());
    // The already-built graph still differentiates; the write is invisible
    // to it.
    y.backward().unwrap();
    assert_eq!(
        a.grad().unwrap().value(),
        arr2(&[[1.0, 1.0], [1.0, 1.0]]).into_dyn()
    );
}

#[test]
fn test_indexing_out_of_bounds() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), false);
    assert!(matches!(a.at(5), Err(TensorError::InvalidInput(_))));
    assert!(matches!(
        Tensor::scalar(1.0, false).at(0),
        Err(TensorError::ShapeMismatch(_))
    ));
}

#[test]
fn test_transpose_forward() {
    let a = Tensor::new(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn(), false);
    let t = a.transpose();
    assert_eq!(t.shape(), vec![3, 2]);
    assert_eq!(t.value()[[0, 1]], 4.0);
}

#[test]
fn test_device_propagation() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), true).to_accelerator();
    assert!(a.is_on_accelerator());
    let b = Tensor::new(arr1(&[3.0, 4.0]).into_dyn(), false);
    assert_eq!(b.device(), Device::Host);

    // Accelerator residency wins for derived tensors.
    let c = b.add(&a).unwrap();
    assert!(c.is_on_accelerator());
    assert!(a.exp().is_on_accelerator());
    assert!(a.detach().is_on_accelerator());

    c.sum(false).backward().unwrap();
    assert!(a.grad().unwrap().is_on_accelerator());
}

#[test]
fn test_custom_op_args_display() {
    let arg = Arg::Float(0.5);
    assert_eq!(arg.to_string(), "0.5");
    let unnamed = Arg::Tensor(Tensor::new(arr1(&[1.0]).into_dyn(), false));
    assert_eq!(unnamed.to_string(), "_nd_");
}
