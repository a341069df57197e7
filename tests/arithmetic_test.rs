use ndarray::arr2;
use numgrad::Tensor;

fn sample() -> Tensor {
    Tensor::new(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn(), false)
}

#[test]
fn test_scalar_add() {
    let result = sample().add(1.0).unwrap();
    assert_eq!(
        result.value(),
        arr2(&[[2.0, 3.0, 4.0], [5.0, 6.0, 7.0]]).into_dyn()
    );
}

#[test]
fn test_scalar_multiply() {
    let result = sample().multiply(2.0).unwrap();
    assert_eq!(
        result.value(),
        arr2(&[[2.0, 4.0, 6.0], [8.0, 10.0, 12.0]]).into_dyn()
    );
}

#[test]
fn test_scalar_divide() {
    let result = sample().divide(2.0).unwrap();
    assert_eq!(
        result.value(),
        arr2(&[[0.5, 1.0, 1.5], [2.0, 2.5, 3.0]]).into_dyn()
    );
}

#[test]
fn test_scalar_subtract() {
    let result = sample().subtract(2.0).unwrap();
    assert_eq!(
        result.value(),
        arr2(&[[-1.0, 0.0, 1.0], [2.0, 3.0, 4.0]]).into_dyn()
    );
}

#[test]
fn test_negation() {
    let a = sample();
    let result = -&a;
    assert_eq!(
        result.value(),
        arr2(&[[-1.0, -2.0, -3.0], [-4.0, -5.0, -6.0]]).into_dyn()
    );
}

#[test]
fn test_operator_sugar_matches_named_methods() {
    let a = sample();
    let b = sample();
    assert_eq!((&a + &b).value(), a.add(&b).unwrap().value());
    assert_eq!((&a - &b).value(), a.subtract(&b).unwrap().value());
    assert_eq!((&a * &b).value(), a.multiply(&b).unwrap().value());
    assert_eq!((&a / &b).value(), a.divide(&b).unwrap().value());
    assert_eq!((&a % 2.0).value(), a.rem(2.0).unwrap().value());
    assert_eq!((&a + 1.0).value(), a.add(1.0).unwrap().value());
}

#[test]
fn test_cube_gradient() {
    let x = Tensor::scalar(2.0, true);
    let y = x.multiply(&x).unwrap().multiply(&x).unwrap();
    y.backward().unwrap();
    assert_eq!(x.grad().unwrap().item().unwrap(), 12.0); // 3x² at x = 2
}

#[test]
fn test_indexing_rows_and_elements() {
    let a = sample();
    let row = a.at(0).unwrap();
    assert_eq!(row.value(), ndarray::arr1(&[1.0, 2.0, 3.0]).into_dyn());

    let element = a.at(0).unwrap().at(1).unwrap();
    assert_eq!(element.item().unwrap(), 2.0);
}
