use ndarray::arr1;
use numgrad::{Tensor, TensorError};

#[test]
fn test_graph_on_leaf_fails() {
    let a = Tensor::new(arr1(&[1.0]).into_dyn(), true);
    assert!(matches!(a.graph(), Err(TensorError::NoComputableGradient)));
}

#[test]
fn test_graph_lists_operations_and_argument_names() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), true).with_name("a");
    let b = Tensor::new(arr1(&[3.0, 4.0]).into_dyn(), true).with_name("b");
    let c = a.add(&b).unwrap().with_name("c");
    let d = c.multiply(2.0).unwrap().with_name("d");

    let rendered = d.graph().unwrap();
    let lines: Vec<&str> = rendered.lines().collect();

    // Header, separator, then one line per tape entry in pre-order.
    assert!(lines[0].starts_with("Operation"));
    assert!(lines[1].starts_with("===="));
    assert!(lines[2].starts_with("multiply"));
    assert!(lines[2].contains("[c, 2]"));
    assert!(lines[3].starts_with("add"));
    assert!(lines[3].contains("[a, b]"));
    assert_eq!(lines.len(), 4);
}

#[test]
fn test_graph_stops_at_leaves() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), true).with_name("x");
    let y = a.exp().with_name("y");
    let rendered = y.graph().unwrap();
    assert!(rendered.contains("exp"));
    assert!(rendered.contains("[x]"));
    // The leaf itself contributes no line.
    assert_eq!(rendered.lines().count(), 3);
}

#[test]
fn test_graph_shows_unnamed_tensors_as_placeholder() {
    let a = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), true);
    let y = a.exp();
    let rendered = y.graph().unwrap();
    assert!(rendered.contains("[_nd_]"));
}

#[test]
fn test_graph_renders_custom_operations() {
    let x = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), true).with_name("x");
    let y = x
        .operation(
            |ctx, value, _args| {
                ctx.set_name("double");
                Ok(value * 2.0)
            },
            vec![],
        )
        .unwrap();
    let rendered = y.graph().unwrap();
    assert!(rendered.contains("double"));
    assert!(rendered.contains("[x]"));
}
