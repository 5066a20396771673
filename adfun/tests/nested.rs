//! Recording through two levels of tagged values.

use adfun::{
    abort_recording, begin_recording, close_recording, independent, is_recording, record, AdError,
    AdFun, Independents, Scalar, Var,
};
use approx::assert_relative_eq;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// f(x) = x0² · x1 + exp(x0 · x1)
fn f<S: Scalar>(x: &[S]) -> S {
    x[0] * x[0] * x[1] + (x[0] * x[1]).exp()
}

fn exact_hessian(x: &[f64]) -> [[f64; 2]; 2] {
    let e = (x[0] * x[1]).exp();
    [
        [2.0 * x[1] + x[1] * x[1] * e, 2.0 * x[0] + e + x[0] * x[1] * e],
        [2.0 * x[0] + e + x[0] * x[1] * e, x[0] * x[0] * e],
    ]
}

#[test]
fn driver_hessian_matches_closed_form() {
    init();
    let fun = record(&[0.0_f64, 0.0], |x| vec![f(x)]).unwrap();
    let x = [0.7, -0.3];
    let h = fun.hessian(&x, &[1.0]).unwrap();
    let expected = exact_hessian(&x);
    for i in 0..2 {
        for j in 0..2 {
            assert_relative_eq!(h[i][j], expected[i][j], max_relative = 1e-12);
        }
    }
    // The driver leaves no recording behind.
    assert!(!is_recording::<f64>());
    assert!(!is_recording::<Var<f64>>());
}

#[test]
fn hand_built_hessian_matches_the_driver() {
    init();
    let x = [0.7, -0.3];

    // Level 1: the outer recording sees x as independents.
    let a1 = begin_recording(&x).unwrap();
    // Level 2: record f over values that are themselves level-1 tagged.
    let a2 = begin_recording(&a1).unwrap();
    let y2 = f(&a2);
    let mut inner: AdFun<Var<f64>> = close_recording(&[y2]).unwrap();

    // Gradient of the inner function, recorded on the outer tape.
    inner.forward(0, &a1).unwrap();
    let grad = inner.reverse(0, &[Var::constant(1.0)]).unwrap();
    let mut outer = close_recording(&grad).unwrap();
    assert_eq!((outer.domain(), outer.range()), (2, 2));

    let by_hand = outer.jacobian(&x).unwrap();
    let driver = record(&[0.0, 0.0], |v| vec![f(v)])
        .unwrap()
        .hessian(&x, &[1.0])
        .unwrap();
    for (a, b) in by_hand.iter().flatten().zip(driver.iter().flatten()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-12);
    }
}

#[test]
fn hessian_is_symmetric_for_several_outputs() {
    init();
    let fun = record(&[0.0_f64, 0.0, 0.0], |x| {
        vec![
            x[0].sin() * x[1].cosh() / (1.0 + x[2] * x[2]),
            x[0].atan() + x[1].tanh() * x[2].sqrt(),
            (x[0] * x[1] * x[2]).powf(Var::constant(1.5)),
        ]
    })
    .unwrap();
    let h = fun.hessian(&[0.4, 0.9, 1.3], &[1.0, -2.0, 0.5]).unwrap();
    for i in 0..3 {
        for j in 0..i {
            assert_relative_eq!(h[i][j], h[j][i], max_relative = 1e-10, epsilon = 1e-12);
        }
    }
}

#[test]
fn second_order_reverse_agrees_with_the_hessian() {
    init();
    let mut fun = record(&[0.0_f64, 0.0], |x| vec![f(x), x[0].ln() * x[1]]).unwrap();
    let x = [1.2, 0.4];
    let v = [0.3, -1.1];
    let w = [0.5, 2.0];
    let h = fun.hessian(&x, &w).unwrap();

    fun.forward(0, &x).unwrap();
    fun.forward(1, &v).unwrap();
    let r = fun.reverse(1, &w).unwrap();
    for j in 0..2 {
        let hv: f64 = (0..2).map(|k| h[j][k] * v[k]).sum();
        assert_relative_eq!(r[2 * j], hv, max_relative = 1e-10);
    }
}

#[test]
fn third_level_is_reachable_generically() {
    init();
    // d³/dx³ x⁴ = 24x, through three nested recordings.
    let x1 = begin_recording(&[2.0_f64]).unwrap();
    let x2 = begin_recording(&x1).unwrap();
    let x3 = begin_recording(&x2).unwrap();
    let mut g3 = close_recording(&[x3[0].powi(4)]).unwrap();
    g3.forward(0, &x2).unwrap();
    let d1 = g3.reverse(0, &[Var::constant(Var::constant(1.0))]).unwrap();
    let mut g2 = close_recording(&d1).unwrap();
    g2.forward(0, &x1).unwrap();
    let d2 = g2.reverse(0, &[Var::constant(1.0)]).unwrap();
    let mut g1 = close_recording(&d2).unwrap();
    assert_eq!(g1.jacobian(&[2.0]).unwrap(), vec![vec![48.0]]);
}

#[test]
fn dynamic_level_entry_point() {
    init();
    let Independents::Second(x) = independent(&[3.0], 2).unwrap() else {
        panic!("level 2 requested");
    };
    assert_eq!(x[0].value().value(), 3.0);
    let g = close_recording(&[x[0] * x[0]]).unwrap();
    assert_eq!(g.domain(), 1);

    assert_eq!(
        independent(&[3.0], 0).unwrap_err(),
        AdError::UnsupportedLevel { level: 0, max: 2 }
    );
}

#[test]
fn inner_levels_are_independent_state_machines() {
    init();
    let _x2 = begin_recording(&[Var::constant(1.0_f64)]).unwrap();
    // Level 1 is still free.
    let x1 = begin_recording(&[1.0_f64]).unwrap();
    let f1 = close_recording(&[x1[0].exp()]).unwrap();
    assert_eq!(f1.range(), 1);
    assert!(is_recording::<Var<f64>>());
    assert!(abort_recording::<Var<f64>>());
    assert!(!abort_recording::<Var<f64>>());
}
