//! Example: Newton's method on the Rosenbrock function.
//!
//! The function is recorded once; every iteration replays the tape for the
//! gradient (one reverse sweep) and the Hessian (a nested recording of that
//! sweep), then takes a Newton step.
//!
//! Run with: `cargo run --example newton_rosenbrock`

use adfun::{record, Var};

/// f(x, y) = (1 - x)² + 100 (y - x²)²
fn rosenbrock(v: &[Var<f64>]) -> Vec<Var<f64>> {
    let (x, y) = (v[0], v[1]);
    let a = 1.0 - x;
    let b = y - x * x;
    vec![a * a + 100.0 * b * b]
}

fn main() -> adfun::Result<()> {
    env_logger::init();
    println!("=== Newton's method on Rosenbrock ===\n");

    let mut f = record(&[0.0, 0.0], rosenbrock)?;
    let mut x = [-1.2_f64, 1.0];

    for step in 0..8 {
        let value = f.forward(0, &x)?[0];
        let g = f.reverse(0, &[1.0])?;
        let h = f.hessian(&x, &[1.0])?;
        println!(
            "step {step}: x = [{:.6}, {:.6}]  f = {:.3e}  |∇f| = {:.3e}",
            x[0],
            x[1],
            value,
            g[0].hypot(g[1])
        );

        // Solve H d = -g for the 2×2 system.
        let det = h[0][0] * h[1][1] - h[0][1] * h[1][0];
        let d0 = (-g[0] * h[1][1] + g[1] * h[0][1]) / det;
        let d1 = (-g[1] * h[0][0] + g[0] * h[1][0]) / det;
        x = [x[0] + d0, x[1] + d1];
    }

    println!("\nminimum near [{:.6}, {:.6}] (exact: [1, 1])", x[0], x[1]);

    // Second-order Taylor coefficient along a direction: ½ vᵀ H v.
    let v = [1.0, -1.0];
    f.forward(0, &x)?;
    f.forward(1, &v)?;
    let y2 = f.forward(2, &[0.0, 0.0])?[0];
    println!("½ vᵀ H v along {:?} = {:.6}", v, y2);
    Ok(())
}
