//! Solver passes, CPU reference
//!
//! Each pass is one full-grid sweep matching a compute shader under
//! `shaders/`: it reads one or two source fields and writes exactly one
//! destination field. A `Pass` value binds its sources, destination and
//! uniforms for a single invocation, so the borrow checker guarantees a pass
//! never reads the buffer it is writing.

use cgmath::{ElementWise, InnerSpace, Vector2};
use std::ops::Range;

use super::field::{GridSize, ScalarField, VelocityField};

/// Uniforms shared by every pass of one tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassContext {
    /// Untouched border in uv units. Zero for open edges, one cell when clamped.
    pub margin: Vector2<f32>,
}

pub enum Pass<'a> {
    /// Transport the velocity along itself
    Advection {
        velocity: &'a VelocityField,
        output: &'a mut VelocityField,
        dt: f32,
        bfecc: bool,
    },
    /// Additively splat the pointer force kernel
    ExternalForce {
        output: &'a mut VelocityField,
        force: Vector2<f32>,
        /// Kernel centre in NDC
        center: Vector2<f32>,
        /// Kernel half extent in NDC
        radius: Vector2<f32>,
    },
    /// One Jacobi sweep of implicit diffusion
    Viscous {
        velocity: &'a VelocityField,
        guess: &'a VelocityField,
        output: &'a mut VelocityField,
        viscosity: f32,
        dt: f32,
    },
    Divergence {
        velocity: &'a VelocityField,
        output: &'a mut ScalarField,
        dt: f32,
    },
    /// One Jacobi sweep of the pressure Poisson equation
    Poisson {
        pressure: &'a ScalarField,
        divergence: &'a ScalarField,
        output: &'a mut ScalarField,
    },
    /// Subtract the pressure gradient
    Pressure {
        velocity: &'a VelocityField,
        pressure: &'a ScalarField,
        output: &'a mut VelocityField,
        dt: f32,
    },
}

impl Pass<'_> {
    pub fn execute(self, ctx: &PassContext) {
        match self {
            Pass::Advection {
                velocity,
                output,
                dt,
                bfecc,
            } => {
                let ratio = output.size().aspect_ratio();
                let (xs, ys) = interior(output.size(), ctx.margin);
                for y in ys {
                    for x in xs.clone() {
                        let uv = output.cell_uv(x, y);
                        output.set(x, y, advect(velocity, uv, dt, ratio, bfecc));
                    }
                }
            }
            Pass::ExternalForce {
                output,
                force,
                center,
                radius,
            } => splat(output, force, center, radius),
            Pass::Viscous {
                velocity,
                guess,
                output,
                viscosity,
                dt,
            } => {
                let k = viscosity * dt;
                let (xs, ys) = interior(output.size(), ctx.margin);
                for y in ys {
                    for x in xs.clone() {
                        let (xi, yi) = (x as isize, y as isize);
                        let neighbours = guess.fetch(xi + 2, yi)
                            + guess.fetch(xi - 2, yi)
                            + guess.fetch(xi, yi + 2)
                            + guess.fetch(xi, yi - 2);
                        let value = (velocity.get(x, y) * 4.0 + neighbours * k) / (4.0 * (1.0 + k));
                        output.set(x, y, value);
                    }
                }
            }
            Pass::Divergence {
                velocity,
                output,
                dt,
            } => {
                let (xs, ys) = interior(output.size(), ctx.margin);
                for y in ys {
                    for x in xs.clone() {
                        let (xi, yi) = (x as isize, y as isize);
                        let x0 = velocity.fetch(xi - 1, yi).x;
                        let x1 = velocity.fetch(xi + 1, yi).x;
                        let y0 = velocity.fetch(xi, yi - 1).y;
                        let y1 = velocity.fetch(xi, yi + 1).y;
                        output.set(x, y, (x1 - x0 + y1 - y0) / 2.0 / dt);
                    }
                }
            }
            Pass::Poisson {
                pressure,
                divergence,
                output,
            } => {
                let (xs, ys) = interior(output.size(), ctx.margin);
                for y in ys {
                    for x in xs.clone() {
                        let (xi, yi) = (x as isize, y as isize);
                        let sum = pressure.fetch(xi + 2, yi)
                            + pressure.fetch(xi - 2, yi)
                            + pressure.fetch(xi, yi + 2)
                            + pressure.fetch(xi, yi - 2);
                        output.set(x, y, sum / 4.0 - divergence.get(x, y));
                    }
                }
            }
            Pass::Pressure {
                velocity,
                pressure,
                output,
                dt,
            } => {
                let (xs, ys) = interior(output.size(), ctx.margin);
                for y in ys {
                    for x in xs.clone() {
                        let (xi, yi) = (x as isize, y as isize);
                        let grad = Vector2::new(
                            pressure.fetch(xi + 1, yi) - pressure.fetch(xi - 1, yi),
                            pressure.fetch(xi, yi + 1) - pressure.fetch(xi, yi - 1),
                        ) * 0.5;
                        output.set(x, y, velocity.get(x, y) - grad * dt);
                    }
                }
            }
        }
    }
}

/// Cells whose centre lies inside `[margin, 1 - margin]` on both axes
pub fn interior(size: GridSize, margin: Vector2<f32>) -> (Range<usize>, Range<usize>) {
    let axis = |cells: usize, m: f32| {
        let n = cells as f32;
        let first = (m * n - 0.5).ceil().max(0.0) as usize;
        let last = ((1.0 - m) * n - 0.5).floor();
        if last < 0.0 {
            return 0..0;
        }
        let end = (last as usize + 1).min(cells);
        first.min(end)..end
    };
    (axis(size.width, margin.x), axis(size.height, margin.y))
}

fn advect(
    velocity: &VelocityField,
    uv: Vector2<f32>,
    dt: f32,
    ratio: Vector2<f32>,
    bfecc: bool,
) -> Vector2<f32> {
    let step = |v: Vector2<f32>| v.mul_element_wise(ratio) * dt;
    if !bfecc {
        let vel = velocity.sample(uv);
        return velocity.sample(uv - step(vel));
    }

    let vel_old = velocity.sample(uv);
    let spot_old = uv - step(vel_old);
    let vel_new1 = velocity.sample(spot_old);
    let spot_new2 = spot_old + step(vel_new1);
    let error = spot_new2 - uv;
    let spot_new3 = uv - error / 2.0;
    let vel_2 = velocity.sample(spot_new3);
    let spot_old2 = spot_new3 - step(vel_2);
    velocity.sample(spot_old2)
}

fn splat(output: &mut VelocityField, force: Vector2<f32>, center: Vector2<f32>, radius: Vector2<f32>) {
    if radius.x <= 0.0 || radius.y <= 0.0 || force == Vector2::new(0.0, 0.0) {
        return;
    }
    let size = output.size();
    // NDC span of the kernel quad mapped to texel index ranges
    let span = |c: f32, r: f32, cells: usize| {
        let n = cells as f32;
        let lo = (((c - r + 1.0) / 2.0) * n - 0.5).ceil().max(0.0) as usize;
        let hi = (((c + r + 1.0) / 2.0) * n - 0.5).floor();
        if hi < 0.0 {
            return 0..0;
        }
        let end = (hi as usize + 1).min(cells);
        lo.min(end)..end
    };
    let xs = span(center.x, radius.x, size.width);
    let ys = span(center.y, radius.y, size.height);

    for y in ys {
        for x in xs.clone() {
            let ndc = output.cell_uv(x, y) * 2.0 - Vector2::new(1.0, 1.0);
            let r = (ndc - center).div_element_wise(radius);
            let falloff = 1.0 - r.magnitude().min(1.0);
            let current = output.get(x, y);
            output.set(x, y, current + force * (falloff * falloff));
        }
    }
}
