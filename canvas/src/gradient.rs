//! Linear, radial and conical gradients.
//!
//! A gradient is evaluated through a ramp of [`GRADIENT_STOPTABLE_SIZE`] premultiplied colors
//! precomputed from its stops. Evaluation maps a device position through the inverse of the
//! gradient transform into gradient space, computes the ramp parameter `t` and looks it up. For
//! affine transforms the parameter changes linearly along a scanline, which is exploited with an
//! incremental evaluation, in fixed point where the range allows.
use crate::math;
use crate::pixel::{self, Argb};
use crate::transform::Transform;

/// The number of entries of a color ramp.
pub const GRADIENT_STOPTABLE_SIZE: usize = 1024;

/// Fractional bits of the fixed point ramp parameter.
pub const FIXPT_BITS: u32 = 8;

const FIXPT_SIZE: i32 = 1 << FIXPT_BITS;

const LAST_STOP: i32 = GRADIENT_STOPTABLE_SIZE as i32 - 1;

const FUZZY_EPSILON: f64 = 1e-12;

/// A color at a position in `0.0..=1.0` along the gradient, the color being straight ARGB.
pub type GradientStop = (f64, Argb);

/// How the ramp continues outside of `0.0..=1.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Spread {
    /// Extend the end colors.
    #[default]
    Pad,
    /// Restart the ramp.
    Repeat,
    /// Run the ramp backwards every other time.
    Reflect,
}

/// Tunables of gradient evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientSettings {
    pub spread: Spread,
    /// A focal radius within this distance of zero counts as a focal point.
    pub focal_tolerance: f64,
}

impl Default for GradientSettings {
    fn default() -> Self {
        GradientSettings {
            spread: Spread::Pad,
            focal_tolerance: FUZZY_EPSILON,
        }
    }
}

/// The geometry of a gradient, in gradient space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GradientShape {
    /// Colors change along the axis from `start` to `end`.
    Linear { start: (f64, f64), end: (f64, f64) },
    /// Colors change between the focal circle and the outer circle.
    Radial {
        center: (f64, f64),
        radius: f64,
        focal: (f64, f64),
        focal_radius: f64,
    },
    /// Colors change with the angle around `center`, starting at `angle` radians.
    Conical { center: (f64, f64), angle: f64 },
}

/// Values derived from the shape once, used for every span.
#[derive(Clone, Copy, Debug)]
enum Geometry {
    Linear {
        dx: f64,
        dy: f64,
        l: f64,
        off: f64,
    },
    Radial {
        fx: f64,
        fy: f64,
        fr: f64,
        dx: f64,
        dy: f64,
        dr: f64,
        sqrfr: f64,
        a: f64,
        inv2a: f64,
        extended: bool,
    },
    Conical {
        cx: f64,
        cy: f64,
        angle: f64,
    },
}

/// A gradient ready for evaluation.
///
/// ```
/// use raster_canvas::gradient::Gradient;
///
/// let ramp = Gradient::linear((0.0, 0.0), (100.0, 0.0), &[(0.0, 0xff00_0000), (1.0, 0xffff_ffff)]);
/// assert_eq!(ramp.color_at(-10.0, 0.0), 0xff00_0000);
/// assert_eq!(ramp.color_at(200.0, 0.0), 0xffff_ffff);
/// ```
#[derive(Clone, Debug)]
pub struct Gradient {
    shape: GradientShape,
    geometry: Geometry,
    settings: GradientSettings,
    /// Maps device space to gradient space, `None` for a singular gradient transform.
    inverse: Option<Transform>,
    table: Vec<u32>,
    alpha_color: bool,
}

impl Gradient {
    /// A gradient over `stops`, in any order. Stop positions are clamped to `0.0..=1.0`.
    pub fn new(shape: GradientShape, stops: &[GradientStop]) -> Self {
        let settings = GradientSettings::default();
        let (table, alpha_color) = color_table(stops);
        Gradient {
            shape,
            geometry: Geometry::new(&shape, &settings),
            settings,
            inverse: Some(Transform::IDENTITY),
            table,
            alpha_color,
        }
    }

    pub fn linear(start: (f64, f64), end: (f64, f64), stops: &[GradientStop]) -> Self {
        Self::new(GradientShape::Linear { start, end }, stops)
    }

    pub fn radial(
        center: (f64, f64),
        radius: f64,
        focal: (f64, f64),
        focal_radius: f64,
        stops: &[GradientStop],
    ) -> Self {
        Self::new(
            GradientShape::Radial {
                center,
                radius,
                focal,
                focal_radius,
            },
            stops,
        )
    }

    pub fn conical(center: (f64, f64), angle: f64, stops: &[GradientStop]) -> Self {
        Self::new(GradientShape::Conical { center, angle }, stops)
    }

    pub fn with_settings(mut self, settings: GradientSettings) -> Self {
        self.settings = settings;
        self.geometry = Geometry::new(&self.shape, &settings);
        self
    }

    /// Place the gradient with a transform from gradient space to device space.
    ///
    /// A singular transform makes the gradient transparent.
    pub fn with_transform(mut self, transform: &Transform) -> Self {
        self.inverse = transform.invert();
        if self.inverse.is_none() {
            tracing::debug!(?transform, "singular gradient transform");
        }
        self
    }

    pub fn shape(&self) -> &GradientShape {
        &self.shape
    }

    pub fn settings(&self) -> &GradientSettings {
        &self.settings
    }

    /// Whether every stop is opaque.
    pub fn is_opaque(&self) -> bool {
        !self.alpha_color
    }

    /// The premultiplied color ramp.
    pub fn color_table(&self) -> &[u32] {
        &self.table
    }

    /// The premultiplied color at a position in device space.
    pub fn color_at(&self, x: f64, y: f64) -> u32 {
        let mut out = [0];
        self.fetch_at(x, y, &mut out);
        out[0]
    }

    /// Evaluate at the centers of the pixels `x..x + out.len()` of row `y`.
    pub fn fetch(&self, x: i32, y: i32, out: &mut [u32]) {
        self.fetch_at(f64::from(x) + 0.5, f64::from(y) + 0.5, out)
    }

    fn fetch_at(&self, cx: f64, cy: f64, out: &mut [u32]) {
        let Some(m) = &self.inverse else {
            out.fill(0);
            return;
        };

        match self.geometry {
            Geometry::Linear { dx, dy, l, off } => self.fetch_linear(m, (dx, dy, l, off), cx, cy, out),
            Geometry::Radial { .. } => self.fetch_radial(m, cx, cy, out),
            Geometry::Conical { cx: gx, cy: gy, angle } => {
                self.fetch_conical(m, (gx, gy), angle, cx, cy, out)
            }
        }
    }

    /// The ramp index of the clamped, wrapped or mirrored position.
    fn clamp(&self, ipos: i32) -> usize {
        const SIZE: i32 = GRADIENT_STOPTABLE_SIZE as i32;
        let index = match self.settings.spread {
            Spread::Pad => ipos.clamp(0, LAST_STOP),
            Spread::Repeat => ipos.rem_euclid(SIZE),
            Spread::Reflect => {
                let limit = ipos.rem_euclid(2 * SIZE);
                if limit >= SIZE {
                    2 * SIZE - 1 - limit
                } else {
                    limit
                }
            }
        };
        index as usize
    }

    /// Look up a position where `1.0` is the end of the ramp.
    fn pixel(&self, t: f64) -> u32 {
        let ipos = (t * f64::from(LAST_STOP) + 0.5) as i32;
        self.table[self.clamp(ipos)]
    }

    /// Look up a ramp index with [`FIXPT_BITS`] fractional bits.
    fn pixel_fixed(&self, fixed: i32) -> u32 {
        let ipos = fixed.saturating_add(FIXPT_SIZE / 2) >> FIXPT_BITS;
        self.table[self.clamp(ipos)]
    }

    fn fetch_linear(
        &self,
        m: &Transform,
        (dx, dy, l, off): (f64, f64, f64, f64),
        cx: f64,
        cy: f64,
        out: &mut [u32],
    ) {
        if l == 0.0 {
            out.fill(self.pixel_fixed(0));
            return;
        }

        let mut rx = m.m21 * cy + m.m11 * cx + m.dx;
        let mut ry = m.m22 * cy + m.m12 * cx + m.dy;
        let mut t = dx * rx + dy * ry + off;
        let mut inc = dx * m.m11 + dy * m.m12;

        if !m.is_affine() {
            let mut rw = m.m23 * cy + m.m13 * cx + m.m33;
            for out in out.iter_mut() {
                let (x, y) = (rx / rw, ry / rw);
                *out = self.pixel(dx * x + dy * y + off);
                rx += m.m11;
                ry += m.m12;
                rw += m.m13;
                if rw == 0.0 {
                    rw += m.m13;
                }
            }
            return;
        }

        t *= f64::from(LAST_STOP);
        inc *= f64::from(LAST_STOP);
        let fixed = f64::from(FIXPT_SIZE);

        if inc > -1e-5 && inc < 1e-5 {
            out.fill(self.pixel_fixed((t * fixed) as i32));
            return;
        }

        let limit = f64::from(i32::MAX >> (FIXPT_BITS + 1));
        let end = t + inc * out.len() as f64;
        if end < limit && end > -limit && t < limit && t > -limit {
            let mut t_fixed = (t * fixed) as i32;
            let inc_fixed = (inc * fixed) as i32;
            for out in out.iter_mut() {
                *out = self.pixel_fixed(t_fixed);
                t_fixed = t_fixed.wrapping_add(inc_fixed);
            }
        } else {
            for out in out.iter_mut() {
                *out = self.pixel(t / GRADIENT_STOPTABLE_SIZE as f64);
                t += inc;
            }
        }
    }

    fn fetch_radial(&self, m: &Transform, cx: f64, cy: f64, out: &mut [u32]) {
        let Geometry::Radial {
            fx,
            fy,
            fr,
            dx,
            dy,
            dr,
            sqrfr,
            a,
            inv2a,
            extended,
        } = self.geometry
        else {
            return;
        };

        // The focal circle touches the outer one, no solution is defined.
        if math::fuzzy_is_null(a, FUZZY_EPSILON) {
            out.fill(0);
            return;
        }

        let mut rx = m.m21 * cy + m.dx + m.m11 * cx;
        let mut ry = m.m22 * cy + m.dy + m.m12 * cx;

        if m.is_affine() {
            rx -= fx;
            ry -= fy;

            let mut inv_a = 1.0 / (2.0 * a);
            let (delta_rx, delta_ry) = (m.m11, m.m12);

            let mut b = 2.0 * (dr * fr + rx * dx + ry * dy);
            let mut delta_b = 2.0 * (delta_rx * dx + delta_ry * dy);
            let b_delta_b = 2.0 * b * delta_b;
            let delta_b_delta_b = 2.0 * delta_b * delta_b;

            let bb = b * b;
            let delta_bb = delta_b * delta_b;

            b *= inv_a;
            delta_b *= inv_a;

            let rxrxryry = rx * rx + ry * ry;
            let delta_rxrxryry = delta_rx * delta_rx + delta_ry * delta_ry;
            let rx_plus_ry = 2.0 * (rx * delta_rx + ry * delta_ry);
            let delta_rx_plus_ry = 2.0 * delta_rxrxryry;

            inv_a *= inv_a;

            let mut det = (bb - 4.0 * a * (sqrfr - rxrxryry)) * inv_a;
            let mut delta_det = (b_delta_b + delta_bb + 4.0 * a * (rx_plus_ry + delta_rxrxryry)) * inv_a;
            let delta_delta_det = (delta_b_delta_b + 4.0 * a * delta_rx_plus_ry) * inv_a;

            for out in out.iter_mut() {
                *out = if !extended {
                    self.pixel(math::sqrt(det) - b)
                } else if det >= 0.0 {
                    let w = math::sqrt(det) - b;
                    if fr + dr * w >= 0.0 {
                        self.pixel(w)
                    } else {
                        0
                    }
                } else {
                    0
                };

                det += delta_det;
                delta_det += delta_delta_det;
                b += delta_b;
            }
        } else {
            let mut rw = m.m23 * cy + m.m33 + m.m13 * cx;
            for out in out.iter_mut() {
                *out = if rw == 0.0 {
                    0
                } else {
                    let gx = rx / rw - fx;
                    let gy = ry / rw - fy;
                    let b = 2.0 * (dr * fr + gx * dx + gy * dy);
                    let det = b * b - 4.0 * a * (sqrfr - (gx * gx + gy * gy));

                    if det >= 0.0 {
                        let root = math::sqrt(det);
                        let s0 = (-b - root) * inv2a;
                        let s1 = (-b + root) * inv2a;
                        let s = s0.max(s1);
                        if fr + dr * s >= 0.0 {
                            self.pixel(s)
                        } else {
                            0
                        }
                    } else {
                        0
                    }
                };

                rx += m.m11;
                ry += m.m12;
                rw += m.m13;
            }
        }
    }

    fn fetch_conical(
        &self,
        m: &Transform,
        (gx, gy): (f64, f64),
        start: f64,
        cx: f64,
        cy: f64,
        out: &mut [u32],
    ) {
        use core::f64::consts::TAU;

        let mut rx = m.m21 * cy + m.dx + m.m11 * cx;
        let mut ry = m.m22 * cy + m.dy + m.m12 * cx;

        if m.is_affine() {
            rx -= gx;
            ry -= gy;
            for out in out.iter_mut() {
                let angle = math::atan2(ry, rx) + start;
                *out = self.pixel(1.0 - angle / TAU);
                rx += m.m11;
                ry += m.m12;
            }
        } else {
            let mut rw = m.m23 * cy + m.m33 + m.m13 * cx;
            if rw == 0.0 {
                rw = 1.0;
            }
            for out in out.iter_mut() {
                let angle = math::atan2(ry / rw - gy, rx / rw - gx) + start;
                *out = self.pixel(1.0 - angle / TAU);
                rx += m.m11;
                ry += m.m12;
                rw += m.m13;
                if rw == 0.0 {
                    rw += m.m13;
                }
            }
        }
    }
}

impl Geometry {
    fn new(shape: &GradientShape, settings: &GradientSettings) -> Self {
        match *shape {
            GradientShape::Linear { start, end } => {
                let (mut dx, mut dy) = (end.0 - start.0, end.1 - start.1);
                let l = dx * dx + dy * dy;
                let mut off = 0.0;
                if l != 0.0 {
                    dx /= l;
                    dy /= l;
                    off = -dx * start.0 - dy * start.1;
                }
                Geometry::Linear { dx, dy, l, off }
            }
            GradientShape::Radial {
                center,
                radius,
                focal,
                focal_radius,
            } => {
                let dx = center.0 - focal.0;
                let dy = center.1 - focal.1;
                let dr = radius - focal_radius;
                let a = dr * dr - dx * dx - dy * dy;
                Geometry::Radial {
                    fx: focal.0,
                    fy: focal.1,
                    fr: focal_radius,
                    dx,
                    dy,
                    dr,
                    sqrfr: focal_radius * focal_radius,
                    a,
                    inv2a: 1.0 / (2.0 * a),
                    extended: !math::fuzzy_is_null(focal_radius, settings.focal_tolerance)
                        || a <= 0.0,
                }
            }
            GradientShape::Conical { center, angle } => Geometry::Conical {
                cx: center.0,
                cy: center.1,
                angle,
            },
        }
    }
}

/// Interpolate the ramp in straight ARGB, then premultiply.
///
/// Returns the table and whether any stop is translucent.
fn color_table(stops: &[GradientStop]) -> (Vec<u32>, bool) {
    let mut stops: Vec<GradientStop> = stops
        .iter()
        .filter(|(position, _)| !position.is_nan())
        .map(|&(position, color)| (position.clamp(0.0, 1.0), color))
        .collect();
    stops.sort_by(|a, b| a.0.total_cmp(&b.0));

    let alpha_color = stops.iter().any(|&(_, color)| pixel::alpha(color) != 0xff);
    let table = (0..GRADIENT_STOPTABLE_SIZE)
        .map(|i| {
            let t = i as f64 / f64::from(LAST_STOP);
            pixel::premultiply(ramp(&stops, t))
        })
        .collect();

    (table, alpha_color)
}

fn ramp(stops: &[GradientStop], t: f64) -> Argb {
    let (Some(&(first_pos, first)), Some(&(last_pos, last))) = (stops.first(), stops.last()) else {
        return 0;
    };

    if t <= first_pos {
        return first;
    }

    if t >= last_pos {
        return last;
    }

    // Strictly between the first and last stop, so `next` is in `1..len`.
    let next = stops.partition_point(|&(position, _)| position <= t);
    let (p0, c0) = stops[next - 1];
    let (p1, c1) = stops[next];
    let weight = ((t - p0) / (p1 - p0) * 256.0) as u32;
    pixel::interpolate_256(c0, 256 - weight, c1, weight)
}
