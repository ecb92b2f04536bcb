// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timing curves (easing functions).
//!
//! Every curve maps normalized progress `p` in `[0, 1]` to an eased value.
//! Overshooting families (back, elastic, bounce) may leave `[0, 1]`. Inputs
//! outside `[0, 1]` are not validated.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Easing curve applied to an animation's normalized progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimingCurve {
    /// Platform default curve, cubic bezier (0.25, 0.1, 0.25, 1.0)
    #[default]
    Default,
    /// y = x
    Linear,
    /// Named ease-in, cubic bezier (0.42, 0, 1, 1)
    EaseIn,
    /// Named ease-out, cubic bezier (0, 0, 0.58, 1)
    EaseOut,
    /// Named ease-in-out, cubic bezier (0.42, 0, 0.58, 1)
    EaseInOut,
    /// Quarter sine wave, in
    SineIn,
    /// Quarter sine wave, out
    SineOut,
    /// Half sine wave
    SineInOut,
    /// p^2
    QuadIn,
    /// -p(p - 2)
    QuadOut,
    /// Piecewise quadratic
    QuadInOut,
    /// p^3
    CubicIn,
    /// (p - 1)^3 + 1
    CubicOut,
    /// Piecewise cubic
    CubicInOut,
    /// p^4
    QuartIn,
    /// 1 - (p - 1)^4
    QuartOut,
    /// Piecewise quartic
    QuartInOut,
    /// p^5
    QuintIn,
    /// (p - 1)^5 + 1
    QuintOut,
    /// Piecewise quintic
    QuintInOut,
    /// 2^(10(p - 1))
    ExpoIn,
    /// 1 - 2^(-10p)
    ExpoOut,
    /// Piecewise exponential
    ExpoInOut,
    /// Shifted quadrant IV of the unit circle
    CircIn,
    /// Shifted quadrant II of the unit circle
    CircOut,
    /// Piecewise circular
    CircInOut,
    /// Overshooting cubic p^3 - p sin(p pi)
    BackIn,
    /// Overshooting cubic, out
    BackOut,
    /// Piecewise overshooting cubic
    BackInOut,
    /// Damped sine wave, in
    ElasticIn,
    /// Damped sine wave, out
    ElasticOut,
    /// Piecewise damped sine wave
    ElasticInOut,
    /// Decaying bounce, in
    BounceIn,
    /// Decaying bounce, out
    BounceOut,
    /// Piecewise decaying bounce
    BounceInOut,
    /// Fast start and end around a long, near-linear middle section
    SlowMotion,
}

impl TimingCurve {
    /// Every curve, in declaration order
    pub const ALL: [TimingCurve; 36] = [
        Self::Default,
        Self::Linear,
        Self::EaseIn,
        Self::EaseOut,
        Self::EaseInOut,
        Self::SineIn,
        Self::SineOut,
        Self::SineInOut,
        Self::QuadIn,
        Self::QuadOut,
        Self::QuadInOut,
        Self::CubicIn,
        Self::CubicOut,
        Self::CubicInOut,
        Self::QuartIn,
        Self::QuartOut,
        Self::QuartInOut,
        Self::QuintIn,
        Self::QuintOut,
        Self::QuintInOut,
        Self::ExpoIn,
        Self::ExpoOut,
        Self::ExpoInOut,
        Self::CircIn,
        Self::CircOut,
        Self::CircInOut,
        Self::BackIn,
        Self::BackOut,
        Self::BackInOut,
        Self::ElasticIn,
        Self::ElasticOut,
        Self::ElasticInOut,
        Self::BounceIn,
        Self::BounceOut,
        Self::BounceInOut,
        Self::SlowMotion,
    ];

    /// Evaluate the curve at `p`
    pub fn evaluate(self, p: f64) -> f64 {
        match self {
            Self::Default => CubicBezier::new(0.25, 0.1, 0.25, 1.0).solve(p),
            Self::Linear => p,
            Self::EaseIn => CubicBezier::new(0.42, 0.0, 1.0, 1.0).solve(p),
            Self::EaseOut => CubicBezier::new(0.0, 0.0, 0.58, 1.0).solve(p),
            Self::EaseInOut => CubicBezier::new(0.42, 0.0, 0.58, 1.0).solve(p),
            Self::SineIn => ((p - 1.0) * FRAC_PI_2).sin() + 1.0,
            Self::SineOut => (p * FRAC_PI_2).sin(),
            Self::SineInOut => 0.5 * (1.0 - (p * PI).cos()),
            Self::QuadIn => p * p,
            Self::QuadOut => -(p * (p - 2.0)),
            Self::QuadInOut => {
                if p < 0.5 {
                    2.0 * p * p
                } else {
                    (-2.0 * p * p) + (4.0 * p) - 1.0
                }
            }
            Self::CubicIn => p * p * p,
            Self::CubicOut => {
                let f = p - 1.0;
                f * f * f + 1.0
            }
            Self::CubicInOut => {
                if p < 0.5 {
                    4.0 * p * p * p
                } else {
                    let f = (2.0 * p) - 2.0;
                    0.5 * f * f * f + 1.0
                }
            }
            Self::QuartIn => p * p * p * p,
            Self::QuartOut => {
                let f = p - 1.0;
                f * f * f * (1.0 - p) + 1.0
            }
            Self::QuartInOut => {
                if p < 0.5 {
                    8.0 * p * p * p * p
                } else {
                    let f = p - 1.0;
                    -8.0 * f * f * f * f + 1.0
                }
            }
            Self::QuintIn => p * p * p * p * p,
            Self::QuintOut => {
                let f = p - 1.0;
                f * f * f * f * f + 1.0
            }
            Self::QuintInOut => {
                if p < 0.5 {
                    16.0 * p * p * p * p * p
                } else {
                    let f = (2.0 * p) - 2.0;
                    0.5 * f * f * f * f * f + 1.0
                }
            }
            Self::ExpoIn => {
                if p == 0.0 {
                    p
                } else {
                    2f64.powf(10.0 * (p - 1.0))
                }
            }
            Self::ExpoOut => {
                if p == 1.0 {
                    p
                } else {
                    1.0 - 2f64.powf(-10.0 * p)
                }
            }
            Self::ExpoInOut => {
                if p == 0.0 || p == 1.0 {
                    p
                } else if p < 0.5 {
                    0.5 * 2f64.powf((20.0 * p) - 10.0)
                } else {
                    -0.5 * 2f64.powf((-20.0 * p) + 10.0) + 1.0
                }
            }
            Self::CircIn => 1.0 - (1.0 - (p * p)).sqrt(),
            Self::CircOut => ((2.0 - p) * p).sqrt(),
            Self::CircInOut => {
                if p < 0.5 {
                    0.5 * (1.0 - (1.0 - 4.0 * (p * p)).sqrt())
                } else {
                    0.5 * ((-((2.0 * p) - 3.0) * ((2.0 * p) - 1.0)).sqrt() + 1.0)
                }
            }
            Self::BackIn => p * p * p - p * (p * PI).sin(),
            Self::BackOut => {
                let f = 1.0 - p;
                1.0 - (f * f * f - f * (f * PI).sin())
            }
            Self::BackInOut => {
                if p < 0.5 {
                    let f = 2.0 * p;
                    0.5 * (f * f * f - f * (f * PI).sin())
                } else {
                    let f = 1.0 - (2.0 * p - 1.0);
                    0.5 * (1.0 - (f * f * f - f * (f * PI).sin())) + 0.5
                }
            }
            Self::ElasticIn => (13.0 * FRAC_PI_2 * p).sin() * 2f64.powf(10.0 * (p - 1.0)),
            Self::ElasticOut => {
                (-13.0 * FRAC_PI_2 * (p + 1.0)).sin() * 2f64.powf(-10.0 * p) + 1.0
            }
            Self::ElasticInOut => {
                if p < 0.5 {
                    0.5 * (13.0 * FRAC_PI_2 * (2.0 * p)).sin() * 2f64.powf(10.0 * ((2.0 * p) - 1.0))
                } else {
                    0.5 * ((-13.0 * FRAC_PI_2 * ((2.0 * p - 1.0) + 1.0)).sin()
                        * 2f64.powf(-10.0 * (2.0 * p - 1.0))
                        + 2.0)
                }
            }
            Self::BounceIn => bounce_in(p),
            Self::BounceOut => bounce_out(p),
            Self::BounceInOut => {
                if p < 0.5 {
                    0.5 * bounce_in(p * 2.0)
                } else {
                    0.5 * bounce_out(p * 2.0 - 1.0) + 0.5
                }
            }
            Self::SlowMotion => slow_motion(p),
        }
    }

    /// Evaluate the curve played back-to-front: `1 - f(1 - p)`
    pub fn mirrored(self, p: f64) -> f64 {
        1.0 - self.evaluate(1.0 - p)
    }

    /// Whether the curve can leave `[0, 1]`
    pub fn overshoots(self) -> bool {
        matches!(
            self,
            Self::BackIn
                | Self::BackOut
                | Self::BackInOut
                | Self::ElasticIn
                | Self::ElasticOut
                | Self::ElasticInOut
        )
    }

    /// Get the display name
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Linear => "Linear",
            Self::EaseIn => "Ease In",
            Self::EaseOut => "Ease Out",
            Self::EaseInOut => "Ease In Out",
            Self::SineIn => "Sine In",
            Self::SineOut => "Sine Out",
            Self::SineInOut => "Sine In Out",
            Self::QuadIn => "Quad In",
            Self::QuadOut => "Quad Out",
            Self::QuadInOut => "Quad In Out",
            Self::CubicIn => "Cubic In",
            Self::CubicOut => "Cubic Out",
            Self::CubicInOut => "Cubic In Out",
            Self::QuartIn => "Quart In",
            Self::QuartOut => "Quart Out",
            Self::QuartInOut => "Quart In Out",
            Self::QuintIn => "Quint In",
            Self::QuintOut => "Quint Out",
            Self::QuintInOut => "Quint In Out",
            Self::ExpoIn => "Expo In",
            Self::ExpoOut => "Expo Out",
            Self::ExpoInOut => "Expo In Out",
            Self::CircIn => "Circ In",
            Self::CircOut => "Circ Out",
            Self::CircInOut => "Circ In Out",
            Self::BackIn => "Back In",
            Self::BackOut => "Back Out",
            Self::BackInOut => "Back In Out",
            Self::ElasticIn => "Elastic In",
            Self::ElasticOut => "Elastic Out",
            Self::ElasticInOut => "Elastic In Out",
            Self::BounceIn => "Bounce In",
            Self::BounceOut => "Bounce Out",
            Self::BounceInOut => "Bounce In Out",
            Self::SlowMotion => "Slow Motion",
        }
    }
}

fn bounce_in(p: f64) -> f64 {
    1.0 - bounce_out(1.0 - p)
}

fn bounce_out(p: f64) -> f64 {
    if p < 4.0 / 11.0 {
        (121.0 * p * p) / 16.0
    } else if p < 8.0 / 11.0 {
        (363.0 / 40.0 * p * p) - (99.0 / 10.0 * p) + 17.0 / 5.0
    } else if p < 9.0 / 10.0 {
        (4356.0 / 361.0 * p * p) - (35442.0 / 1805.0 * p) + 16061.0 / 1805.0
    } else {
        (54.0 / 5.0 * p * p) - (513.0 / 25.0 * p) + 268.0 / 25.0
    }
}

fn slow_motion(p: f64) -> f64 {
    const P1: f64 = 0.25;
    const P2: f64 = 0.7;
    const P3: f64 = P1 + P2;

    let r = p + (0.5 - p) * p;
    if p < P1 {
        let rate = 1.0 - (p / P1);
        r - (rate * rate * rate * rate * r)
    } else if p > P3 {
        let rate = (p - P3) / P1;
        r + (p - r) * (rate * rate * rate * rate)
    } else {
        r
    }
}

/// Unit cubic bezier from (0, 0) to (1, 1)
#[derive(Debug, Clone, Copy)]
struct CubicBezier {
    cx: f64,
    bx: f64,
    ax: f64,
    cy: f64,
    by: f64,
    ay: f64,
}

impl CubicBezier {
    const EPSILON: f64 = 1e-7;

    fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let ax = 1.0 - cx - bx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        let ay = 1.0 - cy - by;
        Self { cx, bx, ax, cy, by, ay }
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_dx(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    fn solve_t(&self, x: f64) -> f64 {
        // Newton first, bisection when the slope is too flat
        let mut t = x;
        for _ in 0..8 {
            let err = self.sample_x(t) - x;
            if err.abs() < Self::EPSILON {
                return t;
            }
            let dx = self.sample_dx(t);
            if dx.abs() < 1e-6 {
                break;
            }
            t -= err / dx;
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        t = x.clamp(0.0, 1.0);
        while lo < hi {
            let sample = self.sample_x(t);
            if (sample - x).abs() < Self::EPSILON {
                break;
            }
            if x > sample {
                lo = t;
            } else {
                hi = t;
            }
            let next = (hi - lo) * 0.5 + lo;
            if next == t {
                break;
            }
            t = next;
        }
        t
    }

    fn solve(&self, x: f64) -> f64 {
        if x <= 0.0 {
            0.0
        } else if x >= 1.0 {
            1.0
        } else {
            self.sample_y(self.solve_t(x))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_endpoints() {
        for curve in TimingCurve::ALL {
            assert!(approx(curve.evaluate(0.0), 0.0), "{} at 0", curve.name());
            if curve == TimingCurve::SlowMotion {
                // does not land on 1.0
                continue;
            }
            assert!(approx(curve.evaluate(1.0), 1.0), "{} at 1", curve.name());
        }
    }

    #[test]
    fn test_reference_values() {
        assert_eq!(TimingCurve::QuadIn.evaluate(0.5), 0.25);
        assert_eq!(TimingCurve::QuadOut.evaluate(0.5), 0.75);
        assert_eq!(TimingCurve::CubicInOut.evaluate(0.25), 4.0 * 0.25 * 0.25 * 0.25);
        assert_eq!(TimingCurve::QuintInOut.evaluate(0.5), 0.5);
        assert!(approx(TimingCurve::SineInOut.evaluate(0.5), 0.5));
        assert!(approx(TimingCurve::ExpoIn.evaluate(0.5), 2f64.powf(-5.0)));
        assert!(approx(TimingCurve::BounceOut.evaluate(0.2), 121.0 * 0.04 / 16.0));
    }

    #[test]
    fn test_overshoot() {
        assert!(TimingCurve::BackIn.evaluate(0.3) < 0.0);
        assert!(TimingCurve::BackOut.evaluate(0.7) > 1.0);
        assert!(TimingCurve::BackIn.overshoots());
        assert!(!TimingCurve::Linear.overshoots());
    }

    #[test]
    fn test_bezier_named_curves() {
        assert!(approx(TimingCurve::EaseInOut.evaluate(0.5), 0.5));
        assert!(TimingCurve::EaseIn.evaluate(0.25) < 0.25);
        assert!(TimingCurve::EaseOut.evaluate(0.25) > 0.25);
    }

    #[test]
    fn test_mirrored() {
        // an in curve mirrors onto its out counterpart
        let pairs = [
            (TimingCurve::QuadIn, TimingCurve::QuadOut),
            (TimingCurve::CubicIn, TimingCurve::CubicOut),
            (TimingCurve::SineIn, TimingCurve::SineOut),
            (TimingCurve::BounceIn, TimingCurve::BounceOut),
        ];
        for (curve, counterpart) in pairs {
            for i in 0..=10 {
                let p = f64::from(i) / 10.0;
                assert!(approx(curve.mirrored(p), counterpart.evaluate(p)));
            }
        }
        assert!(approx(TimingCurve::QuadIn.mirrored(0.5), 0.75));
        assert!(approx(TimingCurve::Linear.mirrored(0.3), 0.3));
    }

    #[test]
    fn test_slow_motion_middle_is_flat() {
        let a = TimingCurve::SlowMotion.evaluate(0.4);
        let b = TimingCurve::SlowMotion.evaluate(0.6);
        assert!(approx(a, 0.4 + 0.1 * 0.4));
        assert!(approx(b, 0.6 - 0.1 * 0.6));
    }
}
