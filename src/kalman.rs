use nalgebra as na;

use crate::Float;

/// Constant-velocity Kalman filter over a 2D position.
///
/// State is `(x, y, vx, vy)`, the measurement is `(x, y)` and one step is
/// one frame.
#[derive(Debug, Clone)]
pub struct KalmanFilter<F>
where
    F: Float,
{
    pub x: na::Vector4<F>,
    pub p: na::Matrix4<F>,
    pub f: na::Matrix4<F>,
    pub h: na::Matrix2x4<F>,
    pub q: na::Matrix4<F>,
    pub r: na::Matrix2<F>,
}

impl<F> KalmanFilter<F>
where
    F: Float,
{
    /// Starts at `pos` with zero velocity and unit covariance.
    pub fn new(pos: na::Point2<F>, process_noise: F, measurement_noise: F) -> Self {
        let (o, z) = (F::one(), F::zero());

        #[rustfmt::skip]
        let f = na::Matrix4::new(
            o, z, o, z,
            z, o, z, o,
            z, z, o, z,
            z, z, z, o,
        );

        #[rustfmt::skip]
        let h = na::Matrix2x4::new(
            o, z, z, z,
            z, o, z, z,
        );

        Self {
            x: na::Vector4::new(pos.x, pos.y, z, z),
            p: na::Matrix4::identity(),
            f,
            h,
            q: na::Matrix4::identity() * process_noise,
            r: na::Matrix2::identity() * measurement_noise,
        }
    }

    #[inline]
    pub fn position(&self) -> na::Point2<F> {
        na::Point2::new(self.x[0], self.x[1])
    }

    #[inline]
    pub fn velocity(&self) -> na::Vector2<F> {
        na::Vector2::new(self.x[2], self.x[3])
    }

    /// Projects the state one step ahead and returns the predicted position.
    pub fn predict(&mut self) -> na::Point2<F> {
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;

        self.position()
    }

    /// Corrects the state with a measured position. Returns `false` and
    /// leaves the state untouched if the innovation covariance is singular.
    pub fn correct(&mut self, z: na::Point2<F>) -> bool {
        let y = z.coords - self.h * self.x;
        let s = self.h * self.p * self.h.transpose() + self.r;

        let s_inv = match s.try_inverse() {
            Some(inv) => inv,
            None => return false,
        };

        let k = self.p * self.h.transpose() * s_inv;

        self.x += k * y;
        self.p = (na::Matrix4::identity() - k * self.h) * self.p;

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn prediction_without_velocity_stays_put() {
        let mut kf = KalmanFilter::new(na::Point2::new(5.0f32, 7.0), 1e-2, 1e-1);
        let p = kf.predict();

        assert_abs_diff_eq!(p.x, 5.0);
        assert_abs_diff_eq!(p.y, 7.0);
    }

    #[test]
    fn correction_lands_between_prediction_and_measurement() {
        let mut kf = KalmanFilter::new(na::Point2::new(0.0f64, 0.0), 1e-2, 1e-1);
        kf.predict();
        assert!(kf.correct(na::Point2::new(1.0, 0.0)));

        assert!(kf.x[0] > 0.5 && kf.x[0] < 1.0);
        assert!(kf.velocity().x > 0.0);
    }

    #[test]
    fn learns_constant_velocity() {
        let mut kf = KalmanFilter::new(na::Point2::new(0.0f64, 0.0), 1e-2, 1e-1);

        for i in 1..30 {
            kf.predict();
            kf.correct(na::Point2::new(2.0 * i as f64, -1.0 * i as f64));
        }

        assert_abs_diff_eq!(kf.velocity().x, 2.0, epsilon = 0.05);
        assert_abs_diff_eq!(kf.velocity().y, -1.0, epsilon = 0.05);

        let next = kf.predict();
        assert_abs_diff_eq!(next.x, 60.0, epsilon = 0.5);
    }
}
