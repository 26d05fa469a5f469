use crate::affine::AffineTransform;
use crate::error::MatchError;
use nalgebra::{Matrix3, Vector3};

/// Translate the centroid to the origin and scale the mean distance to √2.
fn normalize_points(pts: &[[f64; 2]]) -> (AffineTransform, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = AffineTransform::from_scale(s).compose(&AffineTransform::from_translation(-cx, -cy));
    let normalized = pts.iter().map(|p| [s * (p[0] - cx), s * (p[1] - cy)]).collect();
    (t, normalized)
}

/// Least-squares affine `dst ≈ A · src` from at least three non-collinear
/// correspondences.
pub fn fit_affine_lsq(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<AffineTransform, MatchError> {
    let n = src.len().min(dst.len());
    if n < 3 {
        return Err(MatchError::TooFewMatches { needed: 3, found: n });
    }
    if src.len() != dst.len() {
        return Err(MatchError::Degenerate(
            "src and dst must have the same length".into(),
        ));
    }
    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    // Normal equations shared by both output rows.
    let mut ata = Matrix3::<f64>::zeros();
    let mut atx = Vector3::<f64>::zeros();
    let mut aty = Vector3::<f64>::zeros();
    for (s, d) in src_n.iter().zip(&dst_n) {
        let row = Vector3::new(s[0], s[1], 1.0);
        ata += row * row.transpose();
        atx += row * d[0];
        aty += row * d[1];
    }
    let cond_floor = 1e-10 * ata.trace().max(1.0);
    if ata.determinant().abs() <= cond_floor {
        return Err(MatchError::Degenerate("collinear correspondences".into()));
    }
    let chol = ata
        .cholesky()
        .ok_or_else(|| MatchError::Degenerate("normal equations not positive definite".into()))?;
    let rx = chol.solve(&atx);
    let ry = chol.solve(&aty);
    let m_norm = Matrix3::new(rx[0], rx[1], rx[2], ry[0], ry[1], ry[2], 0.0, 0.0, 1.0);
    let normalized = AffineTransform::try_from_matrix(m_norm)
        .map_err(|e| MatchError::Degenerate(e.to_string()))?;

    let t_dst_inv = t_dst
        .inverse()
        .ok_or_else(|| MatchError::Degenerate("destination normalization not invertible".into()))?;
    let out = t_dst_inv.compose(&normalized).compose(&t_src);
    if out.determinant().abs() <= f64::EPSILON {
        return Err(MatchError::Degenerate("fitted transform is singular".into()));
    }
    Ok(out)
}

/// Euclidean transfer error `‖A · src − dst‖`.
pub fn residual(t: &AffineTransform, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = t.apply(*src);
    ((p[0] - dst[0]).powi(2) + (p[1] - dst[1]).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Vector2};

    fn truth() -> AffineTransform {
        AffineTransform::from_parts(
            Matrix2::new(0.48, -0.09, 0.11, -0.51),
            Vector2::new(512_300.0, 5_402_100.0),
        )
    }

    #[test]
    fn exact_fit_recovers_transform() {
        let t = truth();
        let src: Vec<[f64; 2]> = (0..12)
            .map(|i| [(i % 4) as f64 * 250.0 + 13.0, (i / 4) as f64 * 310.0 + 7.0])
            .collect();
        let dst = t.apply_points(&src);
        let fit = fit_affine_lsq(&src, &dst).unwrap();
        assert!(fit.linear().relative_eq(&t.linear(), 1e-9, 1e-9));
        for (s, d) in src.iter().zip(&dst) {
            assert!(residual(&fit, s, d) < 1e-6);
        }
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let src = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [5.0, 5.0]];
        let dst = [[0.0, 0.0], [1.0, 2.0], [2.0, 4.0], [5.0, 10.0]];
        assert!(matches!(
            fit_affine_lsq(&src, &dst),
            Err(MatchError::Degenerate(_))
        ));
    }

    #[test]
    fn too_few_points() {
        let src = [[0.0, 0.0], [1.0, 0.0]];
        assert!(matches!(
            fit_affine_lsq(&src, &src),
            Err(MatchError::TooFewMatches { needed: 3, found: 2 })
        ));
    }
}
