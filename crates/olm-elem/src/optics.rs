/// Below this |k²·l²| the series expansions replace the trigonometric forms.
const SERIES_THRESHOLD: f64 = 1e-10;

/// Principal trajectories of `u'' + k² u = 0` over `l`.
///
/// Returns `(C, S, D, F)` where `C` and `S` are the cosine- and sine-like
/// solutions, `D = (1 − C)/k²` and `F = (l − S)/k²`. Both signs of `k²`
/// are handled, with the `k² → 0` limits `(1, l, l²/2, l³/6)`.
pub fn principal(k2: f64, l: f64) -> (f64, f64, f64, f64) {
    let phase2 = k2 * l * l;
    if phase2.abs() < SERIES_THRESHOLD {
        let l2 = l * l;
        let c = 1.0 - phase2 / 2.0;
        let s = l * (1.0 - phase2 / 6.0);
        let d = l2 / 2.0 * (1.0 - phase2 / 12.0);
        let f = l2 * l / 6.0 * (1.0 - phase2 / 20.0);
        return (c, s, d, f);
    }
    let k = k2.abs().sqrt();
    let (c, s) = if k2 > 0.0 {
        ((k * l).cos(), (k * l).sin() / k)
    } else {
        ((k * l).cosh(), (k * l).sinh() / k)
    };
    (c, s, (1.0 - c) / k2, (l - s) / k2)
}

/// Plane matrix `[[C, S], [−k² S, C]]`.
pub fn plane(k2: f64, l: f64) -> [[f64; 2]; 2] {
    let (c, s, _, _) = principal(k2, l);
    [[c, s], [-k2 * s, c]]
}

/// Field-free plane matrix.
pub fn drift(l: f64) -> [[f64; 2]; 2] {
    [[1.0, l], [0.0, 1.0]]
}

/// Thin-lens plane matrix with focal length `f`; `f = ∞` is the identity.
pub fn thin(focal_length: f64) -> [[f64; 2]; 2] {
    let kick = if focal_length.is_infinite() {
        0.0
    } else {
        -1.0 / focal_length
    };
    [[1.0, 0.0], [kick, 1.0]]
}
