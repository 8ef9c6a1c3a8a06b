use statrs::distribution::{Continuous, Exp, InverseGamma, Normal, Uniform};

/// Kernel shape used by a kernel density
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Gaussian,
    Uniform,
    Triangle,
}

impl Kernel {
    /// Weight of a point at distance `dist` with bandwidth `bw`
    fn weight(&self, dist: f64, bw: f64) -> f64 {
        let u = dist.abs() / bw;
        match self {
            Kernel::Gaussian => (-0.5 * u * u).exp() / (bw * (2.0 * std::f64::consts::PI).sqrt()),
            Kernel::Uniform => {
                if u <= 1.0 {
                    0.5 / bw
                } else {
                    0.0
                }
            }
            Kernel::Triangle => {
                if u < 1.0 {
                    (1.0 - u) / bw
                } else {
                    0.0
                }
            }
        }
    }
}

/// Kernel density over a fixed set of points
#[derive(Debug, Clone, PartialEq)]
pub struct KernelDensity {
    pub kernel: Kernel,
    pub points: Vec<f64>,
    pub bandwidth: f64,
}

impl KernelDensity {
    pub fn new(kernel: Kernel, points: Vec<f64>, bandwidth: f64) -> Result<Self, String> {
        if points.is_empty() {
            return Err("kernel density needs at least one point".to_string());
        }
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(format!("bandwidth must be positive, got {}", bandwidth));
        }
        Ok(Self { kernel, points, bandwidth })
    }

    pub fn density(&self, x: f64) -> f64 {
        let total: f64 = self.points.iter().map(|p| self.kernel.weight(x - p, self.bandwidth)).sum();
        total / self.points.len() as f64
    }
}

/// The distributions a profile model state can emit
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Normal(Normal),
    Uniform(Uniform),
    InverseGamma(InverseGamma),
    Exponential(Exp),
    KernelDensity(KernelDensity),
}

impl Distribution {
    pub fn normal(mean: f64, std: f64) -> Result<Self, String> {
        Normal::new(mean, std).map(Distribution::Normal).map_err(|e| e.to_string())
    }

    pub fn uniform(low: f64, high: f64) -> Result<Self, String> {
        if !(low < high) {
            return Err(format!("uniform bounds must satisfy low < high, got {} and {}", low, high));
        }
        Uniform::new(low, high).map(Distribution::Uniform).map_err(|e| e.to_string())
    }

    pub fn inverse_gamma(shape: f64, rate: f64) -> Result<Self, String> {
        InverseGamma::new(shape, rate)
            .map(Distribution::InverseGamma)
            .map_err(|e| e.to_string())
    }

    pub fn exponential(rate: f64) -> Result<Self, String> {
        Exp::new(rate).map(Distribution::Exponential).map_err(|e| e.to_string())
    }

    /// Probability density at `x`
    pub fn density(&self, x: f64) -> f64 {
        match self {
            Distribution::Normal(d) => d.pdf(x),
            Distribution::Uniform(d) => d.pdf(x),
            Distribution::InverseGamma(d) => d.pdf(x),
            Distribution::Exponential(d) => d.pdf(x),
            Distribution::KernelDensity(kde) => kde.density(x),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Distribution::Normal(_) => "NormalDistribution",
            Distribution::Uniform(_) => "UniformDistribution",
            Distribution::InverseGamma(_) => "InverseGammaDistribution",
            Distribution::Exponential(_) => "ExponentialDistribution",
            Distribution::KernelDensity(kde) => match kde.kernel {
                Kernel::Gaussian => "GaussianKernelDensity",
                Kernel::Uniform => "UniformKernelDensity",
                Kernel::Triangle => "TriangleKernelDensity",
            },
        }
    }
}
