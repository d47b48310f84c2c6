//! Per-unit admittance models of the network elements.
//!
//! All values refer to the network power base `sn_mva` and the rated voltage of the bus the
//! element is connected to.

use std::f64::consts::PI;

use derive_more::{Deref, DerefMut};
use num_complex::Complex64;

use crate::network::{Impedance, Line, Shunt, Transformer};

/// Represents an admittance value in a power system.
///
/// `Admittance` is a wrapper around a complex number representing the admittance value.
#[derive(Clone, Copy, Default, PartialEq, Debug, Deref, DerefMut)]
pub struct Admittance(pub Complex64);

impl Admittance {
    /// Admittance of a shunt element, scaled from its rated voltage to the bus voltage.
    pub fn shunt(shunt: &Shunt, vn_bus_kv: f64, sn_mva: f64) -> Self {
        let ratio = vn_bus_kv / shunt.vn_kv;
        let s = Complex64::new(shunt.p_mw, -shunt.q_mvar) * shunt.step as f64;
        Admittance(s / sn_mva * ratio * ratio)
    }

    /// Admittance of the constant impedance part of a ward (`pz`/`qz` given at 1 pu).
    pub fn ward(pz_mw: f64, qz_mvar: f64, sn_mva: f64) -> Self {
        Admittance(Complex64::new(pz_mw, -qz_mvar) / sn_mva)
    }
}

fn usable(z: Complex64) -> bool {
    z.re.is_finite() && z.im.is_finite() && z.norm() > 0.0
}

/// Two-port admittance stamp `[[yff, yft], [ytf, ytt]]` in per unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchStamp {
    pub yff: Complex64,
    pub yft: Complex64,
    pub ytf: Complex64,
    pub ytt: Complex64,
}

impl BranchStamp {
    /// Symmetric series admittance.
    pub fn series(ys: Complex64) -> Self {
        Self::pi(ys, Complex64::default(), Complex64::default())
    }

    /// Pi section with a series admittance and a shunt at each side.
    pub fn pi(ys: Complex64, ysh_from: Complex64, ysh_to: Complex64) -> Self {
        Self {
            yff: ys + ysh_from,
            yft: -ys,
            ytf: -ys,
            ytt: ys + ysh_to,
        }
    }

    /// Complex power entering the branch at the from and to sides.
    pub fn flows(&self, vf: Complex64, vt: Complex64) -> (Complex64, Complex64) {
        let i_f = self.yff * vf + self.yft * vt;
        let i_t = self.ytf * vf + self.ytt * vt;
        (vf * i_f.conj(), vt * i_t.conj())
    }

    /// Line pi model. `None` if the series impedance is zero.
    pub fn line(line: &Line, vn_kv: f64, sn_mva: f64, f_hz: f64) -> Option<Self> {
        let zbase = vn_kv * vn_kv / sn_mva;
        let parallel = line.parallel.max(1) as f64;
        let z = Complex64::new(line.r_ohm_per_km, line.x_ohm_per_km) * line.length_km
            / parallel
            / zbase;
        if !usable(z) {
            return None;
        }
        let ysh = Complex64::new(
            line.g_us_per_km * 1e-6,
            2.0 * PI * f_hz * line.c_nf_per_km * 1e-9,
        ) * line.length_km
            * parallel
            * zbase;
        Some(Self::pi(1.0 / z, ysh / 2.0, ysh / 2.0))
    }

    /// Two-winding transformer with complex ratio on the high voltage side and the
    /// magnetising admittance split evenly between both sides.
    pub fn trafo(
        trafo: &Transformer,
        vn_hv_bus: f64,
        vn_lv_bus: f64,
        sn_mva: f64,
        calculate_voltage_angles: bool,
    ) -> Option<Self> {
        let parallel = trafo.parallel.max(1) as f64;
        let zk = trafo.vk_percent / 100.0;
        let rk = trafo.vkr_percent / 100.0;
        let xk = (zk * zk - rk * rk).max(0.0).sqrt();
        let lv_ratio = trafo.vn_lv_kv / vn_lv_bus;
        let base = lv_ratio * lv_ratio * sn_mva / trafo.sn_mva;
        let z = Complex64::new(rk, xk) * base / parallel;
        if !usable(z) {
            return None;
        }
        let g = trafo.pfe_kw / 1000.0 / trafo.sn_mva;
        let y0 = trafo.i0_percent / 100.0;
        let ym = Complex64::new(g, -(y0 * y0 - g * g).max(0.0).sqrt()) / base * parallel;

        let mut ratio = (trafo.vn_hv_kv / vn_hv_bus) / lv_ratio;
        if let (Some(pos), Some(step)) = (trafo.tap_pos, trafo.tap_step_percent) {
            let tap = 1.0 + (pos - trafo.tap_neutral.unwrap_or(0.0)) * step / 100.0;
            match trafo.tap_side.as_deref() {
                Some("lv") => ratio /= tap,
                _ => ratio *= tap,
            }
        }
        let shift = if calculate_voltage_angles {
            trafo.shift_degree.to_radians()
        } else {
            0.0
        };
        let t = Complex64::from_polar(ratio, shift);
        let ys = 1.0 / z;
        Some(Self {
            yff: (ys + ym / 2.0) / (ratio * ratio),
            yft: -ys / t.conj(),
            ytf: -ys / t,
            ytt: ys + ym / 2.0,
        })
    }

    /// Impedance branch with independent forward and reverse values.
    ///
    /// `Yft = -1/z_ft` and `Ytf = -1/z_tf`; every row of the stamp sums to zero.
    pub fn impedance(imp: &Impedance, sn_mva: f64) -> Option<Self> {
        let scale = sn_mva / imp.sn_mva;
        let zft = Complex64::new(imp.rft_pu, imp.xft_pu) * scale;
        let ztf = Complex64::new(imp.rtf_pu, imp.xtf_pu) * scale;
        if !usable(zft) || !usable(ztf) {
            return None;
        }
        Some(Self {
            yff: 1.0 / zft,
            yft: -1.0 / zft,
            ytf: -1.0 / ztf,
            ytt: 1.0 / ztf,
        })
    }

    /// Series branch given in ohm, used for switches and extended ward sources.
    pub fn series_ohm(r_ohm: f64, x_ohm: f64, vn_kv: f64, sn_mva: f64) -> Option<Self> {
        let z = Complex64::new(r_ohm, x_ohm) * sn_mva / (vn_kv * vn_kv);
        usable(z).then(|| Self::series(1.0 / z))
    }
}
