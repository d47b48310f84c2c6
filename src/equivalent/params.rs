//! Translation of the reduced admittance matrix into element parameters.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::kron::ReducedNetwork;
use crate::error::EquivalentError;
use crate::network::Network;

/// Kind of element carrying the boundary shunts and powers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquivalentType {
    #[default]
    Ward,
    XWard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WardParameter {
    pub bus: i64,
    /// Shunt admittance in per unit on the network power base.
    pub shunt: Complex64,
    /// Equivalent power (MW/Mvar, load convention) set by the calibration.
    pub power: Complex64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XWardParameter {
    pub ward: WardParameter,
    pub r_ohm: f64,
    pub x_ohm: f64,
    pub vm_pu: f64,
}

/// Transfer impedance between two boundary buses, per unit on the network power base.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpedanceParameter {
    pub from_bus: i64,
    pub to_bus: i64,
    pub rft_pu: f64,
    pub xft_pu: f64,
    pub rtf_pu: f64,
    pub xtf_pu: f64,
}

impl ImpedanceParameter {
    /// Whether all four components are within `tol` of zero.
    pub fn is_bypass(&self, tol: f64) -> bool {
        [self.rft_pu, self.xft_pu, self.rtf_pu, self.xtf_pu]
            .iter()
            .all(|v| v.abs() <= tol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryParameters {
    Ward(Vec<WardParameter>),
    XWard(Vec<XWardParameter>),
}

impl BoundaryParameters {
    pub fn wards(&self) -> Box<dyn Iterator<Item = &WardParameter> + '_> {
        match self {
            BoundaryParameters::Ward(w) => Box::new(w.iter()),
            BoundaryParameters::XWard(x) => Box::new(x.iter().map(|x| &x.ward)),
        }
    }

    pub fn wards_mut(&mut self) -> Box<dyn Iterator<Item = &mut WardParameter> + '_> {
        match self {
            BoundaryParameters::Ward(w) => Box::new(w.iter_mut()),
            BoundaryParameters::XWard(x) => Box::new(x.iter_mut().map(|x| &mut x.ward)),
        }
    }
}

/// Parameter tables derived from one reduced network.
#[derive(Debug, Clone, PartialEq)]
pub struct EquivalentParameters {
    pub boundary: BoundaryParameters,
    pub impedance: Vec<ImpedanceParameter>,
}

/// Shunt of each boundary bus: the row sum of `Y_eq`.
pub fn calc_ward_parameter(reduced: &ReducedNetwork) -> Vec<WardParameter> {
    reduced
        .boundary
        .iter()
        .enumerate()
        .map(|(i, &bus)| WardParameter {
            bus,
            shunt: reduced.y_eq.row(i).iter().sum(),
            power: Complex64::default(),
        })
        .collect()
}

/// Ward rows extended by the series reactance `x = -1 / B / sn * vn^2` and the solved
/// voltage magnitude of the bus, read from `net.res`.
pub fn calc_xward_parameter(
    net: &Network,
    reduced: &ReducedNetwork,
) -> Result<Vec<XWardParameter>, EquivalentError> {
    calc_ward_parameter(reduced)
        .into_iter()
        .map(|ward| {
            let bus = ward.bus;
            let vm_pu = net
                .bus_voltage(bus)
                .map(|(vm, _)| vm)
                .ok_or(EquivalentError::MissingPriorSolution { bus })?;
            let vn_kv = net
                .bus
                .get(&bus)
                .map(|b| b.vn_kv)
                .ok_or(EquivalentError::UnresolvedBus { bus })?;
            let x_ohm = -1.0 / ward.shunt.im / net.sn_mva * vn_kv * vn_kv;
            Ok(XWardParameter {
                ward,
                r_ohm: 0.0,
                x_ohm,
                vm_pu,
            })
        })
        .collect()
}

/// One row per boundary pair `i < j` whose coupling exceeds `coupling_tol`.
///
/// The forward impedance is `-1 / Y_eq[i, j]`, the reverse one `-1 / Y_eq[j, i]`.
pub fn calc_impedance_parameter(
    reduced: &ReducedNetwork,
    coupling_tol: f64,
) -> Vec<ImpedanceParameter> {
    let y = &reduced.y_eq;
    let n = reduced.boundary.len();
    let mut rows = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            if y[(i, j)].norm() <= coupling_tol {
                continue;
            }
            let zft = -y[(i, j)].inv();
            let ztf = -y[(j, i)].inv();
            rows.push(ImpedanceParameter {
                from_bus: reduced.boundary[i],
                to_bus: reduced.boundary[j],
                rft_pu: zft.re,
                xft_pu: zft.im,
                rtf_pu: ztf.re,
                xtf_pu: ztf.im,
            });
        }
    }
    rows
}

pub fn calc_parameters(
    net: &Network,
    reduced: &ReducedNetwork,
    eq_type: EquivalentType,
    coupling_tol: f64,
) -> Result<EquivalentParameters, EquivalentError> {
    let boundary = match eq_type {
        EquivalentType::Ward => BoundaryParameters::Ward(calc_ward_parameter(reduced)),
        EquivalentType::XWard => BoundaryParameters::XWard(calc_xward_parameter(net, reduced)?),
    };
    Ok(EquivalentParameters {
        boundary,
        impedance: calc_impedance_parameter(reduced, coupling_tol),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::*;
    use nalgebra::dmatrix;

    fn reduced() -> ReducedNetwork {
        let y01 = Complex64::new(1.0, -10.0);
        let tiny = Complex64::new(1e-12, 0.0);
        let sh = Complex64::new(0.0, 0.2);
        ReducedNetwork {
            y_eq: dmatrix![
                y01 + sh, -y01, -tiny;
                -y01, y01 + tiny, -tiny;
                -tiny, -tiny, 2.0 * tiny
            ],
            boundary: vec![7, 3, 5],
            solver_bus: vec![0, 1, 2],
        }
    }

    #[test]
    fn shunts_are_row_sums() {
        let wards = calc_ward_parameter(&reduced());
        assert_eq!(wards.iter().map(|w| w.bus).collect::<Vec<_>>(), vec![7, 3, 5]);
        let expected = Complex64::new(0.0, 0.2) + Complex64::new(-1e-12, 0.0);
        assert!((wards[0].shunt - expected).norm() < 1e-12);
        assert!(wards[1].shunt.norm() < 1e-15);
        assert!(wards.iter().all(|w| w.power == Complex64::default()));
    }

    #[test]
    fn weak_couplings_are_omitted() {
        let rows = calc_impedance_parameter(&reduced(), 1e-10);
        assert_eq!(rows.len(), 1);
        let z = Complex64::new(1.0, -10.0).inv();
        assert_eq!((rows[0].from_bus, rows[0].to_bus), (7, 3));
        assert!((rows[0].rft_pu - z.re).abs() < 1e-15);
        assert!((rows[0].xtf_pu - z.im).abs() < 1e-15);
        assert!(!rows[0].is_bypass(1e-8));
    }

    #[test]
    fn xward_reactance_follows_the_shunt_susceptance() {
        let mut net = Network::default();
        for vn in [110.0, 110.0, 110.0, 20.0, 110.0, 20.0, 110.0, 110.0] {
            net.create_bus(Bus::new(vn));
        }
        let mut res = NetResults::default();
        for (bus, vm) in [(7, 1.01), (3, 0.98), (5, 1.0)] {
            res.bus.insert(
                bus,
                BusResult {
                    vm_pu: vm,
                    ..Default::default()
                },
            );
        }
        net.res = Some(res);
        let rows = calc_xward_parameter(&net, &reduced()).unwrap();
        assert!((rows[0].x_ohm - (-1.0 / 0.2 * 110.0 * 110.0)).abs() < 1e-6);
        assert_eq!(rows[0].r_ohm, 0.0);
        assert_eq!(rows[0].vm_pu, 1.01);
        // Zero susceptance gives an unbounded reactance.
        assert!(rows[1].x_ohm.is_infinite());

        net.res.as_mut().unwrap().bus.remove(&3);
        assert_eq!(
            calc_xward_parameter(&net, &reduced()).unwrap_err(),
            EquivalentError::MissingPriorSolution { bus: 3 }
        );
    }

    #[test]
    fn bypass_threshold_is_inclusive() {
        let p = ImpedanceParameter {
            from_bus: 0,
            to_bus: 1,
            rft_pu: 1e-8,
            xft_pu: -1e-9,
            rtf_pu: 0.0,
            xtf_pu: 1e-8,
        };
        assert!(p.is_bypass(1e-8));
        assert!(!ImpedanceParameter { xft_pu: 2e-8, ..p }.is_bypass(1e-8));
    }
}
