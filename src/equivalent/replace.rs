//! Replacement of the external area by the equivalent elements.

use std::collections::BTreeSet;

use tracing::info;

use super::params::{BoundaryParameters, EquivalentParameters, WardParameter};
use crate::basic::{PowerFlowConfig, RunPF};
use crate::error::EquivalentError;
use crate::network::*;

pub(crate) const EQ_IMPEDANCE: &str = "eq_impedance";
pub(crate) const EQ_SWITCH: &str = "eq_switch";
pub(crate) const NETWORK_EQUIVALENT: &str = "network_equivalent";

/// Indices of the elements created by [`replace_external_area`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedElements {
    pub impedance: Vec<i64>,
    pub switch: Vec<i64>,
    pub ward: Vec<i64>,
    pub xward: Vec<i64>,
}

fn ward_power(w: &WardParameter, sn_mva: f64) -> (f64, f64) {
    (w.shunt.re * sn_mva, -w.shunt.im * sn_mva)
}

/// Removes the external buses and the boundary-boundary branches, shunts and (x)wards of
/// `net`, then creates the equivalent impedances (or bypass switches) and boundary
/// elements from `params`, with zero power setpoints, and solves the result.
///
/// `boundary` must include the buses fused to a boundary bus by closed bus-bus switches.
pub fn replace_external_area<S: RunPF>(
    net: &mut Network,
    boundary: &BTreeSet<i64>,
    external: &BTreeSet<i64>,
    params: &EquivalentParameters,
    bypass_tol: f64,
    cfg: &PowerFlowConfig,
    solver: &mut S,
) -> Result<CreatedElements, EquivalentError> {
    net.drop_buses(external);
    net.drop_internal_branch_elements(boundary);
    net.drop_shunts_at(boundary);
    net.drop_wards_at(boundary);

    let sn = net.sn_mva;
    let mut created = CreatedElements::default();
    for row in &params.impedance {
        if row.is_bypass(bypass_tol) {
            let mut sw = Switch::bus_bus(row.from_bus, row.to_bus);
            sw.name = Some(EQ_SWITCH.to_owned());
            created.switch.push(net.create_switch(sw)?);
        } else {
            created.impedance.push(net.create_impedance(Impedance {
                name: Some(EQ_IMPEDANCE.to_owned()),
                from_bus: row.from_bus,
                to_bus: row.to_bus,
                rft_pu: row.rft_pu,
                xft_pu: row.xft_pu,
                rtf_pu: row.rtf_pu,
                xtf_pu: row.xtf_pu,
                sn_mva: sn,
                in_service: true,
            })?);
        }
    }

    match &params.boundary {
        BoundaryParameters::Ward(rows) => {
            for w in rows {
                let (pz_mw, qz_mvar) = ward_power(w, sn);
                created.ward.push(net.create_ward(Ward {
                    name: Some(NETWORK_EQUIVALENT.to_owned()),
                    bus: w.bus,
                    ps_mw: 0.0,
                    qs_mvar: 0.0,
                    pz_mw,
                    qz_mvar,
                    in_service: true,
                })?);
            }
        }
        BoundaryParameters::XWard(rows) => {
            for x in rows {
                created.xward.push(net.create_xward(XWard {
                    name: Some(NETWORK_EQUIVALENT.to_owned()),
                    bus: x.ward.bus,
                    ps_mw: 0.0,
                    qs_mvar: 0.0,
                    pz_mw: x.ward.shunt.re * sn,
                    qz_mvar: 0.0,
                    r_ohm: x.r_ohm,
                    x_ohm: x.x_ohm,
                    vm_pu: x.vm_pu,
                    in_service: true,
                })?);
            }
        }
    }
    info!(
        impedances = created.impedance.len(),
        switches = created.switch.len(),
        wards = created.ward.len(),
        xwards = created.xward.len(),
        "external area replaced"
    );

    solver.run_pf(net, cfg)?;
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::NewtonPF;
    use crate::equivalent::params::ImpedanceParameter;
    use crate::testcases::five_bus;
    use num_complex::Complex64;

    fn params(impedance: Vec<ImpedanceParameter>) -> EquivalentParameters {
        EquivalentParameters {
            boundary: BoundaryParameters::Ward(vec![
                WardParameter {
                    bus: 0,
                    shunt: Complex64::new(0.001, 0.02),
                    power: Complex64::default(),
                },
                WardParameter {
                    bus: 1,
                    shunt: Complex64::new(0.0, 0.01),
                    power: Complex64::default(),
                },
            ]),
            impedance,
        }
    }

    fn row(z: f64) -> ImpedanceParameter {
        ImpedanceParameter {
            from_bus: 0,
            to_bus: 1,
            rft_pu: z,
            xft_pu: z,
            rtf_pu: z,
            xtf_pu: z,
        }
    }

    #[test]
    fn external_area_is_replaced_by_equivalent_elements() {
        let mut net = five_bus();
        let created = replace_external_area(
            &mut net,
            &BTreeSet::from([0, 1]),
            &BTreeSet::from([2, 3, 4]),
            &params(vec![row(0.001)]),
            1e-8,
            &PowerFlowConfig::default(),
            &mut NewtonPF,
        )
        .unwrap();
        assert_eq!(net.bus.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        // The boundary line 0-1 is part of the equivalent impedance now.
        assert!(net.line.is_empty());
        assert_eq!(created.impedance.len(), 1);
        assert!(created.switch.is_empty());
        let imp = &net.impedance[&created.impedance[0]];
        assert_eq!(imp.name.as_deref(), Some(EQ_IMPEDANCE));

        let w0 = &net.ward[&created.ward[0]];
        assert_eq!((w0.bus, w0.ps_mw, w0.qs_mvar), (0, 0.0, 0.0));
        assert!((w0.pz_mw - 0.001).abs() < 1e-15 && (w0.qz_mvar + 0.02).abs() < 1e-15);
        assert!(net.res.as_ref().unwrap().impedance.contains_key(&created.impedance[0]));
    }

    #[test]
    fn negligible_impedance_becomes_a_bypass_switch() {
        let mut net = five_bus();
        let created = replace_external_area(
            &mut net,
            &BTreeSet::from([0, 1]),
            &BTreeSet::from([2, 3, 4]),
            &params(vec![row(1e-9)]),
            1e-8,
            &PowerFlowConfig::default(),
            &mut NewtonPF,
        )
        .unwrap();
        assert!(created.impedance.is_empty());
        let sw = &net.switch[&created.switch[0]];
        assert!(sw.closed && sw.z_ohm == 0.0);
        assert_eq!((sw.bus, sw.other_bus()), (0, Some(1)));
        let int = net.internal.as_ref().unwrap();
        assert_eq!(int.bus_lookup[&0], int.bus_lookup[&1]);
    }
}
