//! Linearisation of the external area: every injection becomes a constant admittance.

use std::collections::BTreeSet;

use num_complex::Complex64;
use tracing::{debug, info};

use crate::basic::{PowerFlowConfig, RunPF};
use crate::error::{EquivalentError, NetworkError};
use crate::network::*;

/// Replaces the wards and extended wards at `buses` by ordinary elements.
///
/// A ward becomes a load (`ps`/`qs`) and a shunt (`pz`/`qz`). An extended ward additionally
/// gets a scaffolding bus holding a voltage controlled generator behind an impedance, unless
/// its series impedance is unusable. Returns the scaffolding buses.
pub fn replace_wards_by_internal_elements(
    net: &mut Network,
    buses: &BTreeSet<i64>,
) -> Result<Vec<i64>, EquivalentError> {
    let wards: Vec<Ward> = net
        .ward
        .values()
        .filter(|w| w.in_service && buses.contains(&w.bus))
        .cloned()
        .collect();
    let xwards: Vec<XWard> = net
        .xward
        .values()
        .filter(|w| w.in_service && buses.contains(&w.bus))
        .cloned()
        .collect();
    net.drop_wards_at(buses);

    for w in &wards {
        add_load_and_shunt(net, w.bus, (w.ps_mw, w.qs_mvar), (w.pz_mw, w.qz_mvar))?;
    }

    let mut scaffolding = Vec::new();
    for xw in &xwards {
        add_load_and_shunt(net, xw.bus, (xw.ps_mw, xw.qs_mvar), (xw.pz_mw, xw.qz_mvar))?;
        let vn_kv = net
            .bus
            .get(&xw.bus)
            .map(|b| b.vn_kv)
            .ok_or(NetworkError::UnknownBus { element: "xward", bus: xw.bus })?;
        let zbase = vn_kv * vn_kv / net.sn_mva;
        let z = Complex64::new(xw.r_ohm, xw.x_ohm) / zbase;
        if !(z.re.is_finite() && z.im.is_finite()) || z.norm() == 0.0 {
            continue;
        }
        let aux = net.create_bus(Bus::new(vn_kv));
        net.create_gen(Gen::new(aux, 0.0, xw.vm_pu))?;
        net.create_impedance(Impedance {
            name: None,
            from_bus: xw.bus,
            to_bus: aux,
            rft_pu: z.re,
            xft_pu: z.im,
            rtf_pu: z.re,
            xtf_pu: z.im,
            sn_mva: net.sn_mva,
            in_service: true,
        })?;
        scaffolding.push(aux);
    }
    debug!(
        wards = wards.len(),
        xwards = xwards.len(),
        scaffolding = scaffolding.len(),
        "replaced existing equivalents"
    );
    Ok(scaffolding)
}

fn add_load_and_shunt(
    net: &mut Network,
    bus: i64,
    (ps, qs): (f64, f64),
    (pz, qz): (f64, f64),
) -> Result<(), EquivalentError> {
    net.create_load(Load::new(bus, ps, qs))?;
    if pz != 0.0 || qz != 0.0 {
        net.create_shunt_at_bus(bus, pz, qz, None)?;
    }
    Ok(())
}

/// Net complex power (load convention, MW/Mvar) drawn by the injections at `bus` that
/// passivation removes.
fn removed_injection(net: &Network, res: &NetResults, bus: i64) -> Complex64 {
    let c = |r: &PQResult| Complex64::new(r.p_mw, r.q_mvar);
    let mut s = Complex64::default();
    for (idx, _) in net.load.iter().filter(|(_, e)| e.bus == bus) {
        s += res.load.get(idx).map(c).unwrap_or_default();
    }
    for (idx, _) in net.storage.iter().filter(|(_, e)| e.bus == bus) {
        s += res.storage.get(idx).map(c).unwrap_or_default();
    }
    for (idx, _) in net.sgen.iter().filter(|(_, e)| e.bus == bus) {
        s -= res.sgen.get(idx).map(c).unwrap_or_default();
    }
    for (idx, _) in net.generator.iter().filter(|(_, e)| e.bus == bus) {
        s -= res.generator.get(idx).map(c).unwrap_or_default();
    }
    for (idx, _) in net.ext_grid.iter().filter(|(_, e)| e.bus == bus) {
        s -= res.ext_grid.get(idx).map(c).unwrap_or_default();
    }
    s
}

/// Turns the external area passive.
///
/// Existing wards are replaced first (and the network re-solved) so their scaffolding buses
/// join `external`. Then, for every external bus, the loads, static generators, generators,
/// storage units and ext grids are removed and a shunt `y = conj(S) / |V|^2` drawing the
/// same power at the solved voltage is created instead. The network is solved again before
/// returning. Returns the scaffolding buses.
pub fn create_passive_external_net<S: RunPF>(
    net: &mut Network,
    external: &BTreeSet<i64>,
    cfg: &PowerFlowConfig,
    solver: &mut S,
) -> Result<Vec<i64>, EquivalentError> {
    let has_wards = net.ward.values().any(|w| external.contains(&w.bus))
        || net.xward.values().any(|w| external.contains(&w.bus));
    let mut external = external.clone();
    let mut scaffolding = Vec::new();
    if has_wards {
        scaffolding = replace_wards_by_internal_elements(net, &external)?;
        external.extend(scaffolding.iter().copied());
        solver.run_pf(net, cfg)?;
    }

    let res = net.res.take().ok_or(EquivalentError::MissingSolverState)?;
    let sn = net.sn_mva;
    let mut shunts = 0usize;
    for &bus in &external {
        let Some(r) = res.bus.get(&bus) else {
            continue;
        };
        let s = removed_injection(net, &res, bus) / sn;
        let y = s.conj() / (r.vm_pu * r.vm_pu);
        if !(y.re.is_finite() && y.im.is_finite()) || y.norm() == 0.0 {
            continue;
        }
        net.create_shunt_at_bus(bus, y.re * sn, -y.im * sn, None)?;
        shunts += 1;
    }
    net.res = Some(res);
    net.drop_elements_at(&external);
    net.ext_grid.retain(|_, e| !external.contains(&e.bus));
    info!(buses = external.len(), shunts, "external area passivated");

    solver.run_pf(net, cfg)?;
    Ok(scaffolding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::NewtonPF;
    use crate::equivalent::power::calc_required_power;
    use crate::testcases::*;

    fn external_net(mut net: Network, internal: &[i64]) -> Network {
        let cfg = PowerFlowConfig::default();
        NewtonPF.run_pf(&mut net, &cfg).unwrap();
        net.drop_buses(&internal.iter().copied().collect());
        net
    }

    #[test]
    fn passive_area_keeps_boundary_voltages() {
        let cfg = PowerFlowConfig::default();
        let mut net = external_net(seven_bus(), &[5, 6]);
        calc_required_power(&mut net, &[0, 1], &cfg, &mut NewtonPF).unwrap();
        let before = net.res.clone().unwrap();
        let external = BTreeSet::from([2, 3, 4]);
        create_passive_external_net(&mut net, &external, &cfg, &mut NewtonPF).unwrap();

        for bus in &external {
            assert!(net.load.values().all(|e| e.bus != *bus));
            assert!(net.generator.values().all(|e| e.bus != *bus));
            assert!(net.sgen.values().all(|e| e.bus != *bus));
        }
        let after = net.res.as_ref().unwrap();
        for bus in 0..5 {
            let (a, b) = (&before.bus[&bus], &after.bus[&bus]);
            assert!((a.vm_pu - b.vm_pu).abs() < 1e-6, "bus {bus}");
            assert!((a.va_degree - b.va_degree).abs() < 1e-4, "bus {bus}");
        }
        for (idx, eg) in &before.ext_grid {
            assert!((eg.p_mw - after.ext_grid[idx].p_mw).abs() < 1e-4);
        }
    }

    #[test]
    fn shunts_draw_the_removed_injection_at_the_solved_voltage() {
        let cfg = PowerFlowConfig::default();
        let mut net = external_net(seven_bus(), &[5, 6]);
        calc_required_power(&mut net, &[0, 1], &cfg, &mut NewtonPF).unwrap();
        let snapshot = net.clone();
        let before = snapshot.res.as_ref().unwrap();
        let external = BTreeSet::from([2, 3, 4]);
        create_passive_external_net(&mut net, &external, &cfg, &mut NewtonPF).unwrap();

        let g = before.generator[&0];
        let expected = [
            (3, Complex64::new(-g.p_mw, -g.q_mvar)),
            (4, Complex64::new(15.0, 4.0)),
        ];
        let created: Vec<&Shunt> = net
            .shunt
            .iter()
            .filter(|(idx, _)| !snapshot.shunt.contains_key(idx))
            .map(|(_, sh)| sh)
            .collect();
        assert_eq!(created.len(), expected.len());
        for (bus, s) in expected {
            let sh = created.iter().find(|sh| sh.bus == bus).unwrap();
            let vm = before.bus[&bus].vm_pu;
            let drawn = Complex64::new(sh.p_mw, sh.q_mvar) * vm * vm;
            assert!((drawn - s).norm() < 1e-9, "bus {bus}: {drawn} vs {s}");
        }
    }

    #[test]
    fn wards_become_loads_shunts_and_scaffolding() {
        let mut net = five_bus();
        net.create_ward(Ward {
            name: None,
            bus: 2,
            ps_mw: 3.0,
            qs_mvar: 1.0,
            pz_mw: 0.5,
            qz_mvar: 0.2,
            in_service: true,
        })
        .unwrap();
        net.create_xward(XWard {
            name: None,
            bus: 4,
            ps_mw: 1.0,
            qs_mvar: 0.0,
            pz_mw: 0.0,
            qz_mvar: 0.0,
            r_ohm: 0.0,
            x_ohm: 60.5,
            vm_pu: 1.0,
            in_service: true,
        })
        .unwrap();
        let buses = BTreeSet::from([2, 4]);
        let scaffolding = replace_wards_by_internal_elements(&mut net, &buses).unwrap();
        assert_eq!(scaffolding, vec![5]);
        assert!(net.ward.is_empty() && net.xward.is_empty());
        assert_eq!(net.shunt.len(), 1);
        let g = net.generator.values().find(|g| g.bus == 5).unwrap();
        assert_eq!(g.p_mw, 0.0);
        let imp = net.impedance.values().next().unwrap();
        assert!((imp.xft_pu - 60.5 / 12100.0).abs() < 1e-15);
        assert_eq!(imp.xft_pu, imp.xtf_pu);
    }

    #[test]
    fn passivation_with_existing_xward_solves() {
        let cfg = PowerFlowConfig::default();
        let mut net = five_bus();
        net.create_xward(XWard {
            name: None,
            bus: 4,
            ps_mw: 2.0,
            qs_mvar: 0.5,
            pz_mw: 0.1,
            qz_mvar: 0.0,
            r_ohm: 0.0,
            x_ohm: 100.0,
            vm_pu: 1.01,
            in_service: true,
        })
        .unwrap();
        NewtonPF.run_pf(&mut net, &cfg).unwrap();
        calc_required_power(&mut net, &[0, 1], &cfg, &mut NewtonPF).unwrap();
        let before = net.res.clone().unwrap();
        let external = BTreeSet::from([2, 3, 4]);
        let scaffolding =
            create_passive_external_net(&mut net, &external, &cfg, &mut NewtonPF).unwrap();
        assert_eq!(scaffolding.len(), 1);
        assert!(net.generator.is_empty());
        let after = net.res.as_ref().unwrap();
        for bus in 0..5 {
            assert!((before.bus[&bus].vm_pu - after.bus[&bus].vm_pu).abs() < 1e-6);
        }
    }
}
