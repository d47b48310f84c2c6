//! Small reference networks used by the tests and the documentation examples.
//!
//! All lines use the same 110 kV overhead line type (0.1 + j0.4 ohm/km, 10 nF/km).

use crate::network::*;

const R_OHM_PER_KM: f64 = 0.1;
const X_OHM_PER_KM: f64 = 0.4;
const C_NF_PER_KM: f64 = 10.0;

fn hv_line(net: &mut Network, from: i64, to: i64, length_km: f64) {
    let line = Line::new(from, to, length_km, R_OHM_PER_KM, X_OHM_PER_KM)
        .with_capacitance(C_NF_PER_KM);
    net.create_line(line).expect("test network buses exist");
}

fn buses(net: &mut Network, n: usize, vn_kv: f64) {
    for _ in 0..n {
        net.create_bus(Bus::new(vn_kv));
    }
}

/// Five buses: boundary buses 0 (ext grid) and 1 (load), external buses 2, 3 (generator)
/// and 4 (load).
pub fn five_bus() -> Network {
    let mut net = Network::new(50.0, 1.0);
    net.name = Some("five bus".to_owned());
    buses(&mut net, 5, 110.0);
    net.create_ext_grid(ExtGrid::new(0, 1.02, 0.0)).expect("bus 0");
    net.create_load(Load::new(1, 20.0, 5.0)).expect("bus 1");
    net.create_gen(Gen::new(3, 30.0, 1.01)).expect("bus 3");
    net.create_load(Load::new(4, 40.0, 10.0)).expect("bus 4");
    hv_line(&mut net, 0, 1, 15.0);
    hv_line(&mut net, 0, 2, 20.0);
    hv_line(&mut net, 1, 2, 10.0);
    hv_line(&mut net, 2, 3, 25.0);
    hv_line(&mut net, 3, 4, 12.0);
    hv_line(&mut net, 1, 4, 30.0);
    net
}

/// Seven buses: internal buses 5 (ext grid) and 6, boundary buses 0 and 1, external buses
/// 2 (shunt), 3 (generator) and 4 (20 kV, load behind a transformer).
pub fn seven_bus() -> Network {
    let mut net = Network::new(50.0, 1.0);
    net.name = Some("seven bus".to_owned());
    buses(&mut net, 4, 110.0);
    net.create_bus(Bus::new(20.0));
    buses(&mut net, 2, 110.0);
    net.create_ext_grid(ExtGrid::new(5, 1.03, 0.0)).expect("bus 5");
    net.create_load(Load::new(6, 25.0, 8.0)).expect("bus 6");
    net.create_sgen(SGen::new(6, 5.0, 0.0)).expect("bus 6");
    net.create_load(Load::new(1, 10.0, 3.0)).expect("bus 1");
    net.create_gen(Gen::new(3, 20.0, 1.02)).expect("bus 3");
    net.create_load(Load::new(4, 15.0, 4.0)).expect("bus 4");
    net.create_shunt_at_bus(2, 0.0, -5.0, None).expect("bus 2");
    hv_line(&mut net, 5, 6, 10.0);
    hv_line(&mut net, 5, 0, 20.0);
    hv_line(&mut net, 6, 1, 15.0);
    hv_line(&mut net, 0, 1, 25.0);
    hv_line(&mut net, 0, 2, 18.0);
    hv_line(&mut net, 1, 3, 22.0);
    hv_line(&mut net, 2, 3, 14.0);
    net.create_transformer(Transformer {
        name: None,
        hv_bus: 2,
        lv_bus: 4,
        sn_mva: 40.0,
        vn_hv_kv: 110.0,
        vn_lv_kv: 20.0,
        vk_percent: 12.0,
        vkr_percent: 0.4,
        pfe_kw: 20.0,
        i0_percent: 0.06,
        shift_degree: 0.0,
        tap_side: Some("hv".to_owned()),
        tap_neutral: Some(0.0),
        tap_pos: Some(-1.0),
        tap_step_percent: Some(1.5),
        parallel: 1,
        in_service: true,
    })
    .expect("buses 2 and 4");
    net
}

/// Internal bus 0 (ext grid) feeding boundary buses 1 and 2; each boundary bus supplies its
/// own radial external feeder (buses 3 and 4) with no external path between them.
pub fn radial_feeders() -> Network {
    let mut net = Network::new(50.0, 1.0);
    net.name = Some("radial feeders".to_owned());
    buses(&mut net, 5, 110.0);
    net.create_ext_grid(ExtGrid::new(0, 1.0, 0.0)).expect("bus 0");
    net.create_load(Load::new(3, 12.0, 3.0)).expect("bus 3");
    net.create_load(Load::new(4, 8.0, 2.0)).expect("bus 4");
    hv_line(&mut net, 0, 1, 10.0);
    hv_line(&mut net, 0, 2, 10.0);
    hv_line(&mut net, 1, 3, 15.0);
    hv_line(&mut net, 2, 4, 20.0);
    net
}
