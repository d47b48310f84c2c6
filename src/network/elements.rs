use serde::{Deserialize, Serialize};

fn yes() -> bool {
    true
}
fn one() -> f64 {
    1.0
}
fn one_i32() -> i32 {
    1
}

/// Represents a bus in the network.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Bus {
    pub name: Option<String>,
    pub vn_kv: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub zone: Option<i64>,
}

impl Bus {
    pub fn new(vn_kv: f64) -> Self {
        Self {
            name: None,
            vn_kv,
            in_service: true,
            type_: Some("b".to_owned()),
            zone: None,
        }
    }
}

/// Represents a generator in the network.
///
/// A generator regulates the voltage magnitude of its bus (PV bus) unless `slack` is set,
/// in which case it becomes a reference source at angle zero.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Gen {
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    pub vm_pu: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default)]
    pub slack: bool,
    #[serde(default = "yes")]
    pub in_service: bool,
}

impl Gen {
    pub fn new(bus: i64, p_mw: f64, vm_pu: f64) -> Self {
        Self {
            name: None,
            bus,
            p_mw,
            vm_pu,
            scaling: 1.0,
            slack: false,
            in_service: true,
        }
    }
}

/// Represents a constant power load in the network.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Load {
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

impl Load {
    pub fn new(bus: i64, p_mw: f64, q_mvar: f64) -> Self {
        Self {
            name: None,
            bus,
            p_mw,
            q_mvar,
            scaling: 1.0,
            in_service: true,
        }
    }
}

/// Represents a static generator (constant power infeed).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SGen {
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

impl SGen {
    pub fn new(bus: i64, p_mw: f64, q_mvar: f64) -> Self {
        Self {
            name: None,
            bus,
            p_mw,
            q_mvar,
            scaling: 1.0,
            in_service: true,
        }
    }
}

/// Represents a storage unit. Positive `p_mw` means charging (load convention).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Storage {
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

impl Storage {
    pub fn new(bus: i64, p_mw: f64, q_mvar: f64) -> Self {
        Self {
            name: None,
            bus,
            p_mw,
            q_mvar,
            scaling: 1.0,
            in_service: true,
        }
    }
}

/// Represents a line in the network.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Line {
    pub name: Option<String>,
    pub from_bus: i64,
    pub to_bus: i64,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    #[serde(default)]
    pub c_nf_per_km: f64,
    #[serde(default)]
    pub g_us_per_km: f64,
    #[serde(default)]
    pub max_i_ka: f64,
    #[serde(default = "one_i32")]
    pub parallel: i32,
    #[serde(default = "yes")]
    pub in_service: bool,
}

impl Line {
    pub fn new(
        from_bus: i64,
        to_bus: i64,
        length_km: f64,
        r_ohm_per_km: f64,
        x_ohm_per_km: f64,
    ) -> Self {
        Self {
            name: None,
            from_bus,
            to_bus,
            length_km,
            r_ohm_per_km,
            x_ohm_per_km,
            c_nf_per_km: 0.0,
            g_us_per_km: 0.0,
            max_i_ka: 1.0,
            parallel: 1,
            in_service: true,
        }
    }

    pub fn with_capacitance(mut self, c_nf_per_km: f64) -> Self {
        self.c_nf_per_km = c_nf_per_km;
        self
    }
}

/// Represents a two-winding transformer in the network.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Transformer {
    pub name: Option<String>,
    pub hv_bus: i64,
    pub lv_bus: i64,
    pub sn_mva: f64,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vk_percent: f64,
    pub vkr_percent: f64,
    #[serde(default)]
    pub pfe_kw: f64,
    #[serde(default)]
    pub i0_percent: f64,
    #[serde(default)]
    pub shift_degree: f64,
    pub tap_side: Option<String>,
    pub tap_neutral: Option<f64>,
    pub tap_pos: Option<f64>,
    pub tap_step_percent: Option<f64>,
    #[serde(default = "one_i32")]
    pub parallel: i32,
    #[serde(default = "yes")]
    pub in_service: bool,
}

/// Represents an external grid (voltage reference with free power exchange).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExtGrid {
    pub name: Option<String>,
    pub bus: i64,
    pub vm_pu: f64,
    #[serde(default)]
    pub va_degree: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

impl ExtGrid {
    pub fn new(bus: i64, vm_pu: f64, va_degree: f64) -> Self {
        Self {
            name: None,
            bus,
            vm_pu,
            va_degree,
            in_service: true,
        }
    }
}

/// Represents a shunt in the network. `p_mw`/`q_mvar` are drawn at `vn_kv` per step.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Shunt {
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
    pub vn_kv: f64,
    #[serde(default = "one_i32")]
    pub step: i32,
    #[serde(default = "yes")]
    pub in_service: bool,
}

/// Represents a per-unit impedance branch with independent forward and reverse values.
///
/// The per-unit values refer to `sn_mva` and the rated voltage of the connected buses.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Impedance {
    pub name: Option<String>,
    pub from_bus: i64,
    pub to_bus: i64,
    pub rft_pu: f64,
    pub xft_pu: f64,
    pub rtf_pu: f64,
    pub xtf_pu: f64,
    pub sn_mva: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum SwitchType {
    #[serde(rename = "l")]
    SwitchBusLine,
    #[serde(rename = "t")]
    SwitchBusTransformer,
    #[serde(rename = "b")]
    #[default]
    SwitchTwoBuses,
}

impl From<&str> for SwitchType {
    fn from(s: &str) -> SwitchType {
        match s {
            "l" => SwitchType::SwitchBusLine,
            "t" => SwitchType::SwitchBusTransformer,
            _ => SwitchType::SwitchTwoBuses,
        }
    }
}

/// Represents a switch in the network.
///
/// For `SwitchTwoBuses` the `element` is the second bus; otherwise it is the index of the
/// line or transformer the switch sits on.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Switch {
    pub name: Option<String>,
    pub bus: i64,
    pub element: i64,
    pub et: SwitchType,
    pub closed: bool,
    #[serde(default)]
    pub z_ohm: f64,
}

impl Switch {
    /// A closed zero-impedance bus-bus switch.
    pub fn bus_bus(bus: i64, other: i64) -> Self {
        Self {
            name: None,
            bus,
            element: other,
            et: SwitchType::SwitchTwoBuses,
            closed: true,
            z_ohm: 0.0,
        }
    }

    /// The second bus for bus-bus switches.
    pub fn other_bus(&self) -> Option<i64> {
        (self.et == SwitchType::SwitchTwoBuses).then_some(self.element)
    }

    /// Whether the switch merges its two buses into one node.
    pub fn fuses(&self) -> bool {
        self.et == SwitchType::SwitchTwoBuses && self.closed && self.z_ohm == 0.0
    }
}

/// Ward equivalent: constant power `ps/qs` plus constant impedance `pz/qz` (given at 1 pu).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Ward {
    pub name: Option<String>,
    pub bus: i64,
    pub ps_mw: f64,
    pub qs_mvar: f64,
    pub pz_mw: f64,
    pub qz_mvar: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

/// Extended ward: a [`Ward`] plus a voltage source `vm_pu` behind `r_ohm + j x_ohm`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct XWard {
    pub name: Option<String>,
    pub bus: i64,
    pub ps_mw: f64,
    pub qs_mvar: f64,
    pub pz_mw: f64,
    pub qz_mvar: f64,
    pub r_ohm: f64,
    pub x_ohm: f64,
    pub vm_pu: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

/// Elements attached to a single bus.
pub trait BusElement {
    const KIND: &'static str;
    fn bus(&self) -> i64;
}

/// Elements connecting two buses.
pub trait BranchElement {
    const KIND: &'static str;
    fn from_bus(&self) -> i64;
    fn to_bus(&self) -> i64;
}

macro_rules! bus_element {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl BusElement for $ty {
                const KIND: &'static str = $kind;
                fn bus(&self) -> i64 {
                    self.bus
                }
            }
        )*
    };
}

bus_element!(
    Gen => "gen",
    Load => "load",
    SGen => "sgen",
    Storage => "storage",
    ExtGrid => "ext_grid",
    Shunt => "shunt",
    Ward => "ward",
    XWard => "xward",
);

impl BranchElement for Line {
    const KIND: &'static str = "line";
    fn from_bus(&self) -> i64 {
        self.from_bus
    }
    fn to_bus(&self) -> i64 {
        self.to_bus
    }
}

impl BranchElement for Transformer {
    const KIND: &'static str = "trafo";
    fn from_bus(&self) -> i64 {
        self.hv_bus
    }
    fn to_bus(&self) -> i64 {
        self.lv_bus
    }
}

impl BranchElement for Impedance {
    const KIND: &'static str = "impedance";
    fn from_bus(&self) -> i64 {
        self.from_bus
    }
    fn to_bus(&self) -> i64 {
        self.to_bus
    }
}
