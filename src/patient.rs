//! Patient record and maintenance dose suggestion
//!
//! Display-only helpers. The timers never depend on this; any missing input
//! simply means no suggestion.

use serde::{Deserialize, Serialize};

use crate::{
    catalog::AgentInfo,
    services::{store, KeyValueStore},
};

pub const PATIENT_KEY: &str = "patient_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub sex: Option<Sex>,
}

impl Patient {
    pub fn load(store: &dyn KeyValueStore) -> Option<Patient> {
        store::get_json(store, PATIENT_KEY, None)
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        store::set_json(store, PATIENT_KEY, self);
    }

    fn total_weight(&self) -> Option<f64> {
        self.weight_kg.filter(|w| w.is_finite() && *w > 0.0)
    }

    fn height(&self) -> Option<f64> {
        self.height_cm.filter(|h| h.is_finite() && *h > 0.0)
    }

    /// Devine ideal body weight
    pub fn ibw_kg(&self) -> Option<f64> {
        Some(ibw_kg(self.height()?, self.sex?))
    }

    /// Janmahasatian lean body weight
    pub fn lbw_kg(&self) -> Option<f64> {
        Some(lbw_kg(self.total_weight()?, self.height()?, self.sex?))
    }

    /// IBW capped at TBW when it can be computed, otherwise TBW
    pub fn dosing_weight_kg(&self) -> Option<f64> {
        let tbw = self.total_weight()?;
        Some(self.ibw_kg().map_or(tbw, |ibw| ibw.min(tbw)))
    }
}

pub fn ibw_kg(height_cm: f64, sex: Sex) -> f64 {
    let over_60_in = (height_cm / 2.54 - 60.0).max(0.0);
    let base = match sex {
        Sex::Male => 50.0,
        Sex::Female => 45.5,
    };
    base + 2.3 * over_60_in
}

pub fn lbw_kg(tbw_kg: f64, height_cm: f64, sex: Sex) -> f64 {
    let h_m = height_cm / 100.0;
    let bmi = tbw_kg / (h_m * h_m);
    if !bmi.is_finite() || bmi <= 0.0 {
        return tbw_kg;
    }
    match sex {
        Sex::Male => 9270.0 * tbw_kg / (6680.0 + 216.0 * bmi),
        Sex::Female => 9270.0 * tbw_kg / (8780.0 + 244.0 * bmi),
    }
}

/// Maintenance dose range for one agent and patient
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoseSuggestion {
    pub dosing_weight_kg: f64,
    /// Shown alongside the dosing weight when height and sex are known
    pub lean_body_weight_kg: Option<f64>,
    pub low_mg: f64,
    pub high_mg: f64,
    pub low_ml: f64,
    pub high_ml: f64,
    pub conc_mg_per_ml: f64,
}

pub fn maintenance_dose(agent: &AgentInfo, patient: Option<&Patient>) -> Option<DoseSuggestion> {
    let patient = patient?;
    let weight = patient.dosing_weight_kg()?;
    let (low, high) = agent.maint_dose_range_mg_per_kg;
    let low_mg = round2(low * weight);
    let high_mg = round2(high * weight);
    Some(DoseSuggestion {
        dosing_weight_kg: round2(weight),
        lean_body_weight_kg: patient.lbw_kg().map(round2),
        low_mg,
        high_mg,
        low_ml: round2(low_mg / agent.conc_mg_per_ml),
        high_ml: round2(high_mg / agent.conc_mg_per_ml),
        conc_mg_per_ml: agent.conc_mg_per_ml,
    })
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
