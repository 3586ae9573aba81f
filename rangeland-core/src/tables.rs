//! Parameter lookup tables.
//!
//! Site, plant functional type and animal tables are loaded once from CSV and
//! converted into strongly typed records keyed by a small positive integer.
//! A required column that is missing from a table is a configuration error
//! naming both the table and the column.

use crate::errors::{RangelandError, RangelandResult};
use crate::variable::{Element, MAX_SOIL_LAYERS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key column of the site parameter table.
pub const SITE_KEY: &str = "site";
/// Key column of the plant functional type table.
pub const PFT_KEY: &str = "PFT";
/// Key column of the animal trait table.
pub const ANIMAL_KEY: &str = "animal_id";

/// An untyped table as read from disk: integer key to column values.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    name: String,
    columns: Vec<String>,
    rows: BTreeMap<u32, BTreeMap<String, String>>,
}

impl RawTable {
    pub fn from_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<BTreeMap<String, String>>,
        key_column: &str,
    ) -> RangelandResult<Self> {
        let name = name.into();
        if !columns.iter().any(|c| c == key_column) {
            return Err(RangelandError::MissingColumn {
                table: name,
                column: key_column.to_string(),
            });
        }
        let mut keyed = BTreeMap::new();
        for row in rows {
            let raw_key = row.get(key_column).cloned().unwrap_or_default();
            let key = parse_key(&raw_key).ok_or_else(|| RangelandError::InvalidValue {
                table: name.clone(),
                column: key_column.to_string(),
                value: raw_key.clone(),
            })?;
            keyed.insert(key, row);
        }
        Ok(Self {
            name,
            columns,
            rows: keyed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.keys().copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fail with the first of `columns` that the table does not have.
    pub fn require_columns(&self, columns: &[&str]) -> RangelandResult<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(RangelandError::MissingColumn {
                table: self.name.clone(),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Numeric value of `column` in the row keyed by `key`.
    pub fn value(&self, key: u32, column: &str) -> RangelandResult<f64> {
        let row = self
            .rows
            .get(&key)
            .ok_or_else(|| RangelandError::MissingParameterKey {
                table: self.name.clone(),
                key,
            })?;
        let raw = row.get(column).ok_or_else(|| RangelandError::MissingColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })?;
        raw.parse::<f64>().map_err(|_| RangelandError::InvalidValue {
            table: self.name.clone(),
            column: column.to_string(),
            value: raw.clone(),
        })
    }
}

fn parse_key(raw: &str) -> Option<u32> {
    let value: f64 = raw.trim().parse().ok()?;
    if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// A typed record built from one table row.
pub trait ParameterRecord: Sized {
    const KEY_COLUMN: &'static str;
    const COLUMNS: &'static [&'static str];
    fn from_row(table: &RawTable, key: u32) -> RangelandResult<Self>;
}

/// Immutable mapping from integer key to typed parameter record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable<T> {
    name: String,
    rows: BTreeMap<u32, T>,
}

impl<T> ParameterTable<T> {
    pub fn from_records(name: impl Into<String>, records: impl IntoIterator<Item = (u32, T)>) -> Self {
        Self {
            name: name.into(),
            rows: records.into_iter().collect(),
        }
    }

    pub fn get(&self, key: u32) -> Option<&T> {
        self.rows.get(&key)
    }

    pub fn require(&self, key: u32) -> RangelandResult<&T> {
        self.rows
            .get(&key)
            .ok_or_else(|| RangelandError::MissingParameterKey {
                table: self.name.clone(),
                key,
            })
    }

    pub fn keys(&self) -> Vec<u32> {
        self.rows.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &T)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: ParameterRecord> ParameterTable<T> {
    /// Convert every row of a raw table into a typed record.
    pub fn from_raw(raw: &RawTable) -> RangelandResult<Self> {
        raw.require_columns(T::COLUMNS)?;
        let rows = raw
            .keys()
            .map(|key| T::from_row(raw, key).map(|record| (key, record)))
            .collect::<RangelandResult<BTreeMap<_, _>>>()?;
        Ok(Self {
            name: raw.name().to_string(),
            rows,
        })
    }
}

macro_rules! parameter_record {
    (
        $(#[$meta:meta])*
        $name:ident, key = $key:expr,
        { $($(#[$fmeta:meta])* $field:ident = $default:expr),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: f64),*
        }

        impl Default for $name {
            fn default() -> Self {
                Self { $($field: $default),* }
            }
        }

        impl ParameterRecord for $name {
            const KEY_COLUMN: &'static str = $key;
            const COLUMNS: &'static [&'static str] = &[$(stringify!($field)),*];

            fn from_row(table: &RawTable, key: u32) -> RangelandResult<Self> {
                Ok(Self { $($field: table.value(key, stringify!($field))?),* })
            }
        }
    };
}

parameter_record!(
    /// Site parameters, one row per site code.
    ///
    /// Defaults are typical of a semi-arid grassland and are used in tests.
    /// Element-indexed parameters carry the element code (1 = N, 2 = P) as
    /// their final suffix.
    SiteParameters, key = SITE_KEY,
    {
        /// Depth of the organic matter layer (m)
        edepth = 0.2,
        /// Number of soil layers with water and mineral pools
        nlayer = 5.0,
        adep_1 = 15.0, adep_2 = 15.0, adep_3 = 15.0, adep_4 = 15.0, adep_5 = 30.0,
        adep_6 = 30.0, adep_7 = 30.0, adep_8 = 30.0, adep_9 = 30.0,
        awtl_1 = 0.8, awtl_2 = 0.6, awtl_3 = 0.4, awtl_4 = 0.3, awtl_5 = 0.2,
        awtl_6 = 0.2, awtl_7 = 0.2, awtl_8 = 0.2, awtl_9 = 0.2,
        teff_1 = 15.4, teff_2 = 11.75, teff_3 = 29.7, teff_4 = 0.031,
        aneref_1 = 1.5, aneref_2 = 3.0, aneref_3 = 0.3,
        drain = 1.0,
        /// Liquid input threshold above which runoff occurs (cm)
        precro = 8.0,
        fracro = 0.15,
        fwloss_1 = 0.8, fwloss_2 = 0.8, fwloss_3 = 0.65, fwloss_4 = 0.9,
        tmelt_1 = -8.0, tmelt_2 = 0.002,
        peftxa = 0.25, peftxb = 0.75,
        p1co2a_2 = 0.17, p1co2b_2 = 0.68,
        ps1s3_1 = 0.003, ps1s3_2 = 0.032,
        ps2s3_1 = 0.003, ps2s3_2 = 0.009,
        omlech_1 = 0.03, omlech_2 = 0.12, omlech_3 = 1.9,
        /// Multiplier on the texture-dependent gaseous N loss fraction
        vlossg = 1.0,
        /// Drainage that produces full mineral leaching intensity (cm)
        minlch = 18.0,
        fleach_1 = 0.2, fleach_2 = 0.7, fleach_3 = 1.0, fleach_4 = 0.1,
        dec1_1 = 3.9, dec1_2 = 4.9,
        dec2_1 = 14.8, dec2_2 = 18.5,
        dec3_1 = 6.0, dec3_2 = 7.3,
        dec4 = 0.0045,
        dec5_1 = 3.5, dec5_2 = 0.2,
        pligst_1 = 3.0, pligst_2 = 3.0,
        strmax_1 = 5000.0, strmax_2 = 5000.0,
        rsplig = 0.3,
        ps1co2_1 = 0.45, ps1co2_2 = 0.55,
        pmco2_1 = 0.55, pmco2_2 = 0.55,
        p1co2_1 = 0.6,
        p2co2_1 = 0.55, p2co2_2 = 0.55,
        p3co2 = 0.55,
        animpt = 5.0,
        cmix = 0.5,
        pcemic1_1_1 = 16.0, pcemic1_2_1 = 10.0, pcemic1_3_1 = 0.02,
        pcemic1_1_2 = 200.0, pcemic1_2_2 = 150.0, pcemic1_3_2 = 0.0015,
        pcemic2_1_1 = 20.0, pcemic2_2_1 = 12.0, pcemic2_3_1 = 0.015,
        pcemic2_1_2 = 400.0, pcemic2_2_2 = 150.0, pcemic2_3_2 = 0.001,
        rad1p_1_1 = 12.0, rad1p_2_1 = 3.0, rad1p_3_1 = 5.0,
        rad1p_1_2 = 220.0, rad1p_2_2 = 5.0, rad1p_3_2 = 100.0,
        varat1_1_1 = 18.0, varat1_2_1 = 8.0, varat1_3_1 = 2.0,
        varat1_1_2 = 150.0, varat1_2_2 = 30.0, varat1_3_2 = 2.0,
        varat22_1_1 = 20.0, varat22_2_1 = 12.0, varat22_3_1 = 2.0,
        varat22_1_2 = 400.0, varat22_2_2 = 100.0, varat22_3_2 = 2.0,
        varat3_1_1 = 20.0, varat3_2_1 = 6.0, varat3_3_1 = 2.0,
        varat3_1_2 = 200.0, varat3_2_2 = 50.0, varat3_3_2 = 2.0,
        /// Atmospheric N deposition intercept (g N / m^2 / yr)
        epnfa_1 = 0.21,
        epnfa_2 = 0.0028,
        favail_1 = 0.5,
        favail_4 = 0.2, favail_5 = 0.5, favail_6 = 2.3,
        pslsrb = 1.0,
        sorpmx = 2.0,
        pparmn_2 = 0.0001,
        psecmn_2 = 0.0022,
        pmnsec_2 = 0.01,
        psecoc1 = 0.0001,
        psecoc2 = 0.0,
        rcestr_1 = 200.0, rcestr_2 = 500.0,
        spl_1 = 0.85, spl_2 = 0.013,
        deck5 = 5.0,
        gret_1 = 0.95, gret_2 = 0.95,
    }
);

impl SiteParameters {
    /// Number of active soil layers, clamped to the supported range.
    pub fn n_layers(&self) -> usize {
        (self.nlayer.round().max(1.0) as usize).min(MAX_SOIL_LAYERS)
    }

    /// Layer thicknesses (cm).
    pub fn adep(&self) -> [f64; MAX_SOIL_LAYERS] {
        [
            self.adep_1, self.adep_2, self.adep_3, self.adep_4, self.adep_5, self.adep_6,
            self.adep_7, self.adep_8, self.adep_9,
        ]
    }

    /// Transpiration weighting per layer.
    pub fn awtl(&self) -> [f64; MAX_SOIL_LAYERS] {
        [
            self.awtl_1, self.awtl_2, self.awtl_3, self.awtl_4, self.awtl_5, self.awtl_6,
            self.awtl_7, self.awtl_8, self.awtl_9,
        ]
    }

    pub fn teff(&self) -> [f64; 4] {
        [self.teff_1, self.teff_2, self.teff_3, self.teff_4]
    }

    pub fn aneref(&self) -> [f64; 3] {
        [self.aneref_1, self.aneref_2, self.aneref_3]
    }

    /// C:E ratio parameters for material entering surface SOM1.
    pub fn pcemic1(&self, e: Element) -> [f64; 3] {
        match e {
            Element::Nitrogen => [self.pcemic1_1_1, self.pcemic1_2_1, self.pcemic1_3_1],
            Element::Phosphorus => [self.pcemic1_1_2, self.pcemic1_2_2, self.pcemic1_3_2],
        }
    }

    /// C:E ratio parameters for surface SOM2 decomposing into surface SOM1.
    pub fn pcemic2(&self, e: Element) -> [f64; 3] {
        match e {
            Element::Nitrogen => [self.pcemic2_1_1, self.pcemic2_2_1, self.pcemic2_3_1],
            Element::Phosphorus => [self.pcemic2_1_2, self.pcemic2_2_2, self.pcemic2_3_2],
        }
    }

    pub fn rad1p(&self, e: Element) -> [f64; 3] {
        match e {
            Element::Nitrogen => [self.rad1p_1_1, self.rad1p_2_1, self.rad1p_3_1],
            Element::Phosphorus => [self.rad1p_1_2, self.rad1p_2_2, self.rad1p_3_2],
        }
    }

    /// Ratio limits for material entering soil SOM1.
    pub fn varat1(&self, e: Element) -> [f64; 3] {
        match e {
            Element::Nitrogen => [self.varat1_1_1, self.varat1_2_1, self.varat1_3_1],
            Element::Phosphorus => [self.varat1_1_2, self.varat1_2_2, self.varat1_3_2],
        }
    }

    /// Ratio limits for material entering soil SOM2.
    pub fn varat22(&self, e: Element) -> [f64; 3] {
        match e {
            Element::Nitrogen => [self.varat22_1_1, self.varat22_2_1, self.varat22_3_1],
            Element::Phosphorus => [self.varat22_1_2, self.varat22_2_2, self.varat22_3_2],
        }
    }

    /// Ratio limits for material entering SOM3.
    pub fn varat3(&self, e: Element) -> [f64; 3] {
        match e {
            Element::Nitrogen => [self.varat3_1_1, self.varat3_2_1, self.varat3_3_1],
            Element::Phosphorus => [self.varat3_1_2, self.varat3_2_2, self.varat3_3_2],
        }
    }

    /// C:E ratio of structural material.
    pub fn rcestr(&self, e: Element) -> f64 {
        match e {
            Element::Nitrogen => self.rcestr_1,
            Element::Phosphorus => self.rcestr_2,
        }
    }

    /// Fraction of grazed nutrient returned to the surface mineral pool.
    pub fn gret(&self, e: Element) -> f64 {
        match e {
            Element::Nitrogen => self.gret_1,
            Element::Phosphorus => self.gret_2,
        }
    }
}

parameter_record!(
    /// Plant functional type traits, one row per PFT.
    PftParameters, key = PFT_KEY,
    {
        /// Potential aboveground production per unit shortwave radiation
        prdx_1 = 0.4,
        ppdf_1 = 30.0, ppdf_2 = 45.0, ppdf_3 = 1.0, ppdf_4 = 2.5,
        pprpts_1 = 0.0, pprpts_2 = 1.0, pprpts_3 = 0.8,
        biok5 = 1800.0,
        pmxbio = 600.0,
        pmxtmp = -0.0035,
        pmntmp = 0.004,
        /// Root allocation regime: 0 for annual precipitation driven, 1 for stress driven
        frtcindx = 0.0,
        bgppa = 101.0, bgppb = 4.2, agppa = -12.0, agppb = 3.2,
        cfrtcw_1 = 0.4, cfrtcw_2 = 0.33,
        cfrtcn_1 = 0.76, cfrtcn_2 = 0.02,
        /// Grazing effect class 1..=6, 0 for no effect
        grzeff = 0.0,
        gremb = 0.02,
        /// Number of soil layers reached by roots
        nlaypg = 5.0,
        riint = 0.8,
        rictrl = 0.015,
        pramn_1_1 = 20.0, pramn_1_2 = 40.0, pramn_2_1 = 200.0, pramn_2_2 = 300.0,
        pramx_1_1 = 30.0, pramx_1_2 = 80.0, pramx_2_1 = 300.0, pramx_2_2 = 500.0,
        prbmn_1_1 = 45.0, prbmn_1_2 = 0.0, prbmn_2_1 = 390.0, prbmn_2_2 = 0.0,
        prbmx_1_1 = 60.0, prbmx_1_2 = 0.0, prbmx_2_1 = 420.0, prbmx_2_2 = 0.0,
        /// Aboveground biomass at which C:E ratios reach their second value (g / m^2)
        biomax = 400.0,
        snfxmx_1 = 0.0,
        fligni_1_1 = 0.02, fligni_2_1 = 0.0012,
        fligni_1_2 = 0.26, fligni_2_2 = -0.0015,
        fsdeth_1 = 0.2, fsdeth_2 = 0.3, fsdeth_3 = 0.2, fsdeth_4 = 150.0,
        fallrt = 0.15,
        rdr = 0.05,
        /// Calendar month of senescence, 0 for none
        senescence_month = 10.0,
    }
);

impl PftParameters {
    pub fn nlaypg(&self) -> usize {
        (self.nlaypg.round().max(1.0) as usize).min(MAX_SOIL_LAYERS)
    }

    /// Aboveground C:E ratio bounds at zero biomass and at `biomax`.
    pub fn pramn(&self, e: Element) -> [f64; 2] {
        match e {
            Element::Nitrogen => [self.pramn_1_1, self.pramn_1_2],
            Element::Phosphorus => [self.pramn_2_1, self.pramn_2_2],
        }
    }

    pub fn pramx(&self, e: Element) -> [f64; 2] {
        match e {
            Element::Nitrogen => [self.pramx_1_1, self.pramx_1_2],
            Element::Phosphorus => [self.pramx_2_1, self.pramx_2_2],
        }
    }

    /// Belowground C:E ratio as intercept and slope on annual precipitation.
    pub fn prbmn(&self, e: Element) -> [f64; 2] {
        match e {
            Element::Nitrogen => [self.prbmn_1_1, self.prbmn_1_2],
            Element::Phosphorus => [self.prbmn_2_1, self.prbmn_2_2],
        }
    }

    pub fn prbmx(&self, e: Element) -> [f64; 2] {
        match e {
            Element::Nitrogen => [self.prbmx_1_1, self.prbmx_1_2],
            Element::Phosphorus => [self.prbmx_2_1, self.prbmx_2_2],
        }
    }

    pub fn grazing_effect(&self) -> u8 {
        let code = self.grzeff.round();
        if (1.0..=6.0).contains(&code) {
            code as u8
        } else {
            0
        }
    }
}

parameter_record!(
    /// Grazing animal traits, one row per animal type.
    AnimalParameters, key = ANIMAL_KEY,
    {
        /// Daily dry matter intake per animal (kg)
        intake_kg_per_day = 8.0,
        /// Largest fraction of shoot biomass removed in one month
        max_removal = 0.5,
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .cloned()
                    .zip(r.iter().map(|v| v.to_string()))
                    .collect()
            })
            .collect();
        RawTable::from_rows("animals.csv", columns, rows, ANIMAL_KEY).unwrap()
    }

    #[test]
    fn builds_typed_records() {
        let table = raw(
            &["animal_id", "intake_kg_per_day", "max_removal", "label"],
            &[&["3", "9.5", "0.4", "steer"]],
        );
        let typed = ParameterTable::<AnimalParameters>::from_raw(&table).unwrap();
        assert_eq!(typed.require(3).unwrap().intake_kg_per_day, 9.5);
        assert!(matches!(
            typed.require(4),
            Err(RangelandError::MissingParameterKey { key: 4, .. })
        ));
    }

    #[test]
    fn missing_column_names_table_and_column() {
        let table = raw(&["animal_id", "intake_kg_per_day"], &[&["1", "9.5"]]);
        match ParameterTable::<AnimalParameters>::from_raw(&table) {
            Err(RangelandError::MissingColumn { table, column }) => {
                assert_eq!(table, "animals.csv");
                assert_eq!(column, "max_removal");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_numeric_value_is_reported() {
        let table = raw(
            &["animal_id", "intake_kg_per_day", "max_removal"],
            &[&["1", "lots", "0.4"]],
        );
        assert!(matches!(
            ParameterTable::<AnimalParameters>::from_raw(&table),
            Err(RangelandError::InvalidValue { .. })
        ));
    }

    #[test]
    fn columns_match_struct_fields() {
        assert!(SiteParameters::COLUMNS.contains(&"varat22_3_2"));
        assert!(PftParameters::COLUMNS.contains(&"senescence_month"));
        let site = SiteParameters::default();
        assert_eq!(site.n_layers(), 5);
        assert_eq!(site.varat1(Element::Phosphorus), [150.0, 30.0, 2.0]);
        assert_eq!(PftParameters::default().grazing_effect(), 0);
    }
}
