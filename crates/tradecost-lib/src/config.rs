//! Immutable model configuration: rate tables, border costs, tariffs and
//! named scalar parameters.
//!
//! Everything here is loaded once at startup and passed explicitly to the
//! components that need it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::graph::{QualityClass, RegionId};
use crate::matching::TieBreak;
use crate::table::{csv_reader, ColumnMap};

pub const TRANSPORT_COSTS_FILE: &str = "transport_costs.csv";
pub const TRANSPORT_SPEEDS_FILE: &str = "transport_speeds.csv";
pub const BORDER_COSTS_FILE: &str = "border_costs.csv";
pub const TARIFFS_FILE: &str = "tariffs.csv";
pub const COST_PARAMETERS_FILE: &str = "other_cost_parameters.csv";
pub const MARKET_ACCESS_PARAMETERS_FILE: &str = "market_access_parameters.csv";

/// Default search radius for settlement matching, in coordinate units.
pub const DEFAULT_MATCH_RADIUS: f64 = 0.05;
/// Default distance a port may be from its matched nodes.
pub const DEFAULT_PORT_TOLERANCE: f64 = 0.05;
/// Default distance a border point may be from its road nodes.
pub const DEFAULT_BORDER_TOLERANCE: f64 = 1e-6;

/// Unit system of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostMode {
    /// Monetary freight costs, normalized ad valorem with tariffs.
    #[default]
    Freight,
    /// Travel time in hours; no tariffs.
    Time,
}

impl fmt::Display for CostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            CostMode::Freight => "freight",
            CostMode::Time => "time",
        };
        f.write_str(value)
    }
}

impl FromStr for CostMode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "freight" | "cost" => Ok(CostMode::Freight),
            "time" => Ok(CostMode::Time),
            other => Err(format!("unknown cost mode '{other}'")),
        }
    }
}

/// Per-kilometer traversal rate for each quality class.
///
/// In freight mode the rate is currency per km; in time mode it is hours per
/// km, derived by inverting a km-per-hour table.
#[derive(Debug, Clone, Default)]
pub struct TransportRates {
    per_km: HashMap<String, f64>,
}

impl TransportRates {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            per_km: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Read a `class,cost_per_km` table.
    pub fn from_costs_reader<R: Read>(reader: R) -> Result<Self> {
        let pairs =
            read_class_table(reader, TRANSPORT_COSTS_FILE, "cost_per_km", &["cost_per_km"])?;
        Ok(Self::from_pairs(pairs))
    }

    /// Read a `class,km_per_hour` table and convert it to hours per km.
    pub fn from_speeds_reader<R: Read>(reader: R) -> Result<Self> {
        let pairs = read_class_table(
            reader,
            TRANSPORT_SPEEDS_FILE,
            "km_per_hour",
            &["km_per_hour", "speed", "kmh"],
        )?;
        Ok(Self::from_pairs(
            pairs.into_iter().map(|(class, speed)| (class, 1.0 / speed)),
        ))
    }

    /// Rate for a quality class; unknown classes are an error.
    pub fn rate(&self, class: &QualityClass) -> Result<f64> {
        let label = class.label();
        self.per_km
            .get(&label)
            .copied()
            .ok_or(Error::UnknownQualityClass { class: label })
    }

    pub fn len(&self) -> usize {
        self.per_km.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_km.is_empty()
    }
}

fn read_class_table<R: Read>(
    reader: R,
    table: &str,
    value_column: &'static str,
    value_synonyms: &[&str],
) -> Result<Vec<(String, f64)>> {
    let mut csv = csv_reader(reader);
    let headers = csv.headers()?.clone();
    let columns = ColumnMap::resolve(
        table,
        &headers,
        &[
            ("class", &["class", "quality", "code"]),
            (value_column, value_synonyms),
        ],
    );
    columns.require(&["class", value_column])?;

    let mut rows = Vec::new();
    for (offset, record) in csv.records().enumerate() {
        let record = record?;
        let row = offset as u64 + 2;
        let class = columns.get_str(&record, "class", row)?;
        let value = columns.get_f64(&record, value_column, row)?;
        rows.push((class, value));
    }
    Ok(rows)
}

/// Border crossing cost for each exporting region, optionally refined per
/// destination region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderCost {
    pub fee: f64,
    pub time: f64,
}

impl BorderCost {
    pub fn for_mode(&self, mode: CostMode) -> f64 {
        match mode {
            CostMode::Freight => self.fee,
            CostMode::Time => self.time,
        }
    }
}

/// Asymmetric border cost table.
#[derive(Debug, Clone, Default)]
pub struct BorderCosts {
    exporter: HashMap<RegionId, BorderCost>,
    pairs: HashMap<(RegionId, RegionId), BorderCost>,
}

impl BorderCosts {
    /// Set the default cost paid when leaving `region` towards any other region.
    pub fn insert_exporter(&mut self, region: impl Into<RegionId>, cost: BorderCost) {
        self.exporter.insert(region.into(), cost);
    }

    /// Set the cost for crossing from `from` into `to` specifically.
    pub fn insert_pair(
        &mut self,
        from: impl Into<RegionId>,
        to: impl Into<RegionId>,
        cost: BorderCost,
    ) {
        self.pairs.insert((from.into(), to.into()), cost);
    }

    /// Read `iso3,border_fee_export,border_time_export[,dest_iso3]`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv_reader(reader);
        let headers = csv.headers()?.clone();
        let columns = ColumnMap::resolve(
            BORDER_COSTS_FILE,
            &headers,
            &[
                ("iso3", &["iso3", "region", "from_iso3", "origin"]),
                ("dest_iso3", &["dest_iso3", "to_iso3", "destination"]),
                ("fee", &["border_fee_export", "fee", "border_fee"]),
                ("time", &["border_time_export", "time", "border_time"]),
            ],
        );
        columns.require(&["iso3", "fee", "time"])?;

        let mut table = Self::default();
        for (offset, record) in csv.records().enumerate() {
            let record = record?;
            let row = offset as u64 + 2;
            let from = columns.get_str(&record, "iso3", row)?;
            let cost = BorderCost {
                fee: columns.get_f64(&record, "fee", row)?,
                time: columns.get_f64(&record, "time", row)?,
            };
            match columns.get(&record, "dest_iso3") {
                Some(to) => table.insert_pair(from, to, cost),
                None => table.insert_exporter(from, cost),
            }
        }
        Ok(table)
    }

    /// Cost of crossing from `from` into `to`.
    pub fn lookup(&self, from: &RegionId, to: &RegionId, mode: CostMode) -> Result<f64> {
        self.pairs
            .get(&(from.clone(), to.clone()))
            .or_else(|| self.exporter.get(from))
            .map(|cost| cost.for_mode(mode))
            .ok_or_else(|| Error::UnknownBorderRegion {
                from: from.to_string(),
                to: to.to_string(),
            })
    }
}

/// Ad-valorem import tariff by destination region.
#[derive(Debug, Clone, Default)]
pub struct Tariffs {
    rates: HashMap<RegionId, f64>,
}

impl Tariffs {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<RegionId>,
    {
        Self {
            rates: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Read an `iso3,tariff` table.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv_reader(reader);
        let headers = csv.headers()?.clone();
        let columns = ColumnMap::resolve(
            TARIFFS_FILE,
            &headers,
            &[
                ("iso3", &["iso3", "region"]),
                ("tariff", &["tariff", "rate"]),
            ],
        );
        columns.require(&["iso3", "tariff"])?;

        let mut rates = HashMap::new();
        for (offset, record) in csv.records().enumerate() {
            let record = record?;
            let row = offset as u64 + 2;
            let region = columns.get_str(&record, "iso3", row)?;
            rates.insert(RegionId::new(region), columns.get_f64(&record, "tariff", row)?);
        }
        Ok(Self { rates })
    }

    pub fn rate(&self, region: &RegionId) -> Result<f64> {
        self.rates
            .get(region)
            .copied()
            .ok_or_else(|| Error::UnknownTariffRegion {
                region: region.to_string(),
            })
    }
}

/// Named scalar parameters from a `parameter,value` table.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    values: BTreeMap<String, f64>,
}

impl Parameters {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn from_reader<R: Read>(reader: R, table: &str) -> Result<Self> {
        let mut csv = csv_reader(reader);
        let headers = csv.headers()?.clone();
        let columns = ColumnMap::resolve(
            table,
            &headers,
            &[("parameter", &["parameter", "name"]), ("value", &["value"])],
        );
        columns.require(&["parameter", "value"])?;

        let mut values = BTreeMap::new();
        for (offset, record) in csv.records().enumerate() {
            let record = record?;
            let row = offset as u64 + 2;
            let name = columns.get_str(&record, "parameter", row)?;
            values.insert(name, columns.get_f64(&record, "value", row)?);
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingParameter {
                name: name.to_string(),
            })
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.values.get(name).copied().unwrap_or(default)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }
}

/// Everything the cost-matrix pipeline reads from parameter tables.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub mode: CostMode,
    pub rates: TransportRates,
    pub border_costs: BorderCosts,
    pub tariffs: Tariffs,
    /// Divisor turning raw freight cost into an ad-valorem share.
    pub shipment_value: f64,
    /// Port fee (freight) or port wait time (time) for each transfer edge.
    pub port_cost: f64,
    pub match_radius: f64,
    pub port_tolerance: f64,
    pub border_tolerance: f64,
    pub tie_break: TieBreak,
}

impl ModelConfig {
    /// Resolve mode-dependent scalars from a parameter table.
    pub fn from_parts(
        mode: CostMode,
        rates: TransportRates,
        border_costs: BorderCosts,
        tariffs: Tariffs,
        params: &Parameters,
    ) -> Result<Self> {
        let (shipment_value, port_cost) = match mode {
            CostMode::Freight => (params.get("shipment_value")?, params.get("port_fee")?),
            CostMode::Time => (1.0, params.get("port_wait_time")?),
        };

        Ok(Self {
            mode,
            rates,
            border_costs,
            tariffs,
            shipment_value,
            port_cost,
            match_radius: params.get_or("match_radius", DEFAULT_MATCH_RADIUS),
            port_tolerance: params.get_or("port_tolerance", DEFAULT_PORT_TOLERANCE),
            border_tolerance: params.get_or("border_tolerance", DEFAULT_BORDER_TOLERANCE),
            tie_break: TieBreak::default(),
        })
    }

    /// Load every table from a parameters directory.
    ///
    /// `border_costs` overrides the default border cost file location.
    pub fn load(params_dir: &Path, mode: CostMode, border_costs: Option<&Path>) -> Result<Self> {
        let rates = match mode {
            CostMode::Freight => {
                TransportRates::from_costs_reader(open(&params_dir.join(TRANSPORT_COSTS_FILE))?)?
            }
            CostMode::Time => {
                TransportRates::from_speeds_reader(open(&params_dir.join(TRANSPORT_SPEEDS_FILE))?)?
            }
        };
        let border_path = border_costs
            .map(Path::to_path_buf)
            .unwrap_or_else(|| params_dir.join(BORDER_COSTS_FILE));
        let border_costs = BorderCosts::from_reader(open(&border_path)?)?;
        let tariffs = Tariffs::from_reader(open(&params_dir.join(TARIFFS_FILE))?)?;
        let params = Parameters::from_reader(
            open(&params_dir.join(COST_PARAMETERS_FILE))?,
            COST_PARAMETERS_FILE,
        )?;

        info!(
            mode = %mode,
            classes = rates.len(),
            border_costs = %border_path.display(),
            "loaded cost parameters"
        );
        Self::from_parts(mode, rates, border_costs, tariffs, &params)
    }
}

/// Settlement match radius from the cost parameter table.
///
/// Falls back to [`DEFAULT_MATCH_RADIUS`] when the table or the
/// `match_radius` row is absent, so matching alone needs no parameters.
pub fn load_match_radius(params_dir: &Path) -> Result<f64> {
    let path = params_dir.join(COST_PARAMETERS_FILE);
    if !path.exists() {
        return Ok(DEFAULT_MATCH_RADIUS);
    }
    let params = Parameters::from_reader(open(&path)?, COST_PARAMETERS_FILE)?;
    Ok(params.get_or("match_radius", DEFAULT_MATCH_RADIUS))
}

/// Parameters of the market-access aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketAccessParams {
    /// Trade elasticity used as the decay exponent.
    pub theta: f64,
    /// Weight of consumer market access in the combined index.
    pub beta: f64,
    /// Costs below this floor are clipped upward.
    pub min_cost: f64,
}

impl MarketAccessParams {
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        Ok(Self {
            theta: params.get("theta")?,
            beta: params.get("beta")?,
            min_cost: params.get("min_cost")?,
        })
    }

    pub fn load(params_dir: &Path) -> Result<Self> {
        let path = params_dir.join(MARKET_ACCESS_PARAMETERS_FILE);
        let params = Parameters::from_reader(open(&path)?, MARKET_ACCESS_PARAMETERS_FILE)?;
        Self::from_parameters(&params)
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| {
        Error::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {err}", path.display()),
        ))
    })
}

/// Default input and output locations, relative to a data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub cities: PathBuf,
    pub roads: PathBuf,
    pub sea: PathBuf,
    pub ports: PathBuf,
    pub border_crossings: PathBuf,
    pub cost_matrix: PathBuf,
    pub market_access: PathBuf,
    pub params_dir: PathBuf,
}

impl DataPaths {
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            cities: root.join("data/csv/cities.csv"),
            roads: root.join("data/geojson/roads.geojson"),
            sea: root.join("data/geojson/sea_links.geojson"),
            ports: root.join("data/geojson/ports.geojson"),
            border_crossings: root.join("data/geojson/border_crossings.geojson"),
            cost_matrix: root.join("data/csv/cost_matrix.csv"),
            market_access: root.join("output/market_access.csv"),
            params_dir: root.join("parameters"),
        }
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::rooted_at(Path::new("."))
    }
}
